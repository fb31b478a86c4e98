use time::OffsetDateTime;

/// Anything at or below this is treated as a placeholder, not a real time.
const MIN_PLAUSIBLE_NTIME: u64 = 1_000_000_000;

/// Interpret the hex `ntime` field as a UTC Unix timestamp.
pub fn decode_ntime(ntime: &str) -> Option<OffsetDateTime> {
    if ntime.is_empty() || !ntime.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let secs = u64::from_str_radix(ntime, 16).ok()?;
    if secs <= MIN_PLAUSIBLE_NTIME {
        return None;
    }
    OffsetDateTime::from_unix_timestamp(i64::try_from(secs).ok()?).ok()
}
