use bitcoin::hex::{DisplayHex, FromHex};

/// Reverse the byte order of a little-endian hash hex string into the
/// big-endian form block explorers display.
///
/// The field is display-only, so undecodable input is returned unchanged
/// rather than failing the parse.
pub fn reverse_hash_hex(le_hex: &str) -> String {
    let trimmed = le_hex.trim();
    let padded;
    let even = if trimmed.len() % 2 == 1 {
        padded = format!("0{trimmed}");
        padded.as_str()
    } else {
        trimmed
    };

    match Vec::<u8>::from_hex(even) {
        Ok(mut bytes) => {
            bytes.reverse();
            bytes.to_lower_hex_string()
        }
        Err(e) => {
            tracing::debug!(prevhash = le_hex, error = %e, "prevhash is not hex; leaving as-is");
            le_hex.to_owned()
        }
    }
}
