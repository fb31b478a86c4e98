//! Recovering notify JSON from firmware log lines.
//!
//! Miner logs prefix each Stratum message with timestamps and tags, e.g.
//! `I (1234) stratum_api: rx: {"id":null,"method":"mining.notify",...}`.

const NOTIFY_METHOD: &str = "mining.notify";

/// Whether a log line mentions `mining.notify` at all. Such lines count as
/// an inspection even when no JSON body can be recovered from them.
pub fn is_notify_line(line: &str) -> bool {
    line.contains(NOTIFY_METHOD)
}

/// Return the JSON object embedded in a log line mentioning `mining.notify`:
/// everything from the first `{` to the last `}` inclusive.
pub fn extract_notify_json(line: &str) -> Option<&str> {
    let line = line.trim();
    if !is_notify_line(line) {
        return None;
    }
    let start = line.find('{')?;
    let end = line.rfind('}')?;
    (end > start).then(|| &line[start..=end])
}
