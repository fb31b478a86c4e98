//! Per-source notify inspection and payout reporting.

use eyre::eyre;
use tracing::{debug, error, info};

use poolcheck_core::{
    audit_payouts, extract_notify_json, is_notify_line, parse_with, BitcoinAddressResolver,
    ParsedNotify,
};

use crate::source::{LineSource, StratumLogin};

/// Settings shared by every source task.
#[derive(Debug, Clone)]
pub struct Settings {
    pub resolver: BitcoinAddressResolver,
    pub expected: Vec<String>,
    /// Notify messages to inspect per source before stopping.
    pub count: usize,
    pub json: bool,
    pub login: StratumLogin,
}

/// Read `lines` until `settings.count` notify messages have been inspected
/// or the stream ends. Fails on the first notify that pays an address
/// outside `settings.expected`.
pub async fn inspect_lines(
    lines: &mut LineSource,
    label: &str,
    settings: &Settings,
) -> eyre::Result<usize> {
    let limit = settings.count.max(1);
    let mut inspected = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !is_notify_line(line) {
            continue;
        }
        inspected += 1;

        match extract_notify_json(line) {
            Some(blob) => {
                if let Some(notify) = decode(blob, label, settings) {
                    report(&notify, label, settings)?;
                }
            }
            None => debug!(source = label, line, "notify line carries no JSON object"),
        }

        if inspected >= limit {
            break;
        }
    }

    debug!(source = label, inspected, "source finished");
    Ok(inspected)
}

fn decode(blob: &str, label: &str, settings: &Settings) -> Option<ParsedNotify> {
    match parse_with(blob, &settings.resolver) {
        Ok(notify) => Some(notify),
        Err(e) => {
            error!(source = label, error = %e, "parsing mining.notify line failed");
            debug!(source = label, blob, "unparsed notify");
            None
        }
    }
}

fn report(notify: &ParsedNotify, label: &str, settings: &Settings) -> eyre::Result<()> {
    info!(
        source = label,
        job_id = %notify.job_id,
        height = %notify.height,
        "height={} has {} coinbase outputs",
        notify.height,
        notify.coinbase_outputs.len()
    );

    if settings.json {
        println!("{}", serde_json::to_string(notify)?);
    }

    let audit = audit_payouts(notify, &settings.expected);
    for out in &audit.payouts {
        info!(
            source = label,
            "{} ({}) receives {:.8} BTC",
            out.address,
            out.script_type,
            out.value_btc
        );
    }

    if !audit.checked() {
        return Ok(());
    }
    if audit.is_clean() {
        info!(
            source = label,
            "all coinbase outputs pay the {} expected addresses",
            settings.expected.len()
        );
        return Ok(());
    }

    error!(
        source = label,
        count = audit.unexpected.len(),
        "coinbase pays addresses that are not expected"
    );
    for addr in &audit.unexpected {
        error!(source = label, "{addr} is not an expected payout address");
    }
    Err(eyre!(
        "height {} pays {} unexpected address(es): {}",
        notify.height,
        audit.unexpected.len(),
        audit
            .unexpected
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    ))
}
