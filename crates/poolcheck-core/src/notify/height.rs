//! BIP34 height recovery from the coinbase scriptSig.
//!
//! The scriptSig length byte sits at a fixed offset in `coinbase_part1`:
//! version (4) + input count (1) + null prevout (36) = 41 bytes. This
//! assumes a single-byte input-count varint. Pools with a multi-byte count
//! would land on the wrong byte; we do not try to detect that.

use bitcoin::hex::{DisplayHex, FromHex};
use tracing::debug;

use crate::types::BlockHeight;

const SCRIPT_SIG_LEN_OFFSET: usize = 41;
const MIN_PART1_HEX_LEN: usize = 90;

const MAX_DIRECT_PUSH: u8 = 75;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;

/// What could be recovered of the coinbase input script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinbaseScriptSig {
    pub height: BlockHeight,
    /// Hex of the assembled scriptSig; empty when the length byte is unusable.
    pub script_sig: String,
}

/// Best-effort BIP34 height extraction. Never fails: anything that does not
/// decode yields [`BlockHeight::UNKNOWN`].
pub fn extract_height(part1: &str, part2: &str) -> CoinbaseScriptSig {
    if part1.len() < MIN_PART1_HEX_LEN {
        debug!(len = part1.len(), "coinbase part1 too short for a scriptSig");
        return CoinbaseScriptSig::default();
    }

    let part1 = match Vec::<u8>::from_hex(part1) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "coinbase part1 is not hex");
            return CoinbaseScriptSig::default();
        }
    };

    let declared = usize::from(part1[SCRIPT_SIG_LEN_OFFSET]);
    if declared == 0 {
        debug!("coinbase scriptSig length is zero");
        return CoinbaseScriptSig::default();
    }

    // Everything after the length byte belongs to the scriptSig as far as
    // part1 is concerned; part2 only tops it up to the declared length.
    let mut script_sig = part1[SCRIPT_SIG_LEN_OFFSET + 1..].to_vec();
    if declared > script_sig.len() {
        let needed = declared - script_sig.len();
        if let Some(prefix) = part2
            .get(..needed * 2)
            .and_then(|h| Vec::<u8>::from_hex(h).ok())
        {
            script_sig.extend_from_slice(&prefix);
        }
    }

    let height = read_height_push(&script_sig).unwrap_or_else(|| {
        debug!("no BIP34 height push at start of scriptSig");
        BlockHeight::UNKNOWN
    });

    CoinbaseScriptSig {
        height,
        script_sig: script_sig.to_lower_hex_string(),
    }
}

/// Decode the first push of `script` as a little-endian unsigned height.
fn read_height_push(script: &[u8]) -> Option<BlockHeight> {
    if script.len() < 2 {
        return None;
    }

    let (len, start) = match script[0] {
        n @ 1..=MAX_DIRECT_PUSH => (usize::from(n), 1),
        OP_PUSHDATA1 => (usize::from(*script.get(1)?), 2),
        OP_PUSHDATA2 => {
            let len = u16::from_le_bytes([*script.get(1)?, *script.get(2)?]);
            (usize::from(len), 3)
        }
        _ => return None,
    };

    let data = script.get(start..start + len)?;
    if data.is_empty() {
        return None;
    }

    // Bytes beyond the eighth shift out of the accumulator.
    let height = data
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
    Some(BlockHeight(height))
}
