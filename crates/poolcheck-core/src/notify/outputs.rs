//! Coinbase output walking.
//!
//! `coinbase_part2` carries the tail of the coinbase input (the `ffffffff`
//! sequence), then the output count and serialized outputs. The exact
//! extra-nonce length is unknown here, so the start of the output section
//! is found heuristically by [`locate_outputs`]; the walk itself is exact.

use bitcoin::hex::FromHex;
use tracing::debug;

use crate::address::AddressResolver;
use crate::error::NotifyError;
use crate::script::OutputScript;
use crate::types::{CoinbaseOutput, PayoutAddress};

const MIN_PART2_HEX_LEN: usize = 20;
const SEQUENCE_FINAL: [u8; 4] = [0xff; 4];
const MAX_PLAUSIBLE_OUTPUTS: u8 = 10;

/// Find the offset of the output count in `part2`.
///
/// Looks for the first `ffffffff` whose following byte is a plausible
/// output count (1..=10); failing that, accepts `ffffffff` only as a prefix
/// of the whole fragment. A SegWit marker and flag after the sequence are
/// skipped. Returns `None` when neither pattern is present.
pub fn locate_outputs(part2: &[u8]) -> Option<usize> {
    let scanned = part2.windows(5).position(|w| {
        w[..4] == SEQUENCE_FINAL && (1..=MAX_PLAUSIBLE_OUTPUTS).contains(&w[4])
    });

    let mut offset = match scanned {
        Some(pos) => pos + SEQUENCE_FINAL.len(),
        None if part2.starts_with(&SEQUENCE_FINAL) => SEQUENCE_FINAL.len(),
        None => return None,
    };

    if part2.get(offset) == Some(&0x00) && matches!(part2.get(offset + 1), Some(0x00 | 0x01)) {
        offset += 2;
    }
    Some(offset)
}

/// Decode the coinbase outputs from the hex `part2` fragment.
pub fn extract_outputs<R>(part2: &str, resolver: &R) -> Result<Vec<CoinbaseOutput>, NotifyError>
where
    R: AddressResolver + ?Sized,
{
    if part2.len() < MIN_PART2_HEX_LEN {
        return Err(NotifyError::CoinbasePart2TooShort { len: part2.len() });
    }
    // A dangling nibble after the last whole byte is ignored.
    let whole_bytes = part2
        .get(..part2.len() - part2.len() % 2)
        .ok_or(NotifyError::InvalidHex {
            field: "coinbase_part2",
        })?;
    if whole_bytes.len() < part2.len() {
        debug!(len = part2.len(), "ignoring odd trailing nibble in coinbase_part2");
    }
    let bytes = Vec::<u8>::from_hex(whole_bytes).map_err(|_| NotifyError::InvalidHex {
        field: "coinbase_part2",
    })?;

    let offset = locate_outputs(&bytes).ok_or(NotifyError::OutputsNotLocated)?;
    let mut reader = ByteReader::new(&bytes[offset..]);
    let declared = reader.read_u8().ok_or(NotifyError::OutputsNotLocated)?;

    let mut outputs = Vec::with_capacity(usize::from(declared));
    for _ in 0..declared {
        let Some((value, script)) = read_output(&mut reader) else {
            debug!(
                declared,
                decoded = outputs.len(),
                "coinbase output list truncated"
            );
            break;
        };
        outputs.push(decode_output(value, script, resolver));
    }

    Ok(outputs)
}

fn read_output<'a>(reader: &mut ByteReader<'a>) -> Option<(u64, &'a [u8])> {
    let value = reader.read_u64_le()?;
    let script_len = reader.read_u8()?;
    let script = reader.read_slice(usize::from(script_len))?;
    Some((value, script))
}

fn decode_output<R>(value: u64, script: &[u8], resolver: &R) -> CoinbaseOutput
where
    R: AddressResolver + ?Sized,
{
    let classified = OutputScript::classify(script);
    let script_type = classified.script_type();

    let address = match classified.payload() {
        Some(payload) => match resolver.resolve(script_type, payload) {
            Ok(addr) => PayoutAddress::Resolved(addr),
            Err(e) => {
                debug!(%script_type, error = %e, "address resolution failed");
                PayoutAddress::Undecodable
            }
        },
        None if classified == OutputScript::OpReturn => PayoutAddress::NullData,
        None => PayoutAddress::Undecodable,
    };

    CoinbaseOutput::new(value, script_type, address)
}

// ==============================================================================
// Byte Reader
// ==============================================================================

/// Forward-only cursor over a byte slice. Every read is all-or-nothing.
struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn read_slice(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.buf.len() < len {
            return None;
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Some(head)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.read_slice(1).map(|b| b[0])
    }

    fn read_u64_le(&mut self) -> Option<u64> {
        let bytes: [u8; 8] = self.read_slice(8)?.try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }
}
