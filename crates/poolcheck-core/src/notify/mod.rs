//! Stratum `mining.notify` decoding.
//!
//! [`parse`] turns one notify JSON-RPC message into a [`ParsedNotify`]:
//! envelope validation, prevhash byte reversal, BIP34 height recovery,
//! coinbase output walking, and `ntime` interpretation. The pipeline is a
//! pure function of its input and safe to call from any thread.

mod height;
mod ntime;
mod outputs;
mod params;
mod prevhash;

pub use height::{extract_height, CoinbaseScriptSig};
pub use ntime::decode_ntime;
pub use outputs::{extract_outputs, locate_outputs};
pub use prevhash::reverse_hash_hex;

use serde_json::{Map, Value};

use crate::address::{AddressResolver, BitcoinAddressResolver};
use crate::error::NotifyError;
use crate::types::ParsedNotify;

use params::NotifyParams;

/// Parse a `mining.notify` message, encoding payout addresses for mainnet.
pub fn parse(input: &str) -> Result<ParsedNotify, NotifyError> {
    parse_with(input, &BitcoinAddressResolver::default())
}

/// Parse a `mining.notify` message with a caller-supplied address resolver.
pub fn parse_with<R>(input: &str, resolver: &R) -> Result<ParsedNotify, NotifyError>
where
    R: AddressResolver + ?Sized,
{
    let raw: Map<String, Value> = serde_json::from_str(input.trim())?;
    let params = NotifyParams::from_envelope(&raw)?;

    let CoinbaseScriptSig { height, script_sig } =
        extract_height(params.coinbase_part1, params.coinbase_part2);
    let coinbase_outputs = extract_outputs(params.coinbase_part2, resolver)?;

    tracing::trace!(
        job_id = params.job_id,
        %height,
        outputs = coinbase_outputs.len(),
        "decoded mining.notify"
    );

    Ok(ParsedNotify {
        job_id: params.job_id.to_owned(),
        prev_hash_be: reverse_hash_hex(params.prevhash_le),
        height,
        script_sig,
        coinbase_outputs,
        version: params.version.to_owned(),
        nbits: params.nbits.to_owned(),
        ntime: params.ntime.to_owned(),
        ntime_parsed: decode_ntime(params.ntime),
        clean_jobs: params.clean_jobs,
    })
}
