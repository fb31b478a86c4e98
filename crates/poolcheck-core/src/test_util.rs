//! Shared test helpers for `poolcheck-core` unit tests.
//!
//! Builders for coinbase fragments, output scripts, and notify JSON so that
//! tests across modules assemble fixtures the same way.

use bitcoin::hex::{DisplayHex, FromHex};

use crate::types::{BlockHeight, CoinbaseOutput, ParsedNotify};

// ==============================================================================
// Hex Helpers
// ==============================================================================

pub fn hex_bytes(hex: &str) -> Vec<u8> {
    Vec::<u8>::from_hex(hex).expect("test hex must be valid")
}

// ==============================================================================
// Script Builders
// ==============================================================================

pub fn p2pkh_script(hash: [u8; 20]) -> Vec<u8> {
    let mut script = vec![0x76, 0xa9, 0x14];
    script.extend_from_slice(&hash);
    script.extend_from_slice(&[0x88, 0xac]);
    script
}

pub fn p2sh_script(hash: [u8; 20]) -> Vec<u8> {
    let mut script = vec![0xa9, 0x14];
    script.extend_from_slice(&hash);
    script.push(0x87);
    script
}

pub fn p2wpkh_script(program: [u8; 20]) -> Vec<u8> {
    let mut script = vec![0x00, 0x14];
    script.extend_from_slice(&program);
    script
}

pub fn p2wsh_script(program: [u8; 32]) -> Vec<u8> {
    let mut script = vec![0x00, 0x20];
    script.extend_from_slice(&program);
    script
}

// ==============================================================================
// Coinbase Fragment Builders
// ==============================================================================

/// Version 1, one input, null prevout: the 41 bytes before the scriptSig
/// length byte, as hex.
pub fn coinbase_part1_prefix() -> String {
    format!("0100000001{}ffffffff", "00".repeat(32))
}

/// One serialized output: 8-byte LE value, 1-byte script length, script.
pub fn output_hex(value: u64, script: &[u8]) -> String {
    let len = u8::try_from(script.len()).expect("test scripts fit a one-byte length");
    format!(
        "{}{len:02x}{}",
        value.to_le_bytes().as_slice().to_lower_hex_string(),
        script.to_lower_hex_string()
    )
}

/// Sequence, output count, outputs, and a zero locktime.
pub fn coinbase_part2(outputs: &[String]) -> String {
    format!("ffffffff{:02x}{}00000000", outputs.len(), outputs.concat())
}

// ==============================================================================
// Notify Builders
// ==============================================================================

/// A `mining.notify` line with fixed version/nbits and no merkle branches.
pub fn notify_json(
    job_id: &str,
    prevhash: &str,
    part1: &str,
    part2: &str,
    ntime: &str,
    clean_jobs: bool,
) -> String {
    serde_json::json!({
        "id": null,
        "method": "mining.notify",
        "params": [job_id, prevhash, part1, part2, [], "20000000", "1701ebf2", ntime, clean_jobs],
    })
    .to_string()
}

/// A `ParsedNotify` carrying only the given outputs.
pub fn parsed_with_outputs(coinbase_outputs: Vec<CoinbaseOutput>) -> ParsedNotify {
    ParsedNotify {
        job_id: "job".into(),
        prev_hash_be: "00".repeat(32),
        height: BlockHeight(800_000),
        script_sig: String::new(),
        coinbase_outputs,
        version: "20000000".into(),
        nbits: "1701ebf2".into(),
        ntime: "00000000".into(),
        ntime_parsed: None,
        clean_jobs: false,
    }
}
