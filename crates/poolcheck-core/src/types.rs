//! Domain types for decoded `mining.notify` work templates.
//!
//! Contains the parse result (`ParsedNotify`), the per-output reward record
//! (`CoinbaseOutput`), and the shared enums `ScriptType` and `PayoutAddress`.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// ==============================================================================
// Script Type Classification
// ==============================================================================

/// The output script template a coinbase output matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    #[serde(rename = "P2PKH")]
    P2pkh,
    #[serde(rename = "P2SH")]
    P2sh,
    #[serde(rename = "P2WPKH")]
    P2wpkh,
    #[serde(rename = "P2WSH")]
    P2wsh,
    #[serde(rename = "OP_RETURN")]
    OpReturn,
    Unknown,
}

impl std::fmt::Display for ScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P2pkh => write!(f, "P2PKH"),
            Self::P2sh => write!(f, "P2SH"),
            Self::P2wpkh => write!(f, "P2WPKH"),
            Self::P2wsh => write!(f, "P2WSH"),
            Self::OpReturn => write!(f, "OP_RETURN"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

// ==============================================================================
// Payout Address
// ==============================================================================

const NULL_DATA: &str = "(Null Data)";
const UNDECODABLE: &str = "Unable to decode";

/// Where a coinbase output pays to, as far as the decoder could tell.
///
/// Serialized as a bare string so JSON consumers see the address itself or
/// one of the two sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum PayoutAddress {
    Resolved(String),
    /// OP_RETURN outputs; never resolved.
    NullData,
    Undecodable,
}

impl PayoutAddress {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Resolved(addr) => addr,
            Self::NullData => NULL_DATA,
            Self::Undecodable => UNDECODABLE,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl std::fmt::Display for PayoutAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PayoutAddress> for String {
    fn from(addr: PayoutAddress) -> Self {
        match addr {
            PayoutAddress::Resolved(s) => s,
            other => other.as_str().to_owned(),
        }
    }
}

impl From<String> for PayoutAddress {
    fn from(s: String) -> Self {
        match s.as_str() {
            NULL_DATA => Self::NullData,
            UNDECODABLE => Self::Undecodable,
            _ => Self::Resolved(s),
        }
    }
}

// ==============================================================================
// Block Height
// ==============================================================================

/// A BIP34 block height recovered from the coinbase scriptSig.
///
/// Zero means the height could not be recovered. `#[serde(transparent)]`
/// keeps the JSON representation a bare integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    pub const UNKNOWN: Self = Self(0);

    pub fn is_known(&self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for BlockHeight {
    fn from(h: u64) -> Self {
        Self(h)
    }
}

impl std::ops::Deref for BlockHeight {
    type Target = u64;
    fn deref(&self) -> &u64 {
        &self.0
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ==============================================================================
// Parse Result
// ==============================================================================

/// One reward output of the coinbase transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinbaseOutput {
    pub value_satoshis: u64,
    /// Always `value_satoshis / 1e8`.
    pub value_btc: f64,
    pub script_type: ScriptType,
    pub address: PayoutAddress,
}

impl CoinbaseOutput {
    pub fn new(value_satoshis: u64, script_type: ScriptType, address: PayoutAddress) -> Self {
        Self {
            value_satoshis,
            value_btc: value_satoshis as f64 / 1e8,
            script_type,
            address,
        }
    }
}

/// The meaningful fields of one `mining.notify` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedNotify {
    pub job_id: String,
    /// Previous block hash in canonical big-endian display order.
    pub prev_hash_be: String,
    pub height: BlockHeight,
    /// Raw coinbase input script as hex.
    pub script_sig: String,
    /// Outputs in serialized transaction order.
    pub coinbase_outputs: Vec<CoinbaseOutput>,
    pub version: String,
    pub nbits: String,
    /// Raw hex as sent by the pool.
    pub ntime: String,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ntime_parsed: Option<OffsetDateTime>,
    pub clean_jobs: bool,
}
