//! Output script classification.
//!
//! A closed, ordered set of template matches over raw scriptPubKey bytes.
//! The template checks themselves are the `bitcoin` crate's
//! `Script::is_p2pkh()` family, which test exactly the fixed byte layouts
//! we care about (length plus opcode prefix/suffix).

use bitcoin::Script;

use crate::types::ScriptType;

/// A classified output script, carrying the address payload for the
/// templates that have one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputScript<'a> {
    /// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`; payload is the hash160.
    P2pkh(&'a [u8]),
    /// `OP_HASH160 <20> OP_EQUAL`; payload is the hash160.
    P2sh(&'a [u8]),
    /// `OP_0 <20>`; payload is the witness program.
    P2wpkh(&'a [u8]),
    /// `OP_0 <32>`; payload is the witness program.
    P2wsh(&'a [u8]),
    OpReturn,
    Unknown,
}

impl<'a> OutputScript<'a> {
    /// Match `script` against the templates, most specific first.
    #[must_use]
    pub fn classify(script: &'a [u8]) -> Self {
        let s = Script::from_bytes(script);
        if s.is_p2pkh() {
            Self::P2pkh(&script[3..23])
        } else if s.is_p2sh() {
            Self::P2sh(&script[2..22])
        } else if s.is_p2wpkh() {
            Self::P2wpkh(&script[2..22])
        } else if s.is_p2wsh() {
            Self::P2wsh(&script[2..34])
        } else if s.is_op_return() {
            Self::OpReturn
        } else {
            Self::Unknown
        }
    }

    pub fn script_type(&self) -> ScriptType {
        match self {
            Self::P2pkh(_) => ScriptType::P2pkh,
            Self::P2sh(_) => ScriptType::P2sh,
            Self::P2wpkh(_) => ScriptType::P2wpkh,
            Self::P2wsh(_) => ScriptType::P2wsh,
            Self::OpReturn => ScriptType::OpReturn,
            Self::Unknown => ScriptType::Unknown,
        }
    }

    /// The bytes an address is derived from, if this template has an address.
    pub fn payload(&self) -> Option<&'a [u8]> {
        match *self {
            Self::P2pkh(p) | Self::P2sh(p) | Self::P2wpkh(p) | Self::P2wsh(p) => Some(p),
            Self::OpReturn | Self::Unknown => None,
        }
    }
}
