//! Payout audits: does a work template pay only the addresses we expect?

use std::collections::BTreeSet;

use crate::types::{CoinbaseOutput, ParsedNotify, ScriptType};

/// Result of checking one notify's coinbase outputs against a set of
/// expected payout addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutAudit<'a> {
    /// Outputs that move value, in transaction order. OP_RETURN excluded.
    pub payouts: Vec<&'a CoinbaseOutput>,
    /// Addresses of non-OP_RETURN outputs that are not expected. Always
    /// empty when no expectations were given.
    pub unexpected: BTreeSet<String>,
    expectations: usize,
}

impl PayoutAudit<'_> {
    /// `true` when nothing unexpected was paid, or nothing was expected.
    pub fn is_clean(&self) -> bool {
        self.unexpected.is_empty()
    }

    /// Whether the audit had any expected addresses to compare against.
    pub fn checked(&self) -> bool {
        self.expectations > 0
    }
}

/// Audit `notify` against `expected` addresses.
///
/// Zero-value outputs are not listed as payouts but are still checked
/// against `expected`.
pub fn audit_payouts<'a, S>(notify: &'a ParsedNotify, expected: &[S]) -> PayoutAudit<'a>
where
    S: AsRef<str>,
{
    let mut payouts = Vec::new();
    let mut unexpected = BTreeSet::new();

    for out in notify
        .coinbase_outputs
        .iter()
        .filter(|o| o.script_type != ScriptType::OpReturn)
    {
        let addr = out.address.as_str();
        if !expected.is_empty() && !expected.iter().any(|e| e.as_ref() == addr) {
            unexpected.insert(addr.to_owned());
        }
        if out.value_satoshis > 0 {
            payouts.push(out);
        }
    }

    PayoutAudit {
        payouts,
        unexpected,
        expectations: expected.len(),
    }
}
