pub mod address;
pub mod audit;
pub mod error;
pub mod line;
pub mod notify;
pub mod script;
#[cfg(test)]
mod test_util;
pub mod types;

pub use address::{AddressResolver, BitcoinAddressResolver};
pub use audit::{audit_payouts, PayoutAudit};
pub use error::{AddressError, NotifyError};
pub use line::{extract_notify_json, is_notify_line};
pub use notify::{parse, parse_with};
pub use types::{BlockHeight, CoinbaseOutput, ParsedNotify, PayoutAddress, ScriptType};
