//! Address resolution for classified output scripts.
//!
//! Defines the [`AddressResolver`] seam the decoder consumes and the
//! [`BitcoinAddressResolver`] implementation backed by the `bitcoin` crate.
//! Any `Fn(ScriptType, &[u8]) -> Result<String, AddressError>` is also a
//! resolver, which keeps the decoder testable without real address encoding.

use bitcoin::hashes::Hash;
use bitcoin::{Address, Network, PubkeyHash, ScriptHash, WitnessProgram, WitnessVersion};

use crate::error::AddressError;
use crate::types::ScriptType;

/// Converts a script payload (hash160 or witness program) into a
/// human-readable address string.
pub trait AddressResolver {
    fn resolve(&self, script_type: ScriptType, payload: &[u8]) -> Result<String, AddressError>;
}

impl<F> AddressResolver for F
where
    F: Fn(ScriptType, &[u8]) -> Result<String, AddressError>,
{
    fn resolve(&self, script_type: ScriptType, payload: &[u8]) -> Result<String, AddressError> {
        self(script_type, payload)
    }
}

/// Encodes addresses for a given Bitcoin network.
#[derive(Debug, Clone, Copy)]
pub struct BitcoinAddressResolver {
    network: Network,
}

impl BitcoinAddressResolver {
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

impl Default for BitcoinAddressResolver {
    fn default() -> Self {
        Self::new(Network::Bitcoin)
    }
}

impl AddressResolver for BitcoinAddressResolver {
    fn resolve(&self, script_type: ScriptType, payload: &[u8]) -> Result<String, AddressError> {
        let invalid = |message: String| AddressError::InvalidPayload {
            script_type,
            message,
        };

        let address = match script_type {
            ScriptType::P2pkh => {
                let hash = PubkeyHash::from_slice(payload).map_err(|e| invalid(e.to_string()))?;
                Address::p2pkh(hash, self.network)
            }
            ScriptType::P2sh => {
                let hash = ScriptHash::from_slice(payload).map_err(|e| invalid(e.to_string()))?;
                Address::p2sh_from_hash(hash, self.network)
            }
            ScriptType::P2wpkh | ScriptType::P2wsh => {
                let expected_len = if script_type == ScriptType::P2wpkh { 20 } else { 32 };
                if payload.len() != expected_len {
                    return Err(invalid(format!(
                        "witness program is {} bytes, expected {expected_len}",
                        payload.len()
                    )));
                }
                let program = WitnessProgram::new(WitnessVersion::V0, payload)
                    .map_err(|e| invalid(e.to_string()))?;
                Address::from_witness_program(program, self.network)
            }
            ScriptType::OpReturn | ScriptType::Unknown => {
                return Err(AddressError::NotAddressable { script_type });
            }
        };

        Ok(address.to_string())
    }
}
