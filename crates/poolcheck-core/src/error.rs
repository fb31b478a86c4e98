/// Fatal violations of the `mining.notify` input contract.
///
/// Content-level problems (no BIP34 height, an undecodable address, a
/// truncated output list) never produce one of these; they degrade the
/// affected field instead.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid mining.notify JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("missing 'params' field in mining.notify JSON")]
    MissingParams,

    #[error("'params' must be an array")]
    ParamsNotArray,

    #[error("mining.notify params too short: got {got}, expected >=9")]
    ParamsTooShort { got: usize },

    #[error("params[{index}] ({field}) must be a {expected}")]
    WrongType {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },

    #[error("{field} is not valid hex")]
    InvalidHex { field: &'static str },

    #[error("coinbase part2 too short: {len} hex chars, need at least 20")]
    CoinbasePart2TooShort { len: usize },

    #[error("could not locate outputs start in coinbase part2")]
    OutputsNotLocated,
}

/// Failure converting a classified script payload into a display address.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("{script_type} scripts carry no address")]
    NotAddressable { script_type: crate::types::ScriptType },

    #[error("invalid {script_type} payload: {message}")]
    InvalidPayload {
        script_type: crate::types::ScriptType,
        message: String,
    },
}
