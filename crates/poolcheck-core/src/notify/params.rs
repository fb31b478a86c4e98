use serde_json::{Map, Value};

use crate::error::NotifyError;

const MIN_PARAMS: usize = 9;

/// The positional `mining.notify` parameters the decoder reads.
/// `params[4]` (merkle branches) is accepted but never inspected.
#[derive(Debug, Clone, Copy)]
pub(super) struct NotifyParams<'a> {
    pub job_id: &'a str,
    pub prevhash_le: &'a str,
    pub coinbase_part1: &'a str,
    pub coinbase_part2: &'a str,
    pub version: &'a str,
    pub nbits: &'a str,
    pub ntime: &'a str,
    pub clean_jobs: bool,
}

impl<'a> NotifyParams<'a> {
    pub(super) fn from_envelope(raw: &'a Map<String, Value>) -> Result<Self, NotifyError> {
        let params = raw
            .get("params")
            .ok_or(NotifyError::MissingParams)?
            .as_array()
            .ok_or(NotifyError::ParamsNotArray)?;

        if params.len() < MIN_PARAMS {
            return Err(NotifyError::ParamsTooShort { got: params.len() });
        }

        Ok(Self {
            job_id: string_at(params, 0, "job_id")?,
            prevhash_le: string_at(params, 1, "prevhash")?,
            coinbase_part1: string_at(params, 2, "coinbase_part1")?,
            coinbase_part2: string_at(params, 3, "coinbase_part2")?,
            version: string_at(params, 5, "version")?,
            nbits: string_at(params, 6, "nbits")?,
            ntime: string_at(params, 7, "ntime")?,
            clean_jobs: bool_at(params, 8, "clean_jobs")?,
        })
    }
}

fn string_at<'a>(
    params: &'a [Value],
    index: usize,
    field: &'static str,
) -> Result<&'a str, NotifyError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or(NotifyError::WrongType {
            index,
            field,
            expected: "string",
        })
}

fn bool_at(params: &[Value], index: usize, field: &'static str) -> Result<bool, NotifyError> {
    params
        .get(index)
        .and_then(Value::as_bool)
        .ok_or(NotifyError::WrongType {
            index,
            field,
            expected: "boolean",
        })
}
