//! Encoding and decoding of task result payloads.
//!
//! Workers submit plain JSON text. Nothing in a payload is trusted: a
//! decode either yields the complete, well-formed result or an error.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::{KeyValue, Partial};

/// Why a submitted payload was rejected.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON array of [key, value] pairs")]
    NotAnArray,

    #[error("entry {index} is not a [key, value] pair")]
    BadPair { index: usize },

    #[error("entry {index} has a non-string key")]
    NonStringKey { index: usize },

    #[error("expected a JSON object of key to number")]
    NotAnObject,

    #[error("value for key `{key}` is not a number")]
    NonNumericValue { key: String },

    #[error("value for key `{key}` overflows")]
    Overflow { key: String },
}

/// Encodes map output as `[[key, value], ...]`.
pub fn encode_pairs(pairs: &[KeyValue]) -> String {
    let array = pairs
        .iter()
        .map(|kv| Value::Array(vec![Value::String(kv.key.clone()), kv.value.clone()]))
        .collect();
    Value::Array(array).to_string()
}

/// Decodes a map result payload.
pub fn decode_pairs(payload: &str) -> Result<Vec<KeyValue>, PayloadError> {
    let Value::Array(entries) = serde_json::from_str::<Value>(payload)? else {
        return Err(PayloadError::NotAnArray);
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Array(pair) if pair.len() == 2 => {
                let mut pair = pair.into_iter();
                match (pair.next(), pair.next()) {
                    (Some(Value::String(key)), Some(value)) => Ok(KeyValue { key, value }),
                    _ => Err(PayloadError::NonStringKey { index }),
                }
            }
            _ => Err(PayloadError::BadPair { index }),
        })
        .collect()
}

/// Encodes a reduce result as `{key: number, ...}`.
pub fn encode_partial(partial: &Partial) -> String {
    let object: Map<String, Value> = partial
        .iter()
        .map(|(key, value)| (key.clone(), Value::Number(value.clone())))
        .collect();
    Value::Object(object).to_string()
}

/// Decodes a reduce result payload.
pub fn decode_partial(payload: &str) -> Result<Partial, PayloadError> {
    let Value::Object(object) = serde_json::from_str::<Value>(payload)? else {
        return Err(PayloadError::NotAnObject);
    };

    object
        .into_iter()
        .map(|(key, value)| match value {
            Value::Number(number) => Ok((key, number)),
            _ => Err(PayloadError::NonNumericValue { key }),
        })
        .collect()
}

/// Convenience for building a [`Partial`] with a single entry.
pub fn single(key: impl Into<String>, value: impl Into<Number>) -> Partial {
    Partial::from([(key.into(), value.into())])
}
