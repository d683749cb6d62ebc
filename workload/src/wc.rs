//! Word count: how often each word occurs in the input.

use anyhow::Result;
use bytes::Bytes;
use serde_json::Value;

use common::codec::single;
use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput, Partial};

pub fn map(chunk: Bytes) -> MapOutput {
    let text = string_from_bytes(chunk)?;
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    Ok(Box::new(
        words.into_iter().map(|word| anyhow::Ok(KeyValue::new(word, 1))),
    ))
}

pub fn reduce(key: &str, values: Box<dyn Iterator<Item = Value> + '_>) -> Result<Partial> {
    Ok(single(key, crate::sum_counts(values)?))
}
