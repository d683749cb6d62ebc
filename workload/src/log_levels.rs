//! Counts log lines per severity level.
//!
//! The level of a line is the first whitespace-separated token that names
//! one, ignoring case and surrounding brackets. Lines without a level are
//! counted under `none`.

use anyhow::Result;
use bytes::Bytes;
use serde_json::Value;

use common::codec::single;
use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput, Partial};

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

fn level_of(line: &str) -> &'static str {
    line.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphabetic()))
        .find_map(|token| {
            let token = token.to_ascii_lowercase();
            let token = if token == "warning" { "warn".to_string() } else { token };
            LEVELS.iter().copied().find(|level| *level == token)
        })
        .unwrap_or("none")
}

pub fn map(chunk: Bytes) -> MapOutput {
    let text = string_from_bytes(chunk)?;
    let levels: Vec<&'static str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(level_of)
        .collect();

    Ok(Box::new(
        levels.into_iter().map(|level| anyhow::Ok(KeyValue::new(level, 1))),
    ))
}

pub fn reduce(key: &str, values: Box<dyn Iterator<Item = Value> + '_>) -> Result<Partial> {
    Ok(single(key, crate::sum_counts(values)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_detection() {
        assert_eq!(level_of("2024-06-01T10:00:00Z  INFO server: started"), "info");
        assert_eq!(level_of("[WARNING] disk almost full"), "warn");
        assert_eq!(level_of("error: boom"), "error");
        assert_eq!(level_of("nothing to see"), "none");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let pairs: Vec<KeyValue> = map(Bytes::from("DEBUG a\n\n  \nTRACE b\n"))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let keys: Vec<&str> = pairs.iter().map(KeyValue::key).collect();
        assert_eq!(keys, ["debug", "trace"]);
    }
}
