//! Shuffle: grouping map output by key into intermediate buckets.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use common::{content_id, BucketId, KeyValue};

/// The values of one intermediate key, ready to be reduced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReduceUnit {
    pub bucket_id: BucketId,
    pub key: String,
    pub values: Vec<Value>,
}

/// Intermediate buckets of the current job.
#[derive(Debug, Default)]
pub struct Shuffle {
    /// Values per key, in the order map results arrived.
    buckets: HashMap<String, Vec<Value>>,

    /// Keys in the order their buckets were created.
    keys: Vec<String>,
}

impl Shuffle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the output of one map task. Returns how many new keys it
    /// introduced.
    pub fn partition(&mut self, pairs: impl IntoIterator<Item = KeyValue>) -> usize {
        let mut new_keys = 0;
        for KeyValue { key, value } in pairs {
            match self.buckets.get_mut(&key) {
                Some(bucket) => bucket.push(value),
                None => {
                    self.keys.push(key.clone());
                    self.buckets.insert(key, vec![value]);
                    new_keys += 1;
                }
            }
        }
        new_keys
    }

    /// Number of distinct keys seen so far.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn bucket(&self, key: &str) -> Option<&[Value]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    /// Keys in the order their buckets were created.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Turn every bucket into a reduce unit. Buckets that hash to the same
    /// content identifier are treated as the same work and kept once.
    pub fn into_reduce_units(mut self) -> Vec<ReduceUnit> {
        let units = self
            .keys
            .into_iter()
            .map(|key| {
                let values = self.buckets.remove(&key).unwrap_or_default();
                ReduceUnit {
                    bucket_id: content_id(&key, &values),
                    key,
                    values,
                }
            })
            .collect();
        collapse_duplicates(units)
    }
}

/// Keep the first unit of every bucket id. Distinct keys only share an id
/// on a hash collision, and the later bucket's values are lost.
fn collapse_duplicates(units: Vec<ReduceUnit>) -> Vec<ReduceUnit> {
    let mut seen = HashMap::with_capacity(units.len());
    let mut kept = Vec::with_capacity(units.len());

    for unit in units {
        match seen.get(&unit.bucket_id) {
            Some(first) => warn!(
                "bucket {} of key `{}` collides with key `{first}`; dropping its {} values",
                unit.bucket_id,
                unit.key,
                unit.values.len()
            ),
            None => {
                seen.insert(unit.bucket_id, unit.key.clone());
                kept.push(unit);
            }
        }
    }

    kept
}
