//! Types shared between the coordinator, the workloads and the workers
//! that poll the coordinator for map and reduce tasks.
//!
//! Task payloads travel as JSON text: map results are `[[key, value], ...]`
//! and reduce results are `{key: number, ...}`.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Formatter;
use std::hash::Hasher;

use bytes::Bytes;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

pub mod codec;
pub mod minio;
pub mod utils;

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue>>>>;

/// A map function takes the contents of one input chunk and
/// returns an iterator that yields the emitted key-value pairs.
pub type MapFn = fn(chunk: Bytes) -> MapOutput;

/// A reduce function takes in a key and an iterator over every value
/// emitted for that key. It returns the partial result for the key.
pub type ReduceFn =
    fn(key: &str, values: Box<dyn Iterator<Item = Value> + '_>) -> anyhow::Result<Partial>;

/// A map reduce application.
#[derive(Copy, Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

/// A reduce result: numeric values keyed by the reduce-emitted key.
pub type Partial = BTreeMap<String, Number>;

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair emitted by a map task.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct KeyValue {
    /// The key.
    pub key: String,

    /// The value. Opaque to the coordinator.
    pub value: Value,
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.value)
    }
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the key of this key-value pair.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the value of this key-value pair.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the key-value pair and returns the key.
    #[inline]
    pub fn into_key(self) -> String {
        self.key
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Consumes the pair and returns both halves.
    #[inline]
    pub fn into_parts(self) -> (String, Value) {
        (self.key, self.value)
    }
}

/////////////////////////////////////////////////////////////////////////////
// Hashing
/////////////////////////////////////////////////////////////////////////////

/// Hashes a name into 31 bits. Used to derive the store prefix of
/// the chunks cut from an input file.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    hasher.write(key);
    (hasher.finish() & 0x7fffffff) as u32
}

/// Fixed-width identifier of an intermediate bucket.
///
/// Two buckets with the same key and the same values in the same order
/// always get the same identifier.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct BucketId(pub u64);

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for BucketId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Computes the content identifier of a bucket from its key and values.
pub fn content_id(key: &str, values: &[Value]) -> BucketId {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(key.as_bytes());
    // 0xff never occurs in UTF-8, so it cannot be confused with content.
    hasher.write_u8(0xff);
    for value in values {
        hasher.write(value.to_string().as_bytes());
        hasher.write_u8(0xff);
    }
    BucketId(hasher.finish())
}
