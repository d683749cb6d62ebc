use serde::Serialize;
use serde_json::Value;

use common::BucketId;

use crate::chunker::ChunkRef;

/// Work for a map worker: run `mapper` over one chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapTask {
    pub chunk: ChunkRef,
    pub mapper: String,
}

/// Work for a reduce worker: run `reducer` over every value of one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReduceTask {
    pub bucket_id: BucketId,
    pub key: String,
    pub values: Vec<Value>,
    pub reducer: String,
}

/// Answer to a worker asking for work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Task {
    Map(MapTask),
    Reduce(ReduceTask),
    /// Tasks of the current phase are still out; poll again later.
    Wait,
    /// No job is running, or the running job has nothing left to do.
    Empty,
}

impl Task {
    pub fn kind(&self) -> &'static str {
        match self {
            Task::Map(_) => "map",
            Task::Reduce(_) => "reduce",
            Task::Wait => "wait",
            Task::Empty => "empty",
        }
    }
}
