//! Coordinator for a single MapReduce job whose tasks are run by workers
//! that poll for work and submit results.
//!
//! A job moves through [`Phase::Starting`], [`Phase::Mapping`],
//! [`Phase::AwaitingMapCompletion`], [`Phase::Reducing`] and
//! [`Phase::Done`]. Workers call
//! [`Coordinator::next_task`] until it returns [`Task::Empty`], and report
//! what they computed through [`Coordinator::submit_map_result`] and
//! [`Coordinator::submit_reduce_result`].
//!
//! Tasks are never leased: a task handed to a worker that never reports
//! back stalls its phase until the job is [reset](Coordinator::reset).

pub mod aggregate;
pub mod chunker;
mod core;
pub mod error;
pub mod job_queue;
pub mod jobs;
pub mod partition;
pub mod store;
pub mod task;

pub use crate::core::Coordinator;
pub use chunker::{ChunkRef, InputFile};
pub use error::{CoordinatorError, Result};
pub use jobs::{JobStatus, Phase};
pub use store::{ChunkStore, LocalStore, MemoryStore, S3Store};
pub use task::{MapTask, ReduceTask, Task};
