use common::codec::PayloadError;
use thiserror::Error;

use crate::jobs::Phase;

pub type Result<T, E = CoordinatorError> = std::result::Result<T, E>;

/// Errors returned by [`Coordinator`](crate::Coordinator) operations.
///
/// Polling signals (`Wait`, `Empty`) are not errors; they are
/// [`Task`](crate::Task) variants.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// `start` was called while a job is active.
    #[error("a job is already running (phase: {0})")]
    AlreadyRunning(Phase),

    /// A submitted payload could not be parsed. Nothing was changed.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] PayloadError),

    /// A submission arrived in a phase that has no task of that kind in flight.
    #[error("no {kind} task is in flight (phase: {phase})")]
    UnexpectedSubmission { kind: &'static str, phase: Phase },

    /// The job was reset while its input was still being chunked.
    #[error("job start was cancelled by a reset")]
    StartCancelled,

    /// Chunk size must be at least one byte.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    /// Reading the input or reading/writing the chunk store failed.
    #[error("I/O failure: {0:#}")]
    Io(#[source] anyhow::Error),
}

impl From<std::io::Error> for CoordinatorError {
    fn from(err: std::io::Error) -> Self {
        CoordinatorError::Io(err.into())
    }
}
