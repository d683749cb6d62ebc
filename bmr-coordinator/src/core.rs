use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use common::codec::{decode_pairs, decode_partial};
use common::{KeyValue, Partial};

use crate::chunker::{ChunkRef, Chunker, InputFile};
use crate::error::{CoordinatorError, Result};
use crate::jobs::{Job, JobStatus, Phase};
use crate::store::ChunkStore;
use crate::task::Task;

/// Handle to the job coordinator.
///
/// Clones share the same job; a process creates one coordinator and hands
/// clones to whatever serves worker requests. Every operation takes the job
/// lock once and finishes all of its work, including any phase transition it
/// causes, before releasing it. The lock is never held across chunk store
/// I/O, so polling stays responsive while a job is chunked or torn down.
#[derive(Debug)]
pub struct Coordinator<S> {
    store: Arc<S>,
    job: Arc<Mutex<Job>>,
}

impl<S> Clone for Coordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            job: Arc::clone(&self.job),
        }
    }
}

impl<S: ChunkStore> Coordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            job: Arc::new(Mutex::new(Job::new())),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start a job: cut every input into chunks of at most `chunk_size`
    /// bytes and queue one map task per chunk.
    ///
    /// Fails with `AlreadyRunning` if a job is active. While the input is
    /// being chunked the job is `Starting` and pollers are told to wait. If
    /// the chunks cannot be written, or the job is reset in the meantime,
    /// the chunks already written are removed and the coordinator is left
    /// idle.
    pub async fn start(
        &self,
        inputs: Vec<InputFile>,
        mapper: impl Into<String>,
        reducer: impl Into<String>,
        chunk_size: usize,
    ) -> Result<()> {
        let generation = self.job.lock().await.reserve()?;

        let chunks = match self.chunk_inputs(&inputs, chunk_size, generation).await {
            Ok(chunks) => chunks,
            Err(e) => {
                self.job.lock().await.release(generation);
                return Err(e);
            }
        };

        let keys: Vec<String> = chunks.iter().map(|chunk| chunk.key.clone()).collect();
        let committed = self
            .job
            .lock()
            .await
            .begin(generation, chunks, mapper.into(), reducer.into());
        if let Err(e) = committed {
            warn!("discarding {} chunks: {e}", keys.len());
            self.delete_chunks(&keys).await;
            return Err(e);
        }

        info!(
            "chunked {} inputs into {} chunks of at most {chunk_size} bytes",
            inputs.len(),
            keys.len()
        );
        Ok(())
    }

    async fn chunk_inputs(
        &self,
        inputs: &[InputFile],
        chunk_size: usize,
        generation: u64,
    ) -> Result<Vec<ChunkRef>> {
        let mut chunker = Chunker::new(self.store.as_ref(), chunk_size, generation)?;
        let mut chunks = Vec::new();
        for input in inputs {
            match chunker.chunk(input).await {
                Ok(mut cut) => chunks.append(&mut cut),
                Err(e) => {
                    warn!("chunking `{}` failed: {e}", input.name);
                    self.delete_chunks(chunker.written()).await;
                    return Err(e);
                }
            }
        }
        Ok(chunks)
    }

    /// Hand out the next task. Never waits for work to become available.
    pub async fn next_task(&self) -> Task {
        let task = self.job.lock().await.next_task();
        match &task {
            Task::Map(map) => debug!("handing out map task for chunk {}", map.chunk.key),
            Task::Reduce(reduce) => debug!(
                "handing out reduce task {} for key `{}`",
                reduce.bucket_id, reduce.key
            ),
            Task::Wait | Task::Empty => {}
        }
        task
    }

    /// Submit the result of a map task as `[[key, value], ...]` JSON text.
    pub async fn submit_map_result(&self, payload: &str) -> Result<()> {
        let pairs = decode_pairs(payload).inspect_err(|e| warn!("rejected map result: {e}"))?;
        self.submit_map_pairs(pairs).await
    }

    pub async fn submit_map_pairs(&self, pairs: Vec<KeyValue>) -> Result<()> {
        self.job
            .lock()
            .await
            .accept_map_pairs(pairs)
            .inspect_err(|e| warn!("rejected map result: {e}"))
    }

    /// Submit the result of a reduce task as `{key: number, ...}` JSON text.
    pub async fn submit_reduce_result(&self, payload: &str) -> Result<()> {
        let partial =
            decode_partial(payload).inspect_err(|e| warn!("rejected reduce result: {e}"))?;
        self.submit_reduce_partial(partial).await
    }

    pub async fn submit_reduce_partial(&self, partial: Partial) -> Result<()> {
        self.job
            .lock()
            .await
            .accept_reduce_partial(partial)
            .inspect_err(|e| warn!("rejected reduce result: {e}"))
    }

    /// The result accumulated so far; complete once the job is done.
    pub async fn final_result(&self) -> Partial {
        self.job.lock().await.final_result().clone()
    }

    pub async fn status(&self) -> JobStatus {
        self.job.lock().await.status()
    }

    /// Contents of a chunk handed out with a map task.
    pub async fn read_chunk(&self, chunk: &ChunkRef) -> Result<Bytes> {
        self.store
            .get_chunk(&chunk.key)
            .await
            .map_err(CoordinatorError::Io)
    }

    /// Drop the job, whatever its phase, and delete its chunks.
    pub async fn reset(&self) {
        let (previous, chunks) = {
            let mut job = self.job.lock().await;
            (job.phase(), job.clear())
        };
        info!("job cleared (was {previous})");
        self.delete_owned(chunks).await;
    }

    /// Called once results have been consumed. Clears the job if it is
    /// done and reports whether it did.
    pub async fn finish(&self) -> bool {
        let chunks = {
            let mut job = self.job.lock().await;
            if job.phase() != Phase::Done {
                return false;
            }
            job.clear()
        };
        info!("finished job cleared");
        self.delete_owned(chunks).await;
        true
    }

    async fn delete_owned(&self, chunks: Vec<ChunkRef>) {
        let keys: Vec<String> = chunks.into_iter().map(|chunk| chunk.key).collect();
        self.delete_chunks(&keys).await;
    }

    async fn delete_chunks(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        if let Err(e) = self.store.delete_chunks(keys).await {
            warn!("failed to delete {} chunks: {e:#}", keys.len());
        }
    }
}
