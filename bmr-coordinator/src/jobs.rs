use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use common::{KeyValue, Partial};

use crate::aggregate::Aggregator;
use crate::chunker::ChunkRef;
use crate::error::{CoordinatorError, Result};
use crate::job_queue::WorkQueue;
use crate::partition::{ReduceUnit, Shuffle};
use crate::task::{MapTask, ReduceTask, Task};

/// Phase of the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No job.
    Idle,

    /// A job has been accepted and its input is being chunked.
    Starting,

    /// Map tasks are waiting to be handed out.
    Mapping,

    /// Every map task is out; waiting for the last results.
    AwaitingMapCompletion,

    /// Reduce tasks are being handed out or are still out.
    Reducing,

    /// Every reduce result is in.
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Starting => "starting",
            Phase::Mapping => "mapping",
            Phase::AwaitingMapCompletion => "awaiting map completion",
            Phase::Reducing => "reducing",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub phase: Phase,
    pub queued_map_tasks: usize,
    pub dispatched_map_tasks: usize,
    pub outstanding_map_tasks: usize,
    pub queued_reduce_tasks: usize,
    pub dispatched_reduce_tasks: usize,
    pub outstanding_reduce_tasks: usize,
    pub intermediate_keys: usize,
    pub result_keys: usize,
}

/// State of the single job a coordinator runs.
///
/// Every method runs to completion without suspending, so holding the
/// coordinator's lock around a call makes the call, and every phase
/// transition it triggers, one atomic step.
#[derive(Debug)]
pub struct Job {
    /// The current phase of the job.
    phase: Phase,

    /// Bumped by every `reserve`; survives `clear`.
    generation: u64,

    /// Opaque code shipped with every map task.
    mapper: String,

    /// Opaque code shipped with every reduce task.
    reducer: String,

    /// Every chunk of the job, kept so they can be deleted on reset.
    chunks: Vec<ChunkRef>,

    map_queue: WorkQueue<ChunkRef>,

    /// Map tasks queued or handed out whose result has not arrived.
    outstanding_maps: usize,

    shuffle: Shuffle,

    reduce_queue: WorkQueue<ReduceUnit>,

    /// Reduce tasks queued or handed out whose result has not arrived.
    outstanding_reduces: usize,

    result: Aggregator,
}

impl Default for Job {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            generation: 0,
            mapper: String::new(),
            reducer: String::new(),
            chunks: Vec::new(),
            map_queue: WorkQueue::new(),
            outstanding_maps: 0,
            shuffle: Shuffle::new(),
            reduce_queue: WorkQueue::new(),
            outstanding_reduces: 0,
            result: Aggregator::new(),
        }
    }
}

impl Job {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a job occupies the coordinator.
    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Fails with `AlreadyRunning` unless the coordinator is idle.
    pub fn ensure_idle(&self) -> Result<()> {
        match self.phase {
            Phase::Idle => Ok(()),
            phase => Err(CoordinatorError::AlreadyRunning(phase)),
        }
    }

    /// Claim the idle coordinator for a job whose input is about to be
    /// chunked. Returns the generation that identifies the claim.
    pub fn reserve(&mut self) -> Result<u64> {
        self.ensure_idle()?;
        self.clear();
        self.generation += 1;
        self.phase = Phase::Starting;
        Ok(self.generation)
    }

    /// Whether the claim made for `generation` is still in place.
    pub fn holds(&self, generation: u64) -> bool {
        self.phase == Phase::Starting && self.generation == generation
    }

    /// Drop a claim whose chunking failed. A claim already dropped by a
    /// reset is left alone.
    pub fn release(&mut self, generation: u64) {
        if self.holds(generation) {
            self.phase = Phase::Idle;
        }
    }

    /// Begin the job claimed for `generation` with one map task per chunk.
    pub fn begin(
        &mut self,
        generation: u64,
        chunks: Vec<ChunkRef>,
        mapper: String,
        reducer: String,
    ) -> Result<()> {
        if !self.holds(generation) {
            return Err(CoordinatorError::StartCancelled);
        }

        self.map_queue = chunks.iter().cloned().collect();
        self.outstanding_maps = chunks.len();
        self.chunks = chunks;
        self.mapper = mapper;
        self.reducer = reducer;
        self.phase = Phase::Mapping;

        info!("job started with {} map tasks", self.outstanding_maps);
        self.advance();
        Ok(())
    }

    /// Hand out the next task of the current phase.
    pub fn next_task(&mut self) -> Task {
        let task = match self.phase {
            Phase::Idle | Phase::Done => Task::Empty,
            Phase::Starting | Phase::AwaitingMapCompletion => Task::Wait,
            Phase::Mapping => match self.map_queue.try_dequeue() {
                Some(chunk) => Task::Map(MapTask {
                    chunk,
                    mapper: self.mapper.clone(),
                }),
                None => Task::Wait,
            },
            Phase::Reducing => match self.reduce_queue.try_dequeue() {
                Some(unit) => Task::Reduce(ReduceTask {
                    bucket_id: unit.bucket_id,
                    key: unit.key,
                    values: unit.values,
                    reducer: self.reducer.clone(),
                }),
                None => Task::Wait,
            },
        };

        self.advance();
        task
    }

    /// Record the output of one map task.
    pub fn accept_map_pairs(&mut self, pairs: Vec<KeyValue>) -> Result<()> {
        let in_flight = match self.phase {
            Phase::Mapping | Phase::AwaitingMapCompletion => {
                self.outstanding_maps - self.map_queue.len()
            }
            _ => 0,
        };
        if in_flight == 0 {
            return Err(CoordinatorError::UnexpectedSubmission {
                kind: "map",
                phase: self.phase,
            });
        }

        let emitted = pairs.len();
        let new_keys = self.shuffle.partition(pairs);
        self.outstanding_maps -= 1;
        debug!(
            "map result with {emitted} pairs ({new_keys} new keys), {} map tasks outstanding",
            self.outstanding_maps
        );

        self.advance();
        Ok(())
    }

    /// Record the output of one reduce task.
    pub fn accept_reduce_partial(&mut self, partial: Partial) -> Result<()> {
        let in_flight = match self.phase {
            Phase::Reducing => self.outstanding_reduces - self.reduce_queue.len(),
            _ => 0,
        };
        if in_flight == 0 {
            return Err(CoordinatorError::UnexpectedSubmission {
                kind: "reduce",
                phase: self.phase,
            });
        }

        let keys = partial.len();
        self.result.merge(partial)?;
        self.outstanding_reduces -= 1;
        debug!(
            "reduce result with {keys} keys, {} reduce tasks outstanding",
            self.outstanding_reduces
        );

        self.advance();
        Ok(())
    }

    /// Apply every phase transition the current state allows.
    fn advance(&mut self) {
        loop {
            let next = match self.phase {
                Phase::Mapping if self.map_queue.is_empty() => Phase::AwaitingMapCompletion,
                Phase::AwaitingMapCompletion if self.outstanding_maps == 0 => {
                    let units = std::mem::take(&mut self.shuffle).into_reduce_units();
                    self.outstanding_reduces = units.len();
                    self.reduce_queue = units.into_iter().collect();
                    Phase::Reducing
                }
                Phase::Reducing if self.reduce_queue.is_empty() && self.outstanding_reduces == 0 => {
                    Phase::Done
                }
                _ => return,
            };

            info!("job phase {} -> {}", self.phase, next);
            if next == Phase::Reducing {
                info!("{} reduce tasks queued", self.outstanding_reduces);
            }
            self.phase = next;
        }
    }

    pub fn final_result(&self) -> &Partial {
        self.result.totals()
    }

    pub fn chunks(&self) -> &[ChunkRef] {
        &self.chunks
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            phase: self.phase,
            queued_map_tasks: self.map_queue.len(),
            dispatched_map_tasks: self.map_queue.number_dispatched(),
            outstanding_map_tasks: self.outstanding_maps,
            queued_reduce_tasks: self.reduce_queue.len(),
            dispatched_reduce_tasks: self.reduce_queue.number_dispatched(),
            outstanding_reduce_tasks: self.outstanding_reduces,
            intermediate_keys: self.shuffle.len(),
            result_keys: self.result.len(),
        }
    }

    /// Drop all job data and return to `Idle`. Returns the chunks the job
    /// owned so the caller can remove them from the store.
    pub fn clear(&mut self) -> Vec<ChunkRef> {
        let chunks = std::mem::take(&mut self.chunks);
        *self = Job {
            generation: self.generation,
            ..Job::default()
        };
        chunks
    }
}

#[cfg(test)]
mod tests {
    use common::codec::single;
    use serde_json::Number;

    use super::*;

    fn chunk(n: usize) -> ChunkRef {
        ChunkRef {
            key: format!("c_{n}.txt"),
            source: "input".into(),
            len: 1,
        }
    }

    fn started(chunks: usize) -> Job {
        let mut job = Job::new();
        let generation = job.reserve().unwrap();
        job.begin(generation, (1..=chunks).map(chunk).collect(), "map".into(), "reduce".into())
            .unwrap();
        job
    }

    fn take_map(job: &mut Job) -> MapTask {
        match job.next_task() {
            Task::Map(task) => task,
            other => panic!("expected a map task, got {other:?}"),
        }
    }

    fn take_reduce(job: &mut Job) -> ReduceTask {
        match job.next_task() {
            Task::Reduce(task) => task,
            other => panic!("expected a reduce task, got {other:?}"),
        }
    }

    #[test]
    fn idle_job_has_nothing_to_hand_out() {
        let mut job = Job::new();
        assert_eq!(job.phase(), Phase::Idle);
        assert_eq!(job.next_task(), Task::Empty);
        assert!(!job.is_active());
    }

    #[test]
    fn last_map_handed_out_moves_to_awaiting() {
        let mut job = started(2);
        assert_eq!(job.phase(), Phase::Mapping);

        let task = take_map(&mut job);
        assert_eq!(task.mapper, "map");
        assert_eq!(job.phase(), Phase::Mapping);

        take_map(&mut job);
        assert_eq!(job.phase(), Phase::AwaitingMapCompletion);
        assert_eq!(job.next_task(), Task::Wait);
    }

    #[test]
    fn last_map_result_creates_reduce_tasks() {
        let mut job = started(2);
        take_map(&mut job);
        take_map(&mut job);

        job.accept_map_pairs(vec![KeyValue::new("a", 1), KeyValue::new("b", 1)])
            .unwrap();
        assert_eq!(job.phase(), Phase::AwaitingMapCompletion);
        assert_eq!(job.status().intermediate_keys, 2);

        job.accept_map_pairs(vec![KeyValue::new("a", 1)]).unwrap();
        assert_eq!(job.phase(), Phase::Reducing);

        let status = job.status();
        assert_eq!(status.outstanding_map_tasks, 0);
        assert_eq!(status.queued_reduce_tasks, 2);
        assert_eq!(status.outstanding_reduce_tasks, 2);
    }

    #[test]
    fn results_can_arrive_while_maps_are_still_queued() {
        let mut job = started(3);
        take_map(&mut job);
        job.accept_map_pairs(vec![KeyValue::new("a", 1)]).unwrap();
        assert_eq!(job.phase(), Phase::Mapping);
        assert_eq!(job.status().outstanding_map_tasks, 2);
    }

    #[test]
    fn reduce_completion_requires_every_result() {
        let mut job = started(1);
        take_map(&mut job);
        job.accept_map_pairs(vec![KeyValue::new("a", 1), KeyValue::new("b", 1)])
            .unwrap();

        let first = take_reduce(&mut job);
        let second = take_reduce(&mut job);
        assert_eq!(first.reducer, "reduce");
        assert_eq!(job.phase(), Phase::Reducing);
        assert_eq!(job.next_task(), Task::Wait);

        job.accept_reduce_partial(single(first.key.clone(), 1)).unwrap();
        assert_eq!(job.phase(), Phase::Reducing);

        job.accept_reduce_partial(single(second.key.clone(), 1)).unwrap();
        assert_eq!(job.phase(), Phase::Done);
        assert_eq!(job.next_task(), Task::Empty);
        assert_eq!(job.final_result().len(), 2);
    }

    #[test]
    fn submissions_without_a_task_in_flight_are_rejected() {
        let mut job = started(2);
        assert!(matches!(
            job.accept_map_pairs(vec![KeyValue::new("a", 1)]),
            Err(CoordinatorError::UnexpectedSubmission { kind: "map", phase: Phase::Mapping })
        ));
        assert!(matches!(
            job.accept_reduce_partial(single("a", 1)),
            Err(CoordinatorError::UnexpectedSubmission { kind: "reduce", .. })
        ));
        assert_eq!(job.status().outstanding_map_tasks, 2);
        assert_eq!(job.status().intermediate_keys, 0);

        let mut idle = Job::new();
        assert!(idle.accept_map_pairs(vec![]).is_err());
    }

    #[test]
    fn overflowing_partial_changes_nothing() {
        let mut job = started(1);
        take_map(&mut job);
        job.accept_map_pairs(vec![KeyValue::new("a", 1), KeyValue::new("b", 1)])
            .unwrap();
        take_reduce(&mut job);

        let huge = Number::from_f64(f64::MAX).unwrap();
        job.accept_reduce_partial(single("a", huge.clone())).unwrap();

        let before = job.status();
        take_reduce(&mut job);
        assert!(matches!(
            job.accept_reduce_partial(single("a", huge)),
            Err(CoordinatorError::MalformedPayload(_))
        ));
        assert_eq!(job.status().outstanding_reduce_tasks, before.outstanding_reduce_tasks);
    }

    #[test]
    fn empty_job_goes_straight_to_done() {
        let job = started(0);
        assert_eq!(job.phase(), Phase::Done);
        assert!(job.final_result().is_empty());
    }

    #[test]
    fn maps_without_output_skip_reducing() {
        let mut job = started(1);
        take_map(&mut job);
        job.accept_map_pairs(vec![]).unwrap();
        assert_eq!(job.phase(), Phase::Done);
    }

    #[test]
    fn reserve_requires_idle_and_clear_returns_to_idle() {
        let mut job = started(1);
        assert!(matches!(
            job.reserve(),
            Err(CoordinatorError::AlreadyRunning(Phase::Mapping))
        ));

        let chunks = job.clear();
        assert_eq!(chunks, vec![chunk(1)]);
        assert_eq!(job.phase(), Phase::Idle);
        assert!(job.chunks().is_empty());

        let generation = job.reserve().unwrap();
        assert!(job.begin(generation, vec![chunk(2)], "m".into(), "r".into()).is_ok());
    }

    #[test]
    fn starting_job_asks_pollers_to_wait() {
        let mut job = Job::new();
        let generation = job.reserve().unwrap();

        assert_eq!(job.phase(), Phase::Starting);
        assert!(job.is_active());
        assert_eq!(job.next_task(), Task::Wait);
        assert!(matches!(
            job.reserve(),
            Err(CoordinatorError::AlreadyRunning(Phase::Starting))
        ));
        assert!(matches!(
            job.accept_map_pairs(vec![KeyValue::new("a", 1)]),
            Err(CoordinatorError::UnexpectedSubmission { phase: Phase::Starting, .. })
        ));

        job.release(generation);
        assert_eq!(job.phase(), Phase::Idle);
    }

    #[test]
    fn cleared_reservation_cannot_begin() {
        let mut job = Job::new();
        let stale = job.reserve().unwrap();
        job.clear();

        let current = job.reserve().unwrap();
        assert_ne!(stale, current);
        assert!(matches!(
            job.begin(stale, vec![chunk(1)], "m".into(), "r".into()),
            Err(CoordinatorError::StartCancelled)
        ));

        // A stale release must not drop the newer claim.
        job.release(stale);
        assert_eq!(job.phase(), Phase::Starting);
        assert!(job.begin(current, vec![chunk(2)], "m".into(), "r".into()).is_ok());
        assert_eq!(job.phase(), Phase::Mapping);
    }

    #[test]
    fn status_counts_dispatched_tasks() {
        let mut job = started(3);
        take_map(&mut job);
        take_map(&mut job);

        let status = job.status();
        assert_eq!(status.queued_map_tasks, 1);
        assert_eq!(status.dispatched_map_tasks, 2);
        assert_eq!(status.outstanding_map_tasks, 3);
        assert_eq!(status.dispatched_reduce_tasks, 0);
    }
}
