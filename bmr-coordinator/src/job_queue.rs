use std::collections::VecDeque;

/// Queue of tasks waiting to be handed out in the current phase.
///
/// A task leaves the queue exactly once and is never put back. Tasks are
/// independent of each other, so the order they are handed out in carries
/// no meaning; the most recently queued task goes first.
///
/// The queue itself is not synchronised. It lives inside the job state and
/// is only reached through the coordinator's lock, which is what makes a
/// dequeue atomic with respect to concurrent pollers.
#[derive(Debug, Clone)]
pub struct WorkQueue<T> {
    /// Tasks not yet handed out.
    pending: VecDeque<T>,

    /// Number of tasks handed out so far.
    dispatched: usize,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            dispatched: 0,
        }
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to be handed out.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of tasks which have been handed out.
    pub fn number_dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn enqueue(&mut self, task: T) {
        self.pending.push_back(task);
    }

    /// Remove a task from the queue, or `None` if nothing is left.
    pub fn try_dequeue(&mut self) -> Option<T> {
        let task = self.pending.pop_back()?;
        self.dispatched += 1;
        Some(task)
    }
}

impl<T> FromIterator<T> for WorkQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            pending: iter.into_iter().collect(),
            dispatched: 0,
        }
    }
}

impl<T> Extend<T> for WorkQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.pending.extend(iter);
    }
}
