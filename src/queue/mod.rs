use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::job::Job;

/// FIFO of pending jobs shared by every worker in a batch.
///
/// Taking never blocks: a worker that finds the queue empty exits instead of
/// waiting, so it keeps observing the shutdown token between jobs.
#[derive(Debug, Default)]
pub struct JobQueue {
    pending: Mutex<VecDeque<Job>>,
}

impl JobQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue pre-populated with `jobs` in order
    pub fn from_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        Self {
            pending: Mutex::new(jobs.into_iter().collect()),
        }
    }

    /// Append a job to the tail of the queue
    pub fn enqueue(&self, job: Job) {
        debug!("Queued job {} ({})", job.id, job.label());
        self.lock().push_back(job);
    }

    /// Remove and return the head of the queue, or `None` once drained
    pub fn try_take(&self) -> Option<Job> {
        self.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of jobs nobody has taken yet
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Job>> {
        // A panicking holder cannot leave the deque half-modified
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
