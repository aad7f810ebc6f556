//! Aggregate progress of a running batch.
//!
//! [`ProgressReporter`] turns the shared counters and per-worker statuses into
//! a [`ProgressSnapshot`], and a [`ProgressSink`] decides how to show it.

pub mod render;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::pool::BatchCounters;
use crate::worker::{StatusView, WorkerStatus};

pub use render::{IndicatifSink, SuspendingWriter};

/// Lower bound for elapsed time in rate math
const MIN_ELAPSED: Duration = Duration::from_millis(1);

/// Estimated time until the batch drains
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eta {
    /// Nothing has finished yet, so there is no rate to extrapolate from
    Unknown,
    Remaining(Duration),
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eta::Unknown => write!(f, "unknown"),
            Eta::Remaining(d) => write!(f, "{:.1}min", d.as_secs_f64() / 60.0),
        }
    }
}

/// Renderable view of a batch at (roughly) one instant.
///
/// Worker entries are read one lock at a time, so a snapshot is only
/// eventually consistent with the workers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed: Duration,
    pub workers: Vec<StatusView>,
}

impl ProgressSnapshot {
    pub fn done(&self) -> usize {
        self.completed + self.failed + self.skipped
    }

    /// Percent of the batch finished, 0 for an empty batch
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.done() as f64 / self.total as f64 * 100.0
    }

    fn elapsed_secs(&self) -> f64 {
        self.elapsed.max(MIN_ELAPSED).as_secs_f64()
    }

    /// Finished jobs per minute
    pub fn rate_per_minute(&self) -> f64 {
        self.done() as f64 / self.elapsed_secs() * 60.0
    }

    pub fn eta(&self) -> Eta {
        let done = self.done();
        if done == 0 {
            return Eta::Unknown;
        }

        let per_sec = done as f64 / self.elapsed_secs();
        let remaining = self.total.saturating_sub(done) as f64;
        Eta::Remaining(Duration::from_secs_f64(remaining / per_sec))
    }

    /// One-line stats header
    pub fn summary_line(&self) -> String {
        format!(
            "📊 {}/{} ({:.1}%) | ✅ {} | ❌ {} | ⏭️ {} | Rate: {:.1}/min | ETA: {}",
            self.done(),
            self.total,
            self.percent(),
            self.completed,
            self.failed,
            self.skipped,
            self.rate_per_minute(),
            self.eta()
        )
    }
}

/// Builds snapshots from live batch state
#[derive(Clone)]
pub struct ProgressReporter {
    counters: Arc<BatchCounters>,
    statuses: Vec<Arc<WorkerStatus>>,
}

impl ProgressReporter {
    pub fn new(counters: Arc<BatchCounters>, statuses: Vec<Arc<WorkerStatus>>) -> Self {
        Self { counters, statuses }
    }

    /// Read-only; safe to call while workers are mutating their status
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.counters.total(),
            completed: self.counters.completed(),
            failed: self.counters.failed(),
            skipped: self.counters.skipped(),
            elapsed: self.counters.elapsed(),
            workers: self.statuses.iter().map(|s| s.view()).collect(),
        }
    }
}

/// Destination for progress snapshots
pub trait ProgressSink: Send + Sync {
    fn render(&self, snapshot: &ProgressSnapshot);

    /// Called once with the terminal state after every worker has exited
    fn finish(&self, snapshot: &ProgressSnapshot) {
        self.render(snapshot);
    }
}

/// Discards every snapshot
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn render(&self, _snapshot: &ProgressSnapshot) {}
}

/// Keeps every snapshot it is given, for inspection in tests
#[derive(Debug, Default)]
pub struct CapturingSink {
    rendered: Mutex<Vec<ProgressSnapshot>>,
    finished: Mutex<Option<ProgressSnapshot>>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every snapshot passed to `render`, in order
    pub fn rendered(&self) -> Vec<ProgressSnapshot> {
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The snapshot passed to `finish`, if the batch has ended
    pub fn finished(&self) -> Option<ProgressSnapshot> {
        self.finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressSink for CapturingSink {
    fn render(&self, snapshot: &ProgressSnapshot) {
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot.clone());
    }

    fn finish(&self, snapshot: &ProgressSnapshot) {
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
    }
}
