use thiserror::Error;

/// Errors that reject a batch before any worker starts.
///
/// Per-job failures never surface here; the pipeline absorbs them into a
/// `Failed` outcome.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    /// The pool needs at least one worker.
    #[error("worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),
}
