use serde::Serialize;
use std::sync::{PoisonError, RwLock};

/// Pipeline stage a worker is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Searching,
    Downloading,
    Completed,
    Failed,
}

impl Phase {
    /// Short label shown in the progress view
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Searching => "Searching",
            Phase::Downloading => "Downloading",
            Phase::Completed => "Completed",
            Phase::Failed => "Failed",
        }
    }
}

/// Point-in-time copy of one worker's status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub worker_id: usize,
    pub phase: Phase,
    pub label: String,
    pub progress: u8,
}

#[derive(Debug)]
struct StatusInner {
    phase: Phase,
    label: String,
    progress: u8,
}

/// Live status of a single worker.
///
/// Only the owning worker writes; the reporter reads. Each worker has its own
/// lock so status updates never contend across workers.
#[derive(Debug)]
pub struct WorkerStatus {
    worker_id: usize,
    inner: RwLock<StatusInner>,
}

impl WorkerStatus {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            inner: RwLock::new(StatusInner {
                phase: Phase::Idle,
                label: String::new(),
                progress: 0,
            }),
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Move to `phase`, optionally replacing the label.
    ///
    /// Progress never goes backwards within a job; use [`WorkerStatus::reset`]
    /// to return to idle at 0.
    pub fn update(&self, phase: Phase, label: Option<&str>, progress: u8) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.phase = phase;
        if let Some(label) = label {
            inner.label = label.to_string();
        }
        inner.progress = inner.progress.max(progress.min(100));
    }

    /// Back to idle with an empty label and no progress
    pub fn reset(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.phase = Phase::Idle;
        inner.label.clear();
        inner.progress = 0;
    }

    pub fn view(&self) -> StatusView {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        StatusView {
            worker_id: self.worker_id,
            phase: inner.phase,
            label: inner.label.clone(),
            progress: inner.progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_status_is_idle() {
        let status = WorkerStatus::new(3);
        let view = status.view();
        assert_eq!(view.worker_id, 3);
        assert_eq!(view.phase, Phase::Idle);
        assert_eq!(view.label, "");
        assert_eq!(view.progress, 0);
    }

    #[test]
    fn test_update_keeps_label_when_none() {
        let status = WorkerStatus::new(1);
        status.update(Phase::Searching, Some("Artist - Title"), 10);
        status.update(Phase::Failed, None, 100);

        let view = status.view();
        assert_eq!(view.phase, Phase::Failed);
        assert_eq!(view.label, "Artist - Title");
        assert_eq!(view.progress, 100);
    }

    #[test]
    fn test_progress_is_monotonic_until_reset() {
        let status = WorkerStatus::new(1);
        status.update(Phase::Downloading, Some("x"), 50);
        status.update(Phase::Downloading, None, 10);
        assert_eq!(status.view().progress, 50);

        status.update(Phase::Completed, None, 250);
        assert_eq!(status.view().progress, 100);

        status.reset();
        let view = status.view();
        assert_eq!(view.phase, Phase::Idle);
        assert_eq!(view.progress, 0);
        assert!(view.label.is_empty());
    }
}
