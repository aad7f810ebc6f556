//! Fixed-size worker pool that drains one batch of jobs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::BatchError;
use crate::job::Job;
use crate::pipeline::{Outcome, SearchDownloadPipeline};
use crate::progress::{NullSink, ProgressReporter, ProgressSink};
use crate::queue::JobQueue;
use crate::worker::{Worker, WorkerStatus};

/// How often the reporting loop wakes up
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Minimum time between two redraws
pub const DEFAULT_REDRAW_INTERVAL: Duration = Duration::from_secs(1);

/// Shared tallies for one batch. Each outcome is recorded exactly once by
/// the worker that produced it.
#[derive(Debug)]
pub struct BatchCounters {
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    total: usize,
    started: Instant,
}

impl BatchCounters {
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            total,
            started: Instant::now(),
        }
    }

    pub fn record(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Completed => &self.completed,
            Outcome::Failed { .. } => &self.failed,
            Outcome::Skipped => &self.skipped,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn done(&self) -> usize {
        self.completed() + self.failed() + self.skipped()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Final tallies of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub completed: usize,
    pub failed: usize,
    /// Jobs the pipeline classified as skipped (output already present)
    pub skipped: usize,
    /// Jobs still queued when shutdown stopped the workers
    pub not_started: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub interrupted: bool,
}

impl BatchResult {
    pub fn done(&self) -> usize {
        self.completed + self.failed + self.skipped
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}/{} tracks processed in {:.1}s: {} downloaded, {} failed, {} skipped",
            self.done(),
            self.total,
            self.elapsed.as_secs_f64(),
            self.completed,
            self.failed,
            self.skipped
        );
        if self.interrupted {
            line.push_str(&format!(" ({} not started, interrupted)", self.not_started));
        }
        line
    }
}

/// Runs batches of jobs through a [`SearchDownloadPipeline`]
pub struct BatchRunner {
    pipeline: SearchDownloadPipeline,
    cancel: CancellationToken,
    sink: Arc<dyn ProgressSink>,
    poll_interval: Duration,
    redraw_interval: Duration,
}

impl BatchRunner {
    /// `cancel` is this run's shutdown signal. Use a fresh token per run so a
    /// previous interrupt never leaks into the next batch.
    pub fn new(pipeline: SearchDownloadPipeline, cancel: CancellationToken) -> Self {
        Self {
            pipeline,
            cancel,
            sink: Arc::new(NullSink),
            poll_interval: DEFAULT_POLL_INTERVAL,
            redraw_interval: DEFAULT_REDRAW_INTERVAL,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_intervals(mut self, poll: Duration, redraw: Duration) -> Self {
        // A zero period would make tokio's interval panic
        self.poll_interval = poll.max(Duration::from_millis(1));
        self.redraw_interval = redraw;
        self
    }

    /// Process `jobs` with `worker_count` concurrent workers.
    ///
    /// Returns once every worker has exited, either because the queue drained
    /// or because the cancellation token fired.
    pub async fn submit_batch(&self, jobs: Vec<Job>, worker_count: usize) -> Result<BatchResult, BatchError> {
        if worker_count == 0 {
            return Err(BatchError::InvalidWorkerCount(worker_count));
        }

        let total = jobs.len();
        let queue = Arc::new(JobQueue::from_jobs(jobs));
        let counters = Arc::new(BatchCounters::new(total));
        let statuses: Vec<Arc<WorkerStatus>> = (1..=worker_count)
            .map(|id| Arc::new(WorkerStatus::new(id)))
            .collect();
        let reporter = ProgressReporter::new(Arc::clone(&counters), statuses.clone());

        info!("🚀 Starting batch of {} tracks with {} workers", total, worker_count);

        let mut workers = JoinSet::new();
        for status in &statuses {
            let worker = Worker::new(
                Arc::clone(status),
                Arc::clone(&queue),
                Arc::clone(&counters),
                self.pipeline.clone(),
                self.cancel.clone(),
            );
            workers.spawn(worker.run());
        }

        self.sink.render(&reporter.snapshot());
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_draw = Instant::now();
        let mut shutdown_seen = false;

        while !workers.is_empty() {
            tokio::select! {
                joined = workers.join_next() => {
                    if let Some(Err(e)) = joined {
                        error!("Worker task ended abnormally: {}", e);
                    }
                }
                _ = ticker.tick(), if !shutdown_seen => {
                    if last_draw.elapsed() >= self.redraw_interval {
                        self.sink.render(&reporter.snapshot());
                        last_draw = Instant::now();
                    }
                }
                _ = self.cancel.cancelled(), if !shutdown_seen => {
                    info!("🛑 Shutdown requested. Waiting for in-flight jobs to finish.");
                    shutdown_seen = true;
                }
            }
        }

        self.sink.finish(&reporter.snapshot());

        let result = BatchResult {
            completed: counters.completed(),
            failed: counters.failed(),
            skipped: counters.skipped(),
            not_started: queue.len(),
            total,
            elapsed: counters.elapsed(),
            interrupted: self.cancel.is_cancelled(),
        };
        info!("🏁 {}", result.summary());

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Candidate, TrackDownloader, TrackSearcher};
    use crate::progress::CapturingSink;
    use anyhow::Result;
    use async_trait::async_trait;

    struct AlwaysFound;

    #[async_trait]
    impl TrackSearcher for AlwaysFound {
        async fn search(&self, query: &str, _hint: Option<u32>) -> Result<Vec<Candidate>> {
            Ok(vec![Candidate {
                id: query.to_string(),
                title: query.to_string(),
                url: format!("https://example.invalid/{query}"),
                duration_seconds: None,
                channel: None,
            }])
        }
    }

    struct AlwaysSucceeds;

    #[async_trait]
    impl TrackDownloader for AlwaysSucceeds {
        async fn download(&self, _candidate: &Candidate, _job: &Job) -> Result<bool> {
            tokio::task::yield_now().await;
            Ok(true)
        }
    }

    fn runner(cancel: CancellationToken) -> BatchRunner {
        let pipeline = SearchDownloadPipeline::new(Arc::new(AlwaysFound), Arc::new(AlwaysSucceeds));
        BatchRunner::new(pipeline, cancel)
    }

    fn jobs(n: usize) -> Vec<Job> {
        (0..n).map(|i| Job::new("Artist", format!("Track {i}"), None)).collect()
    }

    #[test]
    fn test_counters_record_each_outcome() {
        let counters = BatchCounters::new(3);
        counters.record(&Outcome::Completed);
        counters.record(&Outcome::Failed {
            reason: "x".to_string(),
        });
        counters.record(&Outcome::Skipped);

        assert_eq!(counters.completed(), 1);
        assert_eq!(counters.failed(), 1);
        assert_eq!(counters.skipped(), 1);
        assert_eq!(counters.done(), counters.total());
    }

    #[tokio::test]
    async fn test_zero_workers_is_rejected() {
        let result = runner(CancellationToken::new()).submit_batch(jobs(3), 0).await;
        assert_eq!(result, Err(BatchError::InvalidWorkerCount(0)));
    }

    #[tokio::test]
    async fn test_empty_batch_returns_zeroes() {
        let sink = Arc::new(CapturingSink::new());
        let result = runner(CancellationToken::new())
            .with_sink(sink.clone())
            .submit_batch(Vec::new(), 4)
            .await
            .unwrap();

        assert_eq!(result.total, 0);
        assert_eq!(result.done(), 0);
        assert_eq!(result.not_started, 0);
        assert!(!result.interrupted);

        let last = sink.finished().unwrap();
        assert_eq!(last.percent(), 0.0);
        assert_eq!(last.workers.len(), 4);
    }

    #[tokio::test]
    async fn test_all_jobs_complete() {
        let result = runner(CancellationToken::new())
            .submit_batch(jobs(20), 3)
            .await
            .unwrap();

        assert_eq!(result.completed, 20);
        assert_eq!(result.failed, 0);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.not_started, 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_takes_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = runner(cancel).submit_batch(jobs(5), 2).await.unwrap();

        assert!(result.interrupted);
        assert_eq!(result.done(), 0);
        assert_eq!(result.not_started, 5);
        assert!(result.summary().contains("interrupted"));
    }

    #[tokio::test]
    async fn test_final_snapshot_shows_idle_workers() {
        let sink = Arc::new(CapturingSink::new());
        runner(CancellationToken::new())
            .with_sink(sink.clone())
            .submit_batch(jobs(6), 2)
            .await
            .unwrap();

        let last = sink.finished().unwrap();
        assert_eq!(last.done(), 6);
        assert!(last.workers.iter().all(|w| w.progress == 0 && w.label.is_empty()));
    }
}
