pub mod status;

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pipeline::{Outcome, SearchDownloadPipeline, DONE_PROGRESS};
use crate::pool::BatchCounters;
use crate::queue::JobQueue;

pub use status::{Phase, StatusView, WorkerStatus};

/// One member of the pool, draining the shared queue until it is empty or
/// the batch is cancelled
pub struct Worker {
    status: Arc<WorkerStatus>,
    queue: Arc<JobQueue>,
    counters: Arc<BatchCounters>,
    pipeline: SearchDownloadPipeline,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(
        status: Arc<WorkerStatus>,
        queue: Arc<JobQueue>,
        counters: Arc<BatchCounters>,
        pipeline: SearchDownloadPipeline,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            status,
            queue,
            counters,
            pipeline,
            cancel,
        }
    }

    /// Process jobs one at a time, returning how many this worker handled.
    ///
    /// The token is checked before every take. A job already taken always
    /// runs to its outcome so it is counted exactly once.
    pub async fn run(self) -> usize {
        let id = self.status.worker_id();
        let mut processed = 0;

        loop {
            if self.cancel.is_cancelled() {
                debug!(worker = id, "Shutdown observed, not taking more jobs");
                break;
            }

            let Some(job) = self.queue.try_take() else {
                debug!(worker = id, "Queue drained");
                break;
            };

            debug!(worker = id, "➡️ Claimed job {}: {}", job.id, job.label());
            let outcome = match AssertUnwindSafe(self.pipeline.run(&job, &self.status))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let reason = format!("collaborator panicked: {}", panic_message(panic.as_ref()));
                    warn!(worker = id, "❌ {}: {}", job.label(), reason);
                    self.status.update(Phase::Failed, None, DONE_PROGRESS);
                    Outcome::Failed { reason }
                }
            };
            self.counters.record(&outcome);
            processed += 1;

            self.status.reset();
        }

        self.status.reset();
        debug!(worker = id, "Exiting after {} jobs", processed);
        processed
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
