//! Per-job search-then-download logic.
//!
//! The pipeline drives the two collaborators for one job and folds every
//! possible result, including collaborator errors, into an [`Outcome`].

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::job::Job;
use crate::worker::status::{Phase, WorkerStatus};

/// Progress shown while the search collaborator runs
pub const SEARCH_PROGRESS: u8 = 10;
/// Progress shown while the download collaborator runs
pub const DOWNLOAD_PROGRESS: u8 = 50;
/// Progress of a job that reached a terminal outcome
pub const DONE_PROGRESS: u8 = 100;

/// A search result, ordered by relevance by whoever produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub url: String,
    pub duration_seconds: Option<u32>,
    pub channel: Option<String>,
}

/// Finds online audio matching a track
#[async_trait]
pub trait TrackSearcher: Send + Sync {
    /// Return candidates best match first. An empty list means no match.
    ///
    /// `duration_hint` is the catalog length of the track, if known.
    async fn search(&self, query: &str, duration_hint: Option<u32>) -> Result<Vec<Candidate>>;
}

/// Fetches a chosen candidate as a local audio file
#[async_trait]
pub trait TrackDownloader: Send + Sync {
    /// Download `candidate`, naming the output after `job`. `Ok(true)` is the
    /// only success signal.
    async fn download(&self, candidate: &Candidate, job: &Job) -> Result<bool>;

    /// Whether the output for `job` already exists locally
    async fn already_present(&self, _job: &Job) -> bool {
        false
    }
}

/// How a single job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed { reason: String },
    Skipped,
}

/// Runs search then download for one job at a time
#[derive(Clone)]
pub struct SearchDownloadPipeline {
    searcher: Arc<dyn TrackSearcher>,
    downloader: Arc<dyn TrackDownloader>,
}

impl SearchDownloadPipeline {
    pub fn new(searcher: Arc<dyn TrackSearcher>, downloader: Arc<dyn TrackDownloader>) -> Self {
        Self {
            searcher,
            downloader,
        }
    }

    /// Process `job`, reporting each stage through `status`.
    ///
    /// Never returns an error: collaborator failures become `Outcome::Failed`
    /// so the calling worker can move on to the next job.
    pub async fn run(&self, job: &Job, status: &WorkerStatus) -> Outcome {
        let worker = status.worker_id();
        let label = job.label();

        if self.downloader.already_present(job).await {
            info!(worker, "⏭️ Already downloaded: {}", label);
            status.update(
                Phase::Completed,
                Some(&format!("{label} (already downloaded)")),
                DONE_PROGRESS,
            );
            return Outcome::Skipped;
        }

        status.update(Phase::Searching, Some(&label), SEARCH_PROGRESS);
        let query = job.search_query();
        debug!(worker, "Searching for '{}'", query);

        let candidates = match self.searcher.search(&query, job.duration_seconds).await {
            Ok(candidates) => candidates,
            Err(e) => return Self::fail(status, &label, format!("search failed: {e:#}")),
        };

        let Some(candidate) = candidates.into_iter().next() else {
            return Self::fail(status, &label, "no match found");
        };

        status.update(Phase::Downloading, Some(&candidate.title), DOWNLOAD_PROGRESS);
        debug!(worker, "Downloading {} for '{}'", candidate.url, label);

        match self.downloader.download(&candidate, job).await {
            Ok(true) => {
                status.update(Phase::Completed, None, DONE_PROGRESS);
                info!(worker, "✅ Downloaded: {}", label);
                Outcome::Completed
            }
            Ok(false) => Self::fail(status, &label, "download produced no file"),
            Err(e) => Self::fail(status, &label, format!("download failed: {e:#}")),
        }
    }

    fn fail(status: &WorkerStatus, label: &str, reason: impl Into<String>) -> Outcome {
        let reason = reason.into();
        warn!(worker = status.worker_id(), "❌ {}: {}", label, reason);
        status.update(Phase::Failed, None, DONE_PROGRESS);
        Outcome::Failed { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSearcher(Vec<Candidate>);

    #[async_trait]
    impl TrackSearcher for FixedSearcher {
        async fn search(&self, _query: &str, _hint: Option<u32>) -> Result<Vec<Candidate>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSearcher;

    #[async_trait]
    impl TrackSearcher for BrokenSearcher {
        async fn search(&self, _query: &str, _hint: Option<u32>) -> Result<Vec<Candidate>> {
            Err(anyhow!("connection reset"))
        }
    }

    struct RecordingDownloader {
        result: Result<bool, String>,
        present: bool,
        calls: AtomicUsize,
    }

    impl RecordingDownloader {
        fn returning(result: Result<bool, String>) -> Self {
            Self {
                result,
                present: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TrackDownloader for RecordingDownloader {
        async fn download(&self, _candidate: &Candidate, _job: &Job) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(|e| anyhow!(e))
        }

        async fn already_present(&self, _job: &Job) -> bool {
            self.present
        }
    }

    fn candidate(title: &str) -> Candidate {
        Candidate {
            id: "abc123".to_string(),
            title: title.to_string(),
            url: "https://www.youtube.com/watch?v=abc123".to_string(),
            duration_seconds: Some(200),
            channel: None,
        }
    }

    fn pipeline(searcher: impl TrackSearcher + 'static, downloader: Arc<RecordingDownloader>) -> SearchDownloadPipeline {
        SearchDownloadPipeline::new(Arc::new(searcher), downloader)
    }

    #[tokio::test]
    async fn test_successful_job_completes() {
        let downloader = Arc::new(RecordingDownloader::returning(Ok(true)));
        let pipeline = pipeline(
            FixedSearcher(vec![candidate("Best match"), candidate("Worse match")]),
            Arc::clone(&downloader),
        );
        let status = WorkerStatus::new(1);

        let outcome = pipeline.run(&Job::new("Artist", "Song", None), &status).await;

        assert_eq!(outcome, Outcome::Completed);
        let view = status.view();
        assert_eq!(view.phase, Phase::Completed);
        assert_eq!(view.label, "Best match");
        assert_eq!(view.progress, 100);
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_candidates_fails_without_downloading() {
        let downloader = Arc::new(RecordingDownloader::returning(Ok(true)));
        let pipeline = pipeline(FixedSearcher(Vec::new()), Arc::clone(&downloader));
        let status = WorkerStatus::new(1);

        let outcome = pipeline.run(&Job::new("Artist", "Song", None), &status).await;

        assert_eq!(
            outcome,
            Outcome::Failed {
                reason: "no match found".to_string()
            }
        );
        assert_eq!(status.view().phase, Phase::Failed);
        assert_eq!(status.view().label, "Artist - Song");
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_error_degrades_to_failed() {
        let downloader = Arc::new(RecordingDownloader::returning(Ok(true)));
        let pipeline = pipeline(BrokenSearcher, downloader);
        let status = WorkerStatus::new(2);

        let outcome = pipeline.run(&Job::new("Artist", "Song", None), &status).await;

        match outcome {
            Outcome::Failed { reason } => assert!(reason.contains("connection reset")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(status.view().progress, 100);
    }

    #[tokio::test]
    async fn test_download_false_and_error_both_fail() {
        for result in [Ok(false), Err("yt-dlp exited with 1".to_string())] {
            let downloader = Arc::new(RecordingDownloader::returning(result));
            let pipeline = pipeline(FixedSearcher(vec![candidate("x")]), downloader);
            let status = WorkerStatus::new(1);

            let outcome = pipeline.run(&Job::new("A", "B", None), &status).await;
            assert!(matches!(outcome, Outcome::Failed { .. }));
            assert_eq!(status.view().phase, Phase::Failed);
        }
    }

    #[tokio::test]
    async fn test_present_output_is_skipped() {
        let downloader = Arc::new(RecordingDownloader {
            result: Ok(true),
            present: true,
            calls: AtomicUsize::new(0),
        });
        let pipeline = pipeline(FixedSearcher(vec![candidate("x")]), Arc::clone(&downloader));
        let status = WorkerStatus::new(1);

        let outcome = pipeline.run(&Job::new("A", "B", None), &status).await;

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
        assert_eq!(status.view().label, "A - B (already downloaded)");
    }
}
