//! Batch track downloader: resolves catalog tracks to online audio through
//! yt-dlp and downloads them with a fixed pool of concurrent workers.

pub mod commands;
pub mod config;
pub mod error;
pub mod job;
pub mod naming;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod queue;
pub mod shutdown;
pub mod tracklist;
pub mod worker;
pub mod ytdlp;

pub use config::{AudioFormat, Config};
pub use error::BatchError;
pub use job::Job;
pub use pipeline::{Candidate, Outcome, SearchDownloadPipeline, TrackDownloader, TrackSearcher};
pub use pool::{BatchResult, BatchRunner};
pub use progress::{ProgressReporter, ProgressSink, ProgressSnapshot};
pub use queue::JobQueue;
pub use shutdown::ShutdownController;
pub use worker::{Phase, WorkerStatus};
