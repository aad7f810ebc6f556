use anyhow::{anyhow, Result};
use indicatif::MultiProgress;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::pipeline::SearchDownloadPipeline;
use crate::pool::{BatchResult, BatchRunner};
use crate::progress::IndicatifSink;
use crate::shutdown::ShutdownController;
use crate::tracklist::load_jobs;
use crate::ytdlp::YtDlp;

/// Command to download every track of a tracklist
pub struct DownloadCommand {
    tracklist: PathBuf,
    config: Config,
    multi: MultiProgress,
}

impl DownloadCommand {
    /// `multi` is where the live progress view is drawn
    pub fn new(tracklist: PathBuf, config: Config, multi: MultiProgress) -> Self {
        Self {
            tracklist,
            config,
            multi,
        }
    }

    pub async fn execute(&self) -> Result<BatchResult> {
        if !self.tracklist.exists() {
            return Err(anyhow!("Tracklist does not exist: {:?}", self.tracklist));
        }

        if !self.tracklist.is_file() {
            return Err(anyhow!("Path is not a file: {:?}", self.tracklist));
        }

        self.config.validate()?;

        let jobs = load_jobs(&self.tracklist).await?;
        let ytdlp = Arc::new(YtDlp::from_config(&self.config)?);

        let mode = if self.config.low_priority {
            "low priority"
        } else {
            "foreground"
        };
        info!(
            "✅ Downloading {} tracks to {:?} as {} with {} workers ({})",
            jobs.len(),
            ytdlp.output_dir(),
            self.config.audio_format.extension(),
            self.config.workers,
            mode
        );

        let shutdown = ShutdownController::new();
        let listener = shutdown.install();

        let pipeline = SearchDownloadPipeline::new(ytdlp.clone(), ytdlp);
        let runner = BatchRunner::new(pipeline, shutdown.token())
            .with_sink(Arc::new(IndicatifSink::new(self.multi.clone())))
            .with_intervals(self.config.poll_interval(), self.config.redraw_interval());

        let result = runner.submit_batch(jobs, self.config.workers).await;
        listener.abort();
        let result = result?;

        if shutdown.is_requested() {
            warn!(
                "🛑 Stopped by interrupt; {} tracks were not started",
                result.not_started
            );
        }

        Ok(result)
    }

    pub fn print_summary(&self, result: &BatchResult) {
        println!("\n🏁 {}", result.summary());
        if result.failed > 0 {
            println!("   Failed tracks are listed in the warnings above.");
        }
        println!("   Output: {}", self.config.output_dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use std::fs;
    use tempfile::TempDir;

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn config(output_dir: PathBuf) -> Config {
        Config {
            output_dir,
            ytdlp_path: Some(PathBuf::from("/nonexistent/yt-dlp")),
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg")),
            workers: 2,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_download_nonexistent_tracklist() {
        let temp_dir = TempDir::new().unwrap();
        let cmd = DownloadCommand::new(
            PathBuf::from("/nonexistent/set.txt"),
            config(temp_dir.path().to_path_buf()),
            hidden(),
        );

        assert!(cmd.execute().await.is_err());
    }

    #[tokio::test]
    async fn test_download_rejects_zero_workers() {
        let temp_dir = TempDir::new().unwrap();
        let tracklist = temp_dir.path().join("set.txt");
        fs::write(&tracklist, "A - B\n").unwrap();

        let mut config = config(temp_dir.path().to_path_buf());
        config.workers = 0;

        let result = DownloadCommand::new(tracklist, config, hidden()).execute().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_broken_tool_fails_jobs_without_aborting_batch() {
        let temp_dir = TempDir::new().unwrap();
        let tracklist = temp_dir.path().join("set.txt");
        fs::write(&tracklist, "A - B\nC - D\nE - F\n").unwrap();

        let result = DownloadCommand::new(tracklist, config(temp_dir.path().join("out")), hidden())
            .execute()
            .await
            .unwrap();

        assert_eq!(result.total, 3);
        assert_eq!(result.failed, 3);
        assert_eq!(result.completed, 0);
        assert!(!result.interrupted);
    }
}
