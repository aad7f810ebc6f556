use anyhow::{anyhow, Result};
use glob::Pattern;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Leftovers of interrupted or failed yt-dlp runs
const LEFTOVER_PATTERNS: &[&str] = &["*.part", "*.part-Frag*", "*.ytdl", "*.temp.*", "*_cover.jpg"];

/// Command to remove partial download files from the output directory
pub struct CleanCommand {
    output_dir: PathBuf,
}

impl CleanCommand {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Returns the number of files removed
    pub async fn execute(&self) -> Result<usize> {
        if !self.output_dir.exists() {
            return Err(anyhow!(
                "Output directory does not exist: {:?}",
                self.output_dir
            ));
        }

        if !self.output_dir.is_dir() {
            return Err(anyhow!("Path is not a directory: {:?}", self.output_dir));
        }

        info!("🧹 Cleaning up partial downloads in {:?}", self.output_dir);

        let patterns = LEFTOVER_PATTERNS
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if patterns.iter().any(|p| p.matches(name)) {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {
                        debug!("Removed {:?}", path);
                        removed += 1;
                    }
                    Err(e) => warn!("Failed to remove {:?}: {}", path, e),
                }
            }
        }

        info!("✅ Cleanup complete. Removed {} files.", removed);
        Ok(removed)
    }
}
