use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Audio container produced by the downloader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Lossy MP3 at the configured quality (default)
    Mp3,
    /// Lossless FLAC; quality is ignored
    Flac,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "flac" => Some(AudioFormat::Flac),
            _ => None,
        }
    }
}

/// Configuration for downloads and the worker pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workers: usize,
    pub output_dir: PathBuf,
    pub audio_format: AudioFormat,
    pub audio_quality: String,
    pub search_limit: usize,
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub low_priority: bool,
    pub embed_metadata: bool,
    pub poll_interval_ms: u64,
    pub redraw_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 4,
            output_dir: default_output_dir(),
            audio_format: AudioFormat::Mp3,
            audio_quality: "320K".to_string(),
            search_limit: 5,
            ytdlp_path: None,
            ffmpeg_path: None,
            low_priority: false,
            embed_metadata: true,
            poll_interval_ms: 200,
            redraw_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path:?}"))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config file {path:?}"))
    }

    /// Defaults, then the optional file, then environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Override fields from environment variables that are set
    pub fn apply_env(&mut self) {
        if let Some(workers) = env_parse("TRACKFETCH_WORKERS") {
            self.workers = workers;
        }
        if let Ok(dir) = env::var("TRACKFETCH_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Ok(format) = env::var("TRACKFETCH_FORMAT") {
            match AudioFormat::parse(&format) {
                Some(format) => self.audio_format = format,
                None => warn!("Ignoring unknown TRACKFETCH_FORMAT '{}'", format),
            }
        }
        if let Ok(quality) = env::var("TRACKFETCH_QUALITY") {
            self.audio_quality = quality;
        }
        if let Some(limit) = env_parse("TRACKFETCH_SEARCH_LIMIT") {
            self.search_limit = limit;
        }
        if let Ok(path) = env::var("YTDLP_PATH") {
            self.ytdlp_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = env::var("FFMPEG_PATH") {
            self.ffmpeg_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow!("workers must be at least 1"));
        }
        if self.search_limit == 0 {
            return Err(anyhow!("search_limit must be at least 1"));
        }
        if self.audio_format == AudioFormat::Mp3 && self.audio_quality.trim().is_empty() {
            return Err(anyhow!("audio_quality must be set for mp3 output"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn redraw_interval(&self) -> Duration {
        Duration::from_millis(self.redraw_interval_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let value = env::var(key).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring invalid {} value '{}'", key, value);
            None
        }
    }
}

/// `~/Music`, or `./Music` when no home directory is known
pub fn default_output_dir() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join("Music"))
        .unwrap_or_else(|| PathBuf::from("Music"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const ENV_KEYS: &[&str] = &[
        "TRACKFETCH_WORKERS",
        "TRACKFETCH_OUTPUT_DIR",
        "TRACKFETCH_FORMAT",
        "TRACKFETCH_QUALITY",
        "TRACKFETCH_SEARCH_LIMIT",
        "YTDLP_PATH",
        "FFMPEG_PATH",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env();
        assert_eq!(config.workers, 4);
        assert_eq!(config.audio_format, AudioFormat::Mp3);
        assert_eq!(config.audio_quality, "320K");
        assert!(config.output_dir.ends_with("Music"));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("TRACKFETCH_WORKERS", "8");
        env::set_var("TRACKFETCH_FORMAT", "FLAC");
        env::set_var("TRACKFETCH_OUTPUT_DIR", "/tmp/tracks");
        env::set_var("YTDLP_PATH", "/opt/yt-dlp");

        let config = Config::from_env();
        clear_env();

        assert_eq!(config.workers, 8);
        assert_eq!(config.audio_format, AudioFormat::Flac);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/tracks"));
        assert_eq!(config.ytdlp_path, Some(PathBuf::from("/opt/yt-dlp")));
    }

    #[test]
    #[serial]
    fn test_invalid_env_values_fall_back() {
        clear_env();
        env::set_var("TRACKFETCH_WORKERS", "lots");
        env::set_var("TRACKFETCH_FORMAT", "wav");

        let config = Config::from_env();
        clear_env();

        assert_eq!(config.workers, 4);
        assert_eq!(config.audio_format, AudioFormat::Mp3);
    }

    #[test]
    #[serial]
    fn test_file_then_env_layering() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"workers": 2, "audio_quality": "192K"}"#).unwrap();

        env::set_var("TRACKFETCH_QUALITY", "256K");
        let config = Config::load(Some(&path)).unwrap();
        clear_env();

        assert_eq!(config.workers, 2);
        assert_eq!(config.audio_quality, "256K");
        assert_eq!(config.search_limit, 5);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"audio_format": "wav"}"#).unwrap();
        assert!(Config::from_file(&path).is_err());
        assert!(Config::from_file(&temp_dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = Config {
            workers: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
