//! yt-dlp backed search and download collaborators.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{AudioFormat, Config};
use crate::job::Job;
use crate::naming::output_stem;
use crate::pipeline::{Candidate, TrackDownloader, TrackSearcher};

/// Candidates within this many seconds of the catalog length rank first
pub const DURATION_TOLERANCE_SECS: u32 = 15;

/// Extensions we accept as a finished download
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "opus", "ogg", "wav", "webm"];

/// Wrapper around the external yt-dlp binary
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
    ffmpeg: Option<PathBuf>,
    output_dir: PathBuf,
    audio_format: AudioFormat,
    audio_quality: String,
    search_limit: usize,
    low_priority: bool,
    embed_metadata: bool,
}

impl YtDlp {
    /// Create a wrapper for an explicit yt-dlp binary
    pub fn new(binary: PathBuf, config: &Config) -> Self {
        Self {
            binary,
            ffmpeg: config.ffmpeg_path.clone(),
            output_dir: config.output_dir.clone(),
            audio_format: config.audio_format,
            audio_quality: config.audio_quality.clone(),
            search_limit: config.search_limit.max(1),
            low_priority: config.low_priority,
            embed_metadata: config.embed_metadata,
        }
    }

    /// Use the configured binaries, falling back to the ones on `PATH`
    pub fn from_config(config: &Config) -> Result<Self> {
        let binary = match &config.ytdlp_path {
            Some(path) => path.clone(),
            None => which::which("yt-dlp")
                .map_err(|_| anyhow!("yt-dlp not found on PATH. Install it or set YTDLP_PATH"))?,
        };

        let mut ytdlp = Self::new(binary, config);
        if ytdlp.ffmpeg.is_none() {
            ytdlp.ffmpeg = which::which("ffmpeg").ok();
        }
        if ytdlp.ffmpeg.is_none() {
            warn!("ffmpeg not found on PATH; yt-dlp will not be able to extract audio");
        }

        debug!("Using yt-dlp at {:?}, ffmpeg at {:?}", ytdlp.binary, ytdlp.ffmpeg);
        Ok(ytdlp)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the finished file for `job` is expected to land
    pub fn expected_output(&self, job: &Job) -> PathBuf {
        self.output_dir.join(format!(
            "{}.{}",
            output_stem(&job.artist, &job.title),
            self.audio_format.extension()
        ))
    }

    /// Build base yt-dlp command with common options
    fn build_base_command(&self) -> Command {
        let mut cmd = if self.low_priority {
            let mut c = Command::new("nice");
            c.args(["-n", "19"]);
            c.arg(&self.binary);
            c
        } else {
            Command::new(&self.binary)
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn search_args(&self, query: &str) -> Vec<OsString> {
        [
            "--dump-json",
            "--flat-playlist",
            "--no-warnings",
            "--ignore-errors",
            "--",
        ]
        .iter()
        .map(OsString::from)
        .chain(std::iter::once(OsString::from(format!(
            "ytsearch{}:{}",
            self.search_limit, query
        ))))
        .collect()
    }

    fn download_args(&self, candidate: &Candidate, template: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-f".into(),
            "bestaudio/best".into(),
            "-x".into(),
            "--audio-format".into(),
            self.audio_format.extension().into(),
        ];

        if self.audio_format == AudioFormat::Mp3 {
            args.push("--audio-quality".into());
            args.push(self.audio_quality.clone().into());
            if self.embed_metadata {
                args.push("--embed-metadata".into());
            }
        }

        args.extend(["--no-playlist", "--no-progress", "--no-warnings"].map(OsString::from));
        args.push("-o".into());
        args.push(template.as_os_str().to_os_string());

        if let Some(ffmpeg) = &self.ffmpeg {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.as_os_str().to_os_string());
        }

        args.push("--".into());
        args.push(candidate.url.clone().into());
        args
    }

    /// Find the file yt-dlp produced for `stem`, preferring the configured
    /// format but accepting any audio extension
    pub fn locate_output(&self, stem: &str) -> Option<PathBuf> {
        let expected = self
            .output_dir
            .join(format!("{stem}.{}", self.audio_format.extension()));
        if expected.is_file() {
            return Some(expected);
        }

        let pattern = format!(
            "{}.*",
            glob::Pattern::escape(&self.output_dir.join(stem).to_string_lossy())
        );
        glob::glob(&pattern)
            .ok()?
            .filter_map(|entry| entry.ok())
            .find(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
    }

    async fn execute(&self, mut cmd: Command, what: &str) -> Result<Output> {
        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to run {:?} for {}", self.binary, what))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output");
            return Err(anyhow!("yt-dlp {} failed ({}): {}", what, output.status, reason.trim()));
        }

        Ok(output)
    }
}

#[async_trait]
impl TrackSearcher for YtDlp {
    async fn search(&self, query: &str, duration_hint: Option<u32>) -> Result<Vec<Candidate>> {
        let mut cmd = self.build_base_command();
        cmd.args(self.search_args(query));

        let output = self.execute(cmd, "search").await?;
        let candidates = parse_search_output(&String::from_utf8_lossy(&output.stdout));
        debug!("🔎 {} candidates for '{}'", candidates.len(), query);

        Ok(rank_by_duration(candidates, duration_hint))
    }
}

#[async_trait]
impl TrackDownloader for YtDlp {
    async fn download(&self, candidate: &Candidate, job: &Job) -> Result<bool> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create output directory {:?}", self.output_dir))?;

        let stem = output_stem(&job.artist, &job.title);
        let template = self.output_dir.join(format!("{stem}.%(ext)s"));

        let mut cmd = self.build_base_command();
        cmd.args(self.download_args(candidate, &template));

        info!("⬇️ Downloading {} as {:?}", candidate.url, template);
        self.execute(cmd, "download").await?;

        match self.locate_output(&stem) {
            Some(path) => {
                info!("Saved {:?}", path);
                Ok(true)
            }
            None => {
                warn!("yt-dlp reported success but no file matching '{}' exists", stem);
                Ok(false)
            }
        }
    }

    async fn already_present(&self, job: &Job) -> bool {
        tokio::fs::try_exists(self.expected_output(job))
            .await
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: String,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    channel: Option<String>,
    uploader: Option<String>,
}

/// Parse `--dump-json` output, one JSON object per line. Lines that are not
/// video entries are skipped.
pub fn parse_search_output(stdout: &str) -> Vec<Candidate> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<SearchEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unparseable search line: {}", e);
                None
            }
        })
        .filter_map(|entry| {
            let title = entry.title?;
            let url = entry
                .url
                .filter(|u| u.starts_with("http"))
                .or(entry.webpage_url)
                .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", entry.id));
            Some(Candidate {
                id: entry.id,
                title,
                url,
                duration_seconds: entry.duration.filter(|d| *d >= 0.0).map(|d| d.round() as u32),
                channel: entry.channel.or(entry.uploader),
            })
        })
        .collect()
}

/// Move candidates whose length is close to `hint` ahead of the rest,
/// keeping relevance order within each group
pub fn rank_by_duration(mut candidates: Vec<Candidate>, hint: Option<u32>) -> Vec<Candidate> {
    if let Some(hint) = hint {
        candidates.sort_by_key(|c| match c.duration_seconds {
            Some(d) if d.abs_diff(hint) <= DURATION_TOLERANCE_SECS => 0,
            _ => 1,
        });
    }
    candidates
}
