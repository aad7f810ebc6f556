use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{debug, info};

use crate::job::Job;

/// Placeholder used by DJ tracklists for unidentified tracks
const UNKNOWN_MARKER: &str = "ID";
const UNKNOWN_PAIR: &str = "ID - ID";

/// One "Artist - Title" line from a text tracklist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEntry {
    pub artist: String,
    pub title: String,
    pub line: String,
}

impl TrackEntry {
    pub fn into_job(self) -> Job {
        let mut job = Job::new(self.artist, self.title, None);
        job.raw = json!({
            "artist": job.artist,
            "title": job.title,
            "original_line": self.line,
        });
        job
    }
}

/// Parses plain-text tracklists
pub struct TracklistParser {
    line: Regex,
}

impl TracklistParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // Optional "01." / "1)" index, then artist and title split on a
            // spaced hyphen or en dash
            line: Regex::new(r"^(?:\d+[.)]\s*)?(.+?)\s+[-–]\s+(.+)$")?,
        })
    }

    /// Parse one line; `None` for blanks, comments, unparseable and
    /// unidentified tracks
    pub fn parse_line(&self, line: &str) -> Option<TrackEntry> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        if line.contains(UNKNOWN_PAIR) {
            debug!("Skipping unidentified track: {}", line);
            return None;
        }

        let caps = self.line.captures(line)?;
        let artist = caps[1].trim();
        let title = caps[2].trim();

        if artist.eq_ignore_ascii_case(UNKNOWN_MARKER) || title.eq_ignore_ascii_case(UNKNOWN_MARKER) {
            debug!("Skipping unidentified track: {}", line);
            return None;
        }

        Some(TrackEntry {
            artist: artist.to_string(),
            title: title.to_string(),
            line: line.to_string(),
        })
    }

    pub fn parse(&self, text: &str) -> Vec<TrackEntry> {
        text.lines().filter_map(|l| self.parse_line(l)).collect()
    }
}

/// Parse a text tracklist into entries, one per recognised line
pub fn parse_tracklist(text: &str) -> Result<Vec<TrackEntry>> {
    Ok(TracklistParser::new()?.parse(text))
}

/// Build jobs from a JSON array of catalog track descriptors
pub fn jobs_from_json(text: &str) -> Result<Vec<Job>> {
    let value: Value = serde_json::from_str(text).context("Tracklist is not valid JSON")?;
    let descriptors = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("tracks") {
            Some(Value::Array(items)) => items,
            _ => return Err(anyhow!("Expected a JSON array of tracks or an object with a \"tracks\" array")),
        },
        _ => return Err(anyhow!("Expected a JSON array of tracks")),
    };

    descriptors
        .into_iter()
        .enumerate()
        .map(|(i, raw)| Job::from_descriptor(raw).with_context(|| format!("Invalid track at index {i}")))
        .collect()
}

/// Load jobs from a `.json` descriptor file or a plain-text tracklist
pub async fn load_jobs(path: &Path) -> Result<Vec<Job>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read tracklist {path:?}"))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let jobs = if is_json {
        jobs_from_json(&text)?
    } else {
        parse_tracklist(&text)?
            .into_iter()
            .map(TrackEntry::into_job)
            .collect()
    };

    info!("📄 Loaded {} tracks from {:?}", jobs.len(), path);
    Ok(jobs)
}
