use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// A track waiting to be searched for and downloaded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub artist: String,
    pub title: String,
    pub duration_seconds: Option<u32>,
    /// The descriptor this job was built from, kept for output tagging
    pub raw: Value,
}

impl Job {
    /// Create a new job from plain artist/title metadata
    pub fn new(artist: impl Into<String>, title: impl Into<String>, duration_seconds: Option<u32>) -> Self {
        let artist = artist.into();
        let title = title.into();
        let raw = json!({
            "artist": artist,
            "title": title,
            "duration_seconds": duration_seconds,
        });

        Self {
            id: Uuid::new_v4().to_string(),
            artist,
            title,
            duration_seconds,
            raw,
        }
    }

    /// Build a job from a catalog-style track descriptor.
    ///
    /// Accepts `artist` as a string or `artists` as an array of names (or of
    /// objects with a `name` field), `title` or `name` for the track title, and
    /// either `duration_seconds` or `duration_ms`.
    pub fn from_descriptor(raw: Value) -> Result<Self> {
        let title = raw
            .get("title")
            .or_else(|| raw.get("name"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("Track descriptor has no title: {raw}"))?
            .to_string();

        let artist = descriptor_artist(&raw).unwrap_or_default();

        let duration_seconds = match raw.get("duration_seconds").and_then(Value::as_u64) {
            Some(secs) => u32::try_from(secs).ok(),
            // A zero length means the catalog did not know it
            None => raw
                .get("duration_ms")
                .and_then(Value::as_u64)
                .filter(|ms| *ms > 0)
                .and_then(|ms| u32::try_from(ms / 1000).ok()),
        };

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            artist,
            title,
            duration_seconds,
            raw,
        })
    }

    /// Query handed to the search collaborator
    pub fn search_query(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.artist, self.title)
        }
    }

    /// Human-readable "Artist - Title" label
    pub fn label(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }

    /// Album name, if the descriptor carried one
    pub fn album(&self) -> Option<&str> {
        match self.raw.get("album") {
            Some(Value::String(name)) => Some(name.as_str()),
            Some(Value::Object(album)) => album.get("name").and_then(Value::as_str),
            _ => None,
        }
    }
}

fn descriptor_artist(raw: &Value) -> Option<String> {
    if let Some(artist) = raw.get("artist").and_then(Value::as_str) {
        return Some(artist.trim().to_string());
    }

    let names: Vec<&str> = raw
        .get("artists")?
        .as_array()?
        .iter()
        .filter_map(|a| a.as_str().or_else(|| a.get("name").and_then(Value::as_str)))
        .collect();

    Some(names.join(", "))
}
