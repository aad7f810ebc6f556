use anyhow::{anyhow, Result};
use tracing::info;

use crate::config::Config;
use crate::pipeline::{Candidate, TrackSearcher};
use crate::ytdlp::YtDlp;

/// Command to look up candidates for a single query
pub struct SearchCommand {
    query: String,
    config: Config,
}

impl SearchCommand {
    pub fn new(query: String, config: Config) -> Self {
        Self { query, config }
    }

    pub async fn execute(&self) -> Result<Vec<Candidate>> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(anyhow!("Search query is empty"));
        }

        info!("🔎 Searching for '{}'", query);
        let ytdlp = YtDlp::from_config(&self.config)?;
        ytdlp.search(query, None).await
    }

    pub fn print_results(&self, candidates: &[Candidate]) {
        if candidates.is_empty() {
            println!("\n❌ No results for '{}'", self.query);
            return;
        }

        println!("\n🔎 Results for '{}'", self.query);
        for (i, c) in candidates.iter().enumerate() {
            let duration = c
                .duration_seconds
                .map(|s| format!("{}:{:02}", s / 60, s % 60))
                .unwrap_or_else(|| "?:??".to_string());
            println!("{:>3}. {} [{}]", i + 1, c.title, duration);
            if let Some(channel) = &c.channel {
                println!("     by {}", channel);
            }
            println!("     {}", c.url);
        }
    }
}
