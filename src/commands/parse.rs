use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::job::Job;
use crate::tracklist::load_jobs;

/// Dry run: show the jobs a tracklist would queue
pub struct ParseCommand {
    tracklist: PathBuf,
}

impl ParseCommand {
    pub fn new(tracklist: PathBuf) -> Self {
        Self { tracklist }
    }

    pub async fn execute(&self) -> Result<Vec<Job>> {
        if !self.tracklist.is_file() {
            return Err(anyhow!("Tracklist does not exist: {:?}", self.tracklist));
        }
        load_jobs(&self.tracklist).await
    }

    pub fn print_jobs(&self, jobs: &[Job]) {
        println!("\n📄 {} tracks in {}", jobs.len(), self.tracklist.display());
        for (i, job) in jobs.iter().enumerate() {
            match job.duration_seconds {
                Some(secs) => println!("{:>4}. {} [{}:{:02}]", i + 1, job.label(), secs / 60, secs % 60),
                None => println!("{:>4}. {}", i + 1, job.label()),
            }
        }
    }
}
