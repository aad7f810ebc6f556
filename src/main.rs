//! # trackfetch - batch track downloader
//!
//! Reads a tracklist (plain text or JSON descriptors), finds each track
//! online with yt-dlp and downloads it as audio using a pool of concurrent
//! workers with a live progress view.
//!
//! ## Usage
//!
//! ```bash
//! # Download every track of a tracklist with 6 workers
//! trackfetch download set.txt --workers 6
//!
//! # Look up candidates for a single track
//! trackfetch search "Daft Punk Around the World"
//!
//! # Show what a tracklist would queue
//! trackfetch parse set.txt
//!
//! # Remove partial downloads
//! trackfetch clean --output-dir ~/Music
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::MultiProgress;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trackfetch::commands::{
    clean::CleanCommand, download::DownloadCommand, parse::ParseCommand, search::SearchCommand,
};
use trackfetch::config::{AudioFormat, Config};
use trackfetch::progress::SuspendingWriter;
use trackfetch::shutdown::INTERRUPTED_EXIT_CODE;

/// trackfetch - download a tracklist as audio files
#[derive(Parser)]
#[command(
    name = "trackfetch",
    about = "Download a tracklist as audio files with concurrent workers",
    long_about = "Resolves each track of a tracklist to an online source with yt-dlp and downloads it as audio, running several searches and downloads at once.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Search and download every track of a tracklist
    Download {
        /// Tracklist file: "Artist - Title" lines or a JSON array of tracks
        tracklist: PathBuf,
        /// Number of concurrent workers
        #[arg(long, short = 'w')]
        workers: Option<usize>,
        /// Directory the audio files are written to
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,
        /// Audio format of the downloaded files
        #[arg(long, short = 'f', value_enum)]
        format: Option<AudioFormat>,
        /// MP3 quality passed to yt-dlp, e.g. 320K or 0
        #[arg(long, short = 'q')]
        quality: Option<String>,
        /// JSON config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
        /// Run yt-dlp with low priority
        #[arg(long, short)]
        background: bool,
    },
    /// Show search candidates for a single query
    Search {
        /// Free-text query, usually "Artist Title"
        query: String,
        /// Maximum number of candidates
        #[arg(long, short = 'l')]
        limit: Option<usize>,
        /// JSON config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
    /// Parse a tracklist and print the jobs it would queue
    Parse {
        /// Tracklist file to parse
        tracklist: PathBuf,
    },
    /// Remove partial downloads from the output directory
    Clean {
        /// Directory to clean (defaults to the configured output directory)
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,
        /// JSON config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Log lines are printed above the live progress bars
    let multi = MultiProgress::new();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackfetch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(SuspendingWriter::new(multi.clone())))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Download {
            tracklist,
            workers,
            output_dir,
            format,
            quality,
            config,
            background,
        } => match Config::load(config.as_deref()) {
            Ok(mut config) => {
                if let Some(workers) = workers {
                    config.workers = workers;
                }
                if let Some(dir) = output_dir {
                    config.output_dir = dir;
                }
                if let Some(format) = format {
                    config.audio_format = format;
                }
                if let Some(quality) = quality {
                    config.audio_quality = quality;
                }
                config.low_priority |= background;

                info!(
                    "Starting download command for tracklist: {:?}, workers: {}, background: {}",
                    tracklist, config.workers, config.low_priority
                );
                let download_cmd = DownloadCommand::new(tracklist, config, multi);
                match download_cmd.execute().await {
                    Ok(result) => {
                        download_cmd.print_summary(&result);
                        if result.interrupted {
                            std::process::exit(INTERRUPTED_EXIT_CODE);
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        },
        Commands::Search {
            query,
            limit,
            config,
        } => match Config::load(config.as_deref()) {
            Ok(mut config) => {
                if let Some(limit) = limit {
                    config.search_limit = limit;
                }
                let search_cmd = SearchCommand::new(query, config);
                match search_cmd.execute().await {
                    Ok(candidates) => {
                        search_cmd.print_results(&candidates);
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        },
        Commands::Parse { tracklist } => {
            info!("Starting parse command for tracklist: {:?}", tracklist);
            let parse_cmd = ParseCommand::new(tracklist);
            match parse_cmd.execute().await {
                Ok(jobs) => {
                    parse_cmd.print_jobs(&jobs);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Commands::Clean { output_dir, config } => match Config::load(config.as_deref()) {
            Ok(config) => {
                let dir = output_dir.unwrap_or(config.output_dir);
                info!("Starting clean command for path: {:?}", dir);
                CleanCommand::new(dir).execute().await.map(|_| ())
            }
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
