//! SkyDrop command-line uploader.

mod app;
mod config;
mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skydrop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: ~/.config/skydrop/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload files or directories, resuming interrupted sessions
    Upload {
        /// Files or directories to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Destination folder id
        #[arg(short, long)]
        destination: Option<i64>,

        /// Files uploaded at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Chunks in flight per file
        #[arg(long)]
        chunk_concurrency: Option<usize>,
    },

    /// Retry assembly of a session whose chunks are all uploaded
    Finalize {
        /// Session key
        session_key: String,
    },

    /// Show the server view of a session
    Status {
        /// Session key
        session_key: String,
    },

    /// Discard a session and its uploaded chunks
    Abort {
        /// Session key
        session_key: String,
    },

    /// Print the session key a file would use
    Key {
        /// File to inspect
        path: PathBuf,

        /// Destination folder id
        #[arg(short, long)]
        destination: Option<i64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    tracing::debug!(base_url = %config.base_url, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Upload {
                paths,
                destination,
                concurrency,
                chunk_concurrency,
            } => {
                let engine = config.engine_with_overrides(concurrency, chunk_concurrency);
                app::upload(&config, engine, &paths, destination).await
            }
            Command::Finalize { session_key } => app::finalize(&config, &session_key).await,
            Command::Status { session_key } => app::status(&config, &session_key).await,
            Command::Abort { session_key } => app::abort(&config, &session_key).await,
            Command::Key { path, destination } => app::key(&path, destination).await,
        }
    })
}
