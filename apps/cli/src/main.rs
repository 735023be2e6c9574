//! reget - interactive resumable download manager
//!
//! Thin front end over `reget-core`: parses a line-oriented command language
//! and prints results. No business logic lives here.

mod repl;

use anyhow::Result;
use clap::Parser;
use reget_core::DownloadManager;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Resumable download manager with pause/resume undo history.
#[derive(Parser)]
#[command(name = "reget")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Task database path
    #[arg(long, env = "REGET_DB", default_value = "reget.db")]
    db: PathBuf,

    /// Print task listings as JSON lines
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("reget_core=debug,reget=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let manager = DownloadManager::open(&cli.db).await?;
    repl::run(&manager, cli.json).await?;

    Ok(())
}
