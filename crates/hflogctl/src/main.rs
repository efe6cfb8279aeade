//! hflogctl - HyperFlow job log parser
//!
//! Reads task-*.log files and appends metrics, sys-info and job-description
//! JSONL streams to the destination directory.

use anyhow::Result;
use clap::Parser;
use hflogctl::cli::Cli;
use hflogctl::{driver, ParserConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ParserConfig::from_cli(&cli)?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let summary = driver::run(&config).await?;

    if cli.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("{}", summary);
    }

    if !summary.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
