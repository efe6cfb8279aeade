//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::Parser;
use std::path::PathBuf;

/// Convert HyperFlow job logs into metrics, sys-info and job-description JSONL
#[derive(Parser, Debug, Default)]
#[command(name = "hflogctl")]
#[command(about = "Workflow logs parser", long_about = None)]
#[command(version)]
pub struct Cli {
    /// TOML config file (values are overridden by the flags below)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Logs source directory
    #[arg(short = 's', long)]
    pub source: Option<PathBuf>,

    /// Parsed logs destination directory
    #[arg(short = 'd', long)]
    pub destination: Option<PathBuf>,

    /// workflow.json path
    #[arg(short = 'w', long)]
    pub workflow: Option<PathBuf>,

    /// Omit creating a dedicated run directory inside the destination
    #[arg(short = 'o', long)]
    pub omit: bool,

    /// Number of files parsed concurrently
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}
