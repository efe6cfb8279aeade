//! Parser configuration.
//!
//! Optional TOML file, every field defaulted; command-line flags override
//! whatever the file says.

use crate::cli::Cli;
use anyhow::{Context, Result};
use hflog_core::{JOB_DESCRIPTIONS_FILE, METRICS_FILE, SYS_INFO_FILE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Directory holding the task-*.log files
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Path of workflow.json
    #[serde(default = "default_workflow_json")]
    pub workflow_json: PathBuf,

    /// Where output streams are written
    #[serde(default = "default_dest_dir")]
    pub dest_dir: PathBuf,

    /// Write straight into `dest_dir` instead of a per-run subdirectory
    #[serde(default)]
    pub omit_run_dir: bool,

    /// Only files whose name ends with this are parsed
    #[serde(default = "default_file_suffix")]
    pub file_suffix: String,

    #[serde(default = "default_metrics_file")]
    pub metrics_file: String,

    #[serde(default = "default_job_descriptions_file")]
    pub job_descriptions_file: String,

    #[serde(default = "default_sys_info_file")]
    pub sys_info_file: String,

    /// Files parsed concurrently (valid: 1-64)
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub log: LogConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("logs-hf")
}

fn default_workflow_json() -> PathBuf {
    PathBuf::from("workflow.json")
}

fn default_dest_dir() -> PathBuf {
    PathBuf::from("./")
}

fn default_file_suffix() -> String {
    "1.log".to_string()
}

fn default_metrics_file() -> String {
    METRICS_FILE.to_string()
}

fn default_job_descriptions_file() -> String {
    JOB_DESCRIPTIONS_FILE.to_string()
}

fn default_sys_info_file() -> String {
    SYS_INFO_FILE.to_string()
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            workflow_json: default_workflow_json(),
            dest_dir: default_dest_dir(),
            omit_run_dir: false,
            file_suffix: default_file_suffix(),
            metrics_file: default_metrics_file(),
            job_descriptions_file: default_job_descriptions_file(),
            sys_info_file: default_sys_info_file(),
            workers: default_workers(),
            log: LogConfig::default(),
        }
    }
}

impl ParserConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Config file (if any) with command-line overrides applied.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(source) = &cli.source {
            config.source_dir = source.clone();
        }
        if let Some(dest) = &cli.destination {
            config.dest_dir = dest.clone();
        }
        if let Some(workflow) = &cli.workflow {
            config.workflow_json = workflow.clone();
        }
        if cli.omit {
            config.omit_run_dir = true;
        }
        if let Some(jobs) = cli.jobs {
            config.workers = jobs;
        }
        if cli.verbose {
            config.log.level = "debug".to_string();
        }
        Ok(config)
    }

    /// Clamp workers to the valid range (1-64)
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, 64)
    }
}
