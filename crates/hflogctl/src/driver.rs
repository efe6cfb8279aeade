//! File driver: finds eligible logs, dispatches one worker per file and
//! appends the results to the shared output streams.

use crate::config::ParserConfig;
use crate::sink::{StreamSinks, Written};
use anyhow::{Context, Result};
use hflog_core::{parse_log_file, LogError, WorkflowInfo};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// Outcome of one parsed file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: PathBuf,
    pub job_id: String,
    pub entries: usize,
    pub unmatched: usize,
    pub warnings: usize,
    pub metrics: usize,
    pub sys_info: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub file: PathBuf,
    pub kind: String,
    pub error: String,
}

/// Totals for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub output_dir: PathBuf,
    pub files_processed: usize,
    pub files_failed: usize,
    pub entries: usize,
    pub metrics: usize,
    pub sys_info: usize,
    pub warnings: usize,
    pub failures: Vec<FileFailure>,
}

impl RunSummary {
    fn record(&mut self, report: &FileReport) {
        self.files_processed += 1;
        self.entries += report.entries;
        self.metrics += report.metrics;
        self.sys_info += report.sys_info;
        self.warnings += report.warnings;
    }

    pub fn is_success(&self) -> bool {
        self.files_failed == 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Output:    {}", self.output_dir.display())?;
        writeln!(f, "Files:     {} parsed, {} failed", self.files_processed, self.files_failed)?;
        writeln!(f, "Entries:   {}", self.entries)?;
        writeln!(f, "Records:   {} metrics, {} sys-info", self.metrics, self.sys_info)?;
        write!(f, "Warnings:  {}", self.warnings)?;
        for failure in &self.failures {
            write!(f, "\n  failed {}: {}", failure.file.display(), failure.error)?;
        }
        Ok(())
    }
}

/// Read workflow-level metadata from `workflow.json`.
pub fn load_workflow(path: &Path) -> Result<WorkflowInfo> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading workflow {}", path.display()))?;
    WorkflowInfo::from_json_str(&text).with_context(|| format!("parsing workflow {}", path.display()))
}

/// Create (if needed) and return the directory the streams are written to.
///
/// Unless `omit_run_dir` is set this is a fresh
/// `<workflowName>__<size>__<version>__<timestamp>` directory.
pub fn prepare_dest_dir(config: &ParserConfig, workflow: &WorkflowInfo) -> Result<PathBuf> {
    let dir = if config.omit_run_dir {
        config.dest_dir.clone()
    } else {
        let stamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
        config.dest_dir.join(format!(
            "{}__{}__{}__{}",
            workflow.workflow_name, workflow.size, workflow.version, stamp
        ))
    };
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(dir)
}

/// Regular files directly inside `source` whose name ends with `suffix`,
/// sorted by name.
pub fn list_log_files(source: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(source)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("listing {}", source.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let eligible = entry
            .file_name()
            .to_str()
            .map_or(false, |name| name.ends_with(suffix));
        if eligible {
            files.push(entry.into_path());
        } else {
            debug!(file = %entry.path().display(), "skipping file");
        }
    }
    Ok(files)
}

/// Parse one file and append its records. Runs on a blocking worker.
pub fn process_file(
    path: &Path,
    workflow: &WorkflowInfo,
    sinks: &StreamSinks,
) -> std::result::Result<FileReport, LogError> {
    let job = parse_log_file(path, workflow)?;
    let Written { metrics, sys_info } = sinks
        .write_job(&job)
        .map_err(|e| LogError::Io(std::io::Error::other(format!("{:#}", e))))?;
    info!(
        file = %path.display(),
        job_id = %job.identity.job_id,
        entries = job.entries,
        warnings = job.warnings.len(),
        "parsed"
    );
    Ok(FileReport {
        file: path.to_path_buf(),
        job_id: job.identity.job_id.clone(),
        entries: job.entries,
        unmatched: job.unmatched,
        warnings: job.warnings.len(),
        metrics,
        sys_info,
    })
}

/// Parse every eligible file of `config.source_dir`.
///
/// A file that fails is reported and skipped; the others still run.
pub async fn run(config: &ParserConfig) -> Result<RunSummary> {
    let workflow = Arc::new(load_workflow(&config.workflow_json)?);
    let output_dir = prepare_dest_dir(config, &workflow)?;
    let files = list_log_files(&config.source_dir, &config.file_suffix)?;
    info!(
        files = files.len(),
        workflow = %workflow.workflow_name,
        output = %output_dir.display(),
        "starting"
    );

    let sinks = Arc::new(StreamSinks::open(
        &output_dir,
        &config.metrics_file,
        &config.job_descriptions_file,
        &config.sys_info_file,
    )?);
    let semaphore = Arc::new(Semaphore::new(config.effective_workers()));
    let mut tasks = JoinSet::new();

    for path in files {
        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        let workflow = Arc::clone(&workflow);
        let sinks = Arc::clone(&sinks);
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let result = process_file(&path, &workflow, &sinks);
            (path, result)
        });
    }

    let mut summary = RunSummary {
        output_dir,
        ..RunSummary::default()
    };
    while let Some(joined) = tasks.join_next().await {
        let (path, result) = joined.context("worker panicked")?;
        match result {
            Ok(report) => summary.record(&report),
            Err(e) => {
                error!(file = %path.display(), kind = e.kind(), "{}", e);
                summary.files_failed += 1;
                summary.failures.push(FileFailure {
                    file: path,
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
    summary.failures.sort_by(|a, b| a.file.cmp(&b.file));

    info!(
        processed = summary.files_processed,
        failed = summary.files_failed,
        "done"
    );
    Ok(summary)
}
