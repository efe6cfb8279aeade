//! Append-only JSONL output streams.
//!
//! One `JsonlSink` per physical file, shared by every worker writing to
//! that destination. A batch of lines is serialized first and written under
//! a single lock, so lines from different jobs never interleave.

use anyhow::{Context, Result};
use hflog_core::ParsedJob;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    /// Open (creating if needed) `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line per record. Returns the number of lines written.
    pub fn append_all<T: Serialize>(&self, records: &[T]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }

        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("sink {} poisoned", self.path.display()))?;
        file.write_all(buf.as_bytes())
            .and_then(|_| file.flush())
            .with_context(|| format!("appending to {}", self.path.display()))?;
        Ok(records.len())
    }
}

/// The three output streams of one destination directory.
pub struct StreamSinks {
    pub metrics: JsonlSink,
    pub job_descriptions: JsonlSink,
    pub sys_info: JsonlSink,
}

/// Lines written for one job.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Written {
    pub metrics: usize,
    pub sys_info: usize,
}

impl StreamSinks {
    pub fn open(dir: &Path, metrics: &str, job_descriptions: &str, sys_info: &str) -> Result<Self> {
        Ok(Self {
            metrics: JsonlSink::open(dir.join(metrics))?,
            job_descriptions: JsonlSink::open(dir.join(job_descriptions))?,
            sys_info: JsonlSink::open(dir.join(sys_info))?,
        })
    }

    /// Flush one job: description, then system info, then metrics.
    pub fn write_job(&self, job: &ParsedJob) -> Result<Written> {
        self.job_descriptions
            .append_all(std::slice::from_ref(&job.description))?;
        let sys_info = self.sys_info.append_all(&job.sys_info)?;
        let metrics = self.metrics.append_all(&job.metrics)?;
        Ok(Written { metrics, sys_info })
    }
}
