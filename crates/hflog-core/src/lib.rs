//! Core of the HyperFlow job-log parser.
//!
//! Turns one job runner log into three record sets: metrics, system-info
//! snapshots and a single job description. Pure in-memory processing;
//! reading files and appending the JSONL output belong to the caller.

pub mod error;
pub mod identity;
pub mod job;
pub mod parsers;
pub mod router;
pub mod rules;
pub mod streams;

pub use error::LogError;
pub use identity::{JobIdentity, WorkflowInfo};
pub use job::{extend_with_sizes, FileList, FileRef, FileSizes, JobAccumulator, JobDescription};
pub use parsers::{entries, entries_from_str, parse_literal, LogEntry};
pub use router::{parse_job, EntryWarning, JobParser, ParsedJob};
pub use rules::{classify, Rule};
pub use streams::{MetricRecord, MetricsStream, SysInfoStream};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Default metrics stream file name
pub const METRICS_FILE: &str = "metrics.jsonl";

/// Default job-description stream file name
pub const JOB_DESCRIPTIONS_FILE: &str = "job_descriptions.jsonl";

/// Default system-info stream file name
pub const SYS_INFO_FILE: &str = "sys_info.jsonl";

/// Parse one log file from disk.
///
/// The job identity comes from the file name; a name that does not follow
/// the `task-...log` pattern fails before the file is opened.
pub fn parse_log_file(path: &Path, workflow: &WorkflowInfo) -> Result<ParsedJob, LogError> {
    let identity = JobIdentity::from_path(path)?;
    let file = File::open(path)?;
    parse_job(identity, workflow, entries(BufReader::new(file)))
}
