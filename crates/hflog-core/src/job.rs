//! Job description accumulator.
//!
//! One `JobAccumulator` is opened per log file, merged into by the rule
//! handlers, and consumed by `finish`, which yields the single
//! `JobDescription` line for that job. Consuming `self` is what makes a
//! second flush or a merge-after-flush impossible.

use crate::error::LogError;
use crate::identity::{JobIdentity, WorkflowInfo};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Keys owned by the accumulator itself; a job message cannot overwrite them.
const RESERVED_KEYS: &[&str] = &[
    "workflowName",
    "size",
    "version",
    "hyperflowId",
    "jobId",
    "execTimeMs",
];

/// Declared input/output file, optionally enriched with its size.
/// Any other per-file field of the job message rides along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileRef {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            size: None,
            extra: Map::new(),
        }
    }

    pub fn sized(name: &str, size: u64) -> Self {
        Self {
            size: Some(size),
            ..Self::named(name)
        }
    }
}

/// Name → size mapping reported by a `Job inputs:` / `Job outputs:` line.
pub type FileSizes = BTreeMap<String, u64>;

/// The accumulated record written to the job-description stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescription {
    #[serde(flatten)]
    pub workflow: WorkflowInfo,
    pub hyperflow_id: String,
    pub job_id: String,
    /// Job-message fields without a dedicated slot
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_time_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<FileRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<FileRef>>,
}

/// Which declared file list a size report targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileList {
    Inputs,
    Outputs,
}

impl FileList {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileList::Inputs => "inputs",
            FileList::Outputs => "outputs",
        }
    }
}

#[derive(Debug)]
pub struct JobAccumulator {
    record: JobDescription,
    start_ms: Option<i64>,
}

impl JobAccumulator {
    pub fn new(identity: &JobIdentity, workflow: &WorkflowInfo) -> Self {
        Self {
            record: JobDescription {
                workflow: workflow.clone(),
                hyperflow_id: identity.hyperflow_id.clone(),
                job_id: identity.job_id.clone(),
                extra: Map::new(),
                command: None,
                exec_time_ms: None,
                env: None,
                node_name: None,
                inputs: None,
                outputs: None,
            },
            start_ms: None,
        }
    }

    pub fn record(&self) -> &JobDescription {
        &self.record
    }

    pub fn set_start_time(&mut self, time: &str) -> Result<(), LogError> {
        self.start_ms = Some(parse_time_ms(time)?);
        Ok(())
    }

    /// Record the end time and derive `execTimeMs`.
    /// Without a start time there is nothing to subtract from.
    pub fn set_end_time(&mut self, time: &str) -> Result<(), LogError> {
        let end_ms = parse_time_ms(time)?;
        match self.start_ms {
            Some(start_ms) => self.record.exec_time_ms = Some(end_ms - start_ms),
            None => warn!(job_id = %self.record.job_id, "job finished without a start time"),
        }
        Ok(())
    }

    /// Merge the (already stripped) job message.
    pub fn merge_message(&mut self, message: Map<String, Value>) {
        for (key, value) in message {
            match key.as_str() {
                k if RESERVED_KEYS.contains(&k) => {
                    debug!(key = k, "ignoring job message key owned by the accumulator");
                }
                "inputs" | "outputs" => {
                    let list = if key == "inputs" {
                        FileList::Inputs
                    } else {
                        FileList::Outputs
                    };
                    match serde_json::from_value::<Vec<FileRef>>(value.clone()) {
                        Ok(files) => {
                            self.record.extra.shift_remove(list.as_str());
                            *self.files_mut(list) = Some(files);
                        }
                        Err(e) => {
                            warn!(list = list.as_str(), error = %e, "file list is not a list of named files, keeping it verbatim");
                            self.keep_extra(key, value);
                        }
                    }
                }
                "command" => match value {
                    Value::String(command) => self.set_command(&command),
                    other => self.keep_extra(key, other),
                },
                "env" => match value {
                    Value::Object(env) => {
                        self.record.extra.shift_remove("env");
                        self.record.env = Some(env);
                    }
                    other => self.keep_extra(key, other),
                },
                "nodeName" => self.record.node_name = Some(value),
                _ => {
                    self.record.extra.insert(key, value);
                }
            }
        }
    }

    /// Park a value whose key has a typed slot but whose shape does not fit it.
    /// Once the typed slot is filled the key belongs to it, so a line never
    /// carries the same key twice.
    fn keep_extra(&mut self, key: String, value: Value) {
        let taken = match key.as_str() {
            "command" => self.record.command.is_some(),
            "env" => self.record.env.is_some(),
            "inputs" => self.record.inputs.is_some(),
            "outputs" => self.record.outputs.is_some(),
            _ => false,
        };
        if taken {
            debug!(key = %key, "typed field already set, dropping untyped value");
        } else {
            self.record.extra.insert(key, value);
        }
    }

    pub fn set_command(&mut self, command: &str) {
        self.record.extra.shift_remove("command");
        self.record.command = Some(command.to_string());
    }

    /// Store the environment and lift `nodeName` out of it.
    pub fn set_env(&mut self, env: Map<String, Value>) {
        match env.get("nodeName") {
            Some(node) => self.record.node_name = Some(node.clone()),
            None => warn!(job_id = %self.record.job_id, "environment has no nodeName"),
        }
        self.record.extra.shift_remove("env");
        self.record.env = Some(env);
    }

    /// Rewrite a declared file list with reported sizes.
    ///
    /// Returns the names that had no size; those entries are kept unsized.
    /// `None` means there was no declared list to rewrite.
    pub fn apply_sizes(&mut self, list: FileList, sizes: &FileSizes) -> Option<Vec<String>> {
        let files = self.files_mut(list);
        let declared = files.as_deref()?;
        let (enriched, unmatched) = extend_with_sizes(declared, sizes);
        *files = Some(enriched);
        Some(unmatched)
    }

    fn files_mut(&mut self, list: FileList) -> &mut Option<Vec<FileRef>> {
        match list {
            FileList::Inputs => &mut self.record.inputs,
            FileList::Outputs => &mut self.record.outputs,
        }
    }

    /// Close the accumulator and hand out its record.
    pub fn finish(self) -> JobDescription {
        self.record
    }
}

/// Pair every declared name with its reported size.
///
/// Returns the new list plus the names missing from `sizes`. Other per-file
/// fields are carried over untouched.
pub fn extend_with_sizes(files: &[FileRef], sizes: &FileSizes) -> (Vec<FileRef>, Vec<String>) {
    let mut unmatched = Vec::new();
    let enriched = files
        .iter()
        .map(|file| match sizes.get(&file.name) {
            Some(size) => FileRef {
                size: Some(*size),
                ..file.clone()
            },
            None => {
                unmatched.push(file.name.clone());
                file.clone()
            }
        })
        .collect();
    (enriched, unmatched)
}

/// Milliseconds since the epoch for a log timestamp token.
pub fn parse_time_ms(time: &str) -> Result<i64, LogError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(time, TIME_FORMAT) {
        return Ok(naive.and_utc().timestamp_millis());
    }
    DateTime::parse_from_rfc3339(time)
        .map(|dt| dt.timestamp_millis())
        .map_err(|_| LogError::MalformedTimestamp(time.to_string()))
}
