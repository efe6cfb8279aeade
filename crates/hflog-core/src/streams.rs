//! Per-file output buffers for the metrics and system-info streams.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One observation of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub time: String,
    pub workflow_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<Value>,
    pub parameter: String,
    pub value: Value,
}

/// Append-only metric buffer for one job.
#[derive(Debug, Clone)]
pub struct MetricsStream {
    workflow_id: String,
    job_id: String,
    name: Option<String>,
    records: Vec<MetricRecord>,
}

impl MetricsStream {
    pub fn new(workflow_id: &str, job_id: &str) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            job_id: job_id.to_string(),
            name: None,
            records: Vec::new(),
        }
    }

    /// Tag every record emitted from now on with the job's `name`.
    /// Records already buffered keep what they had.
    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn push(&mut self, time: &str, pid: Option<Value>, parameter: &str, value: Value) {
        self.records.push(MetricRecord {
            time: time.to_string(),
            workflow_id: self.workflow_id.clone(),
            job_id: self.job_id.clone(),
            name: self.name.clone(),
            pid,
            parameter: parameter.to_string(),
            value,
        });
    }

    /// Shorthand for `parameter = "event"` records.
    pub fn event(&mut self, time: &str, event: &str) {
        self.push(time, None, "event", Value::String(event.to_string()));
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<MetricRecord> {
        self.records
    }
}

/// Raw periodic snapshots, each tagged with `jobId`.
#[derive(Debug, Clone)]
pub struct SysInfoStream {
    job_id: String,
    records: Vec<Map<String, Value>>,
}

impl SysInfoStream {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, mut snapshot: Map<String, Value>) {
        snapshot.insert("jobId".to_string(), Value::String(self.job_id.clone()));
        self.records.push(snapshot);
    }

    pub fn records(&self) -> &[Map<String, Value>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Map<String, Value>> {
        self.records
    }
}
