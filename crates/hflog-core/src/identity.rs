//! Job identity (from the log file name) and workflow metadata.

use crate::error::LogError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::LazyLock;

static TASK_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^task-([A-Za-z0-9\-_]+)__(\d+)__(\d+)__\d+\.log$").unwrap()
});

/// Identity triple shared by every record produced from one log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobIdentity {
    pub hyperflow_id: String,
    /// `<hyperflowId>-<appSeq>`
    pub workflow_id: String,
    /// `<hyperflowId>-<appSeq>-<procSeq>`
    pub job_id: String,
}

impl JobIdentity {
    /// Derive the identity from `task-<hf>__<app>__<proc>__<n>.log`.
    ///
    /// Only the final path component is inspected.
    pub fn from_path(path: &Path) -> Result<Self, LogError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LogError::MalformedFilename(path.display().to_string()))?;
        Self::from_file_name(file_name)
    }

    pub fn from_file_name(file_name: &str) -> Result<Self, LogError> {
        let caps = TASK_FILE
            .captures(file_name)
            .ok_or_else(|| LogError::MalformedFilename(file_name.to_string()))?;
        let hf = &caps[1];
        let app = &caps[2];
        let proc = &caps[3];
        Ok(Self {
            hyperflow_id: hf.to_string(),
            workflow_id: format!("{}-{}", hf, app),
            job_id: format!("{}-{}-{}", hf, app, proc),
        })
    }
}

/// Workflow-level metadata seeded into every job description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInfo {
    pub workflow_name: String,
    pub size: u64,
    pub version: String,
}

impl WorkflowInfo {
    /// Extract metadata from a parsed `workflow.json`.
    ///
    /// `name` defaults to "undefined", `size` to the number of `processes`,
    /// `version` to "1.0.0".
    pub fn from_workflow_json(doc: &Value) -> Result<Self, LogError> {
        let workflow_name = match doc.get("name") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "undefined".to_string(),
        };

        let size = match doc.get("size") {
            Some(v) => v.as_u64().ok_or_else(|| {
                LogError::WorkflowMetadata(format!("size is not a non-negative integer: {}", v))
            })?,
            None => doc
                .get("processes")
                .and_then(Value::as_array)
                .map(|p| p.len() as u64)
                .ok_or_else(|| {
                    LogError::WorkflowMetadata("neither size nor processes present".to_string())
                })?,
        };

        let version = match doc.get("version") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "1.0.0".to_string(),
        };

        Ok(Self {
            workflow_name,
            size,
            version,
        })
    }

    /// Parse `workflow.json` text.
    pub fn from_json_str(text: &str) -> Result<Self, LogError> {
        let doc: Value = serde_json::from_str(text)?;
        Self::from_workflow_json(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_from_file_name() {
        let id = JobIdentity::from_file_name("task-abc-123__1__42__1.log").unwrap();
        assert_eq!(id.hyperflow_id, "abc-123");
        assert_eq!(id.workflow_id, "abc-123-1");
        assert_eq!(id.job_id, "abc-123-1-42");
    }

    #[test]
    fn test_identity_from_nested_path() {
        let id = JobIdentity::from_path(Path::new("/logs/hf/task-x_y__2__7__3.log")).unwrap();
        assert_eq!(id.job_id, "x_y-2-7");
    }

    #[test]
    fn test_identity_rejects_other_names() {
        for name in ["job-abc__1__2__1.log", "task-abc__1__2.log", "task-abc__1__2__1.txt"] {
            let err = JobIdentity::from_file_name(name).unwrap_err();
            assert!(matches!(err, LogError::MalformedFilename(_)), "{}", name);
        }
    }

    #[test]
    fn test_workflow_info_defaults() {
        let info = WorkflowInfo::from_workflow_json(&json!({"processes": [{}, {}, {}]})).unwrap();
        assert_eq!(info.workflow_name, "undefined");
        assert_eq!(info.size, 3);
        assert_eq!(info.version, "1.0.0");
    }

    #[test]
    fn test_workflow_info_explicit() {
        let info = WorkflowInfo::from_json_str(
            r#"{"name": "montage", "size": 1500, "version": "2.1", "processes": []}"#,
        )
        .unwrap();
        assert_eq!(info.workflow_name, "montage");
        assert_eq!(info.size, 1500);
        assert_eq!(info.version, "2.1");
    }

    #[test]
    fn test_workflow_info_without_size_or_processes() {
        let err = WorkflowInfo::from_workflow_json(&json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, LogError::WorkflowMetadata(_)));
    }
}
