//! Error types for the log parser.

use crate::parsers::literal::LiteralError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("file name does not match task-<hyperflowId>__<app>__<proc>__<n>.log: {0}")]
    MalformedFilename(String),

    #[error("first line has no timestamp header: {0:?}")]
    CorruptFirstLine(String),

    #[error("malformed payload in {rule}: {reason}")]
    MalformedPayload { rule: &'static str, reason: String },

    #[error("no size reported for file {0:?}")]
    UnmatchedFileSizeKey(String),

    #[error("unparsable timestamp {0:?}")]
    MalformedTimestamp(String),

    #[error("workflow metadata error: {0}")]
    WorkflowMetadata(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LogError {
    /// Build a `MalformedPayload` from a literal parse failure.
    pub fn payload(rule: &'static str, err: LiteralError) -> Self {
        LogError::MalformedPayload {
            rule,
            reason: err.to_string(),
        }
    }

    /// Build a `MalformedPayload` with a free-form reason.
    pub fn shape(rule: &'static str, reason: impl Into<String>) -> Self {
        LogError::MalformedPayload {
            rule,
            reason: reason.into(),
        }
    }

    /// Whether this error aborts the whole file rather than a single entry.
    pub fn is_fatal(&self) -> bool {
        match self {
            LogError::MalformedFilename(_)
            | LogError::CorruptFirstLine(_)
            | LogError::WorkflowMetadata(_)
            | LogError::Io(_) => true,
            LogError::MalformedPayload { .. }
            | LogError::UnmatchedFileSizeKey(_)
            | LogError::MalformedTimestamp(_)
            | LogError::Json(_) => false,
        }
    }

    /// Short stable label used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            LogError::MalformedFilename(_) => "malformed_filename",
            LogError::CorruptFirstLine(_) => "corrupt_first_line",
            LogError::MalformedPayload { .. } => "malformed_payload",
            LogError::UnmatchedFileSizeKey(_) => "unmatched_file_size_key",
            LogError::MalformedTimestamp(_) => "malformed_timestamp",
            LogError::WorkflowMetadata(_) => "workflow_metadata",
            LogError::Io(_) => "io",
            LogError::Json(_) => "json",
        }
    }
}
