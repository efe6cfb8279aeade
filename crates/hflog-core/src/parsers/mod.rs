//! Text-level parsers for job-runner logs.
//!
//! - `entry`: line stream → timestamped `LogEntry` values (continuations merged).
//! - `literal`: embedded object/array text → `serde_json::Value`, literal-only.
//!
//! Neither parser evaluates anything taken from the log.

pub mod entry;
pub mod literal;

pub use entry::{entries, entries_from_str, split_header, Entries, LogEntry, LossyLines};
pub use literal::{parse_literal, LiteralError, LiteralErrorReason};
