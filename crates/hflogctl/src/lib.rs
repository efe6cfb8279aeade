//! hflogctl library - exposes the file driver for integration tests.

pub mod cli;
pub mod config;
pub mod driver;
pub mod sink;

pub use config::ParserConfig;
pub use driver::{run, RunSummary};
