//! Reassembles multi-line log entries.
//!
//! A header line looks like `[2024-01-01T00:00:00.123] [INFO] handler - Job started`.
//! Every following line without a header belongs to the same entry and is
//! appended (trimmed, no separator) to its text.

use crate::error::LogError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead};
use std::sync::LazyLock;

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([0-9]+[^\]]*)\][^-]+-(.*)").unwrap());

/// One reconstructed log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Raw timestamp token from the header
    pub time: String,
    /// Header remainder plus every continuation line
    pub text: String,
}

/// Split a header line into `(time, text)`, or `None` for a continuation.
pub fn split_header(line: &str) -> Option<(&str, &str)> {
    let caps = HEADER.captures(line)?;
    let time = caps.get(1)?.as_str();
    let text = caps.get(2).map_or("", |m| m.as_str()).trim();
    Some((time, text))
}

/// Lazy entry iterator over a line source.
///
/// Yields `Err` at most once: a read failure or a first line without a header
/// ends the sequence.
pub struct Entries<I> {
    lines: I,
    current: Option<LogEntry>,
    done: bool,
}

impl<I> Entries<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            current: None,
            done: false,
        }
    }
}

impl<I> Iterator for Entries<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = Result<LogEntry, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(LogError::Io(e)));
                }
                None => {
                    self.done = true;
                    return self.current.take().map(Ok);
                }
            };

            if let Some((time, text)) = split_header(&line) {
                let next = LogEntry {
                    time: time.to_string(),
                    text: text.to_string(),
                };
                if let Some(finished) = self.current.replace(next) {
                    return Some(Ok(finished));
                }
                continue;
            }

            match self.current.as_mut() {
                Some(entry) => entry.text.push_str(line.trim()),
                None => {
                    self.done = true;
                    return Some(Err(LogError::CorruptFirstLine(line)));
                }
            }
        }
    }
}

/// Line iterator that decodes each line lossily, so invalid UTF-8 in
/// command output becomes U+FFFD instead of a read error.
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LossyLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Reconstruct entries from any buffered reader.
pub fn entries<R: BufRead>(reader: R) -> Entries<LossyLines<R>> {
    Entries::new(LossyLines::new(reader))
}

/// Reconstruct entries from an in-memory log.
pub fn entries_from_str(log: &str) -> Entries<impl Iterator<Item = io::Result<String>> + '_> {
    Entries::new(log.lines().map(|l| Ok(l.to_string())))
}
