//! Routes classified entries into the per-job accumulator and streams.

use crate::error::LogError;
use crate::identity::{JobIdentity, WorkflowInfo};
use crate::job::{FileList, FileSizes, JobAccumulator, JobDescription};
use crate::parsers::entry::LogEntry;
use crate::parsers::literal::parse_literal;
use crate::rules::{classify, Matched, Rule};
use crate::streams::{MetricRecord, MetricsStream, SysInfoStream};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Job-message fields that never reach the job description.
const STRIPPED_MESSAGE_KEYS: &[&str] = &["redis_url", "taskId", "task_id"];

/// A recoverable problem met while handling one entry.
#[derive(Debug)]
pub struct EntryWarning {
    pub time: String,
    pub rule: &'static str,
    pub error: LogError,
}

/// Everything produced from one log file.
#[derive(Debug)]
pub struct ParsedJob {
    pub identity: JobIdentity,
    pub description: JobDescription,
    pub metrics: Vec<MetricRecord>,
    pub sys_info: Vec<Map<String, Value>>,
    pub warnings: Vec<EntryWarning>,
    /// Entries seen
    pub entries: usize,
    /// Entries no rule matched
    pub unmatched: usize,
}

/// Per-file routing state. Lives for exactly one file.
pub struct JobParser {
    identity: JobIdentity,
    job: JobAccumulator,
    metrics: MetricsStream,
    sys_info: SysInfoStream,
    warnings: Vec<EntryWarning>,
    entries: usize,
    unmatched: usize,
}

impl JobParser {
    pub fn new(identity: JobIdentity, workflow: &WorkflowInfo) -> Self {
        Self {
            job: JobAccumulator::new(&identity, workflow),
            metrics: MetricsStream::new(&identity.workflow_id, &identity.job_id),
            sys_info: SysInfoStream::new(&identity.job_id),
            identity,
            warnings: Vec::new(),
            entries: 0,
            unmatched: 0,
        }
    }

    /// Classify and apply one entry. Returns the rule that fired, if any.
    ///
    /// Failures are recorded as warnings; the entry is skipped and the
    /// parser stays usable.
    pub fn handle(&mut self, entry: &LogEntry) -> Option<Rule> {
        self.entries += 1;
        let Some(matched) = classify(&entry.text) else {
            self.unmatched += 1;
            return None;
        };
        let rule = matched.rule;
        debug!(rule = rule.name(), time = %entry.time, "classified entry");
        if let Err(error) = self.apply(&matched, entry) {
            self.warn(entry, rule, error);
        }
        Some(rule)
    }

    fn warn(&mut self, entry: &LogEntry, rule: Rule, error: LogError) {
        warn!(job_id = %self.identity.job_id, time = %entry.time, rule = rule.name(), "{}", error);
        self.warnings.push(EntryWarning {
            time: entry.time.clone(),
            rule: rule.name(),
            error,
        });
    }

    fn apply(&mut self, matched: &Matched<'_>, entry: &LogEntry) -> Result<(), LogError> {
        let time = entry.time.as_str();
        let rule = matched.rule;
        match rule {
            Rule::JobStarted => {
                self.metrics.event(time, "jobStart");
                self.job.set_start_time(time)
            }
            Rule::JobFinished => {
                self.metrics.event(time, "jobEnd");
                self.job.set_end_time(time)
            }
            Rule::HandlerStarted => {
                self.metrics.event(time, "handlerStart");
                Ok(())
            }
            Rule::HandlerFinished => {
                self.metrics.event(time, "handlerEnd");
                Ok(())
            }
            Rule::JobMessage => {
                let mut message = literal_object(rule, matched.group(1))?;
                for key in STRIPPED_MESSAGE_KEYS {
                    message.shift_remove(*key);
                }
                match message.get("name") {
                    Some(Value::String(name)) => self.metrics.set_name(name),
                    _ => warn!(job_id = %self.identity.job_id, "job message has no name"),
                }
                self.job.merge_message(message);
                Ok(())
            }
            Rule::JobCommand => {
                self.job.set_command(matched.group(1));
                Ok(())
            }
            Rule::ProcUsage => {
                let pid = captured_pid(matched.group(1));
                let usage = literal_object(rule, matched.group(2))?;
                let mut values = Vec::with_capacity(3);
                for parameter in ["cpu", "memory", "ctime"] {
                    let value = usage
                        .get(parameter)
                        .cloned()
                        .ok_or_else(|| LogError::shape(rule.name(), format!("missing {}", parameter)))?;
                    values.push((parameter, value));
                }
                for (parameter, value) in values {
                    self.metrics.push(time, pid.clone(), parameter, value);
                }
                Ok(())
            }
            Rule::Io => {
                let mut io = literal_object(rule, matched.group(1))?;
                io.shift_remove("ppid");
                io.shift_remove("name");
                let pid = io.shift_remove("pid").filter(|v| !v.is_null());
                self.metrics.push(time, pid, "io", Value::Object(io));
                Ok(())
            }
            Rule::NetDev => {
                let pid = captured_pid(matched.group(1));
                let interfaces = match parse_literal(matched.group(2)) {
                    Ok(Value::Array(items)) => items,
                    Ok(_) => return Err(LogError::shape(rule.name(), "expected an array")),
                    Err(e) => return Err(LogError::payload(rule.name(), e)),
                };
                let network = select_eth(interfaces)
                    .ok_or_else(|| LogError::shape(rule.name(), "no eth interface reported"))?;
                self.metrics.push(time, pid, "network", network);
                Ok(())
            }
            Rule::SysInfo => {
                let snapshot = literal_object(rule, matched.group(1))?;
                self.sys_info.push(snapshot);
                Ok(())
            }
            Rule::JobInputs => self.apply_sizes(entry, rule, FileList::Inputs, matched.group(1)),
            Rule::JobOutputs => self.apply_sizes(entry, rule, FileList::Outputs, matched.group(1)),
            Rule::EnvVars => {
                let env = match serde_json::from_str::<Value>(matched.group(1).trim()) {
                    Ok(Value::Object(env)) => env,
                    Ok(_) => return Err(LogError::shape(rule.name(), "expected an object")),
                    Err(e) => return Err(LogError::shape(rule.name(), e.to_string())),
                };
                self.job.set_env(env);
                Ok(())
            }
        }
    }

    fn apply_sizes(
        &mut self,
        entry: &LogEntry,
        rule: Rule,
        list: FileList,
        payload: &str,
    ) -> Result<(), LogError> {
        let sizes = file_sizes(rule, payload)?;
        let unmatched = self.job.apply_sizes(list, &sizes).ok_or_else(|| {
            LogError::shape(rule.name(), format!("no declared {} to enrich", list.as_str()))
        })?;
        for name in unmatched {
            self.warn(entry, rule, LogError::UnmatchedFileSizeKey(name));
        }
        Ok(())
    }

    /// Close the file: consume the parser and hand out everything it built.
    pub fn finish(self) -> ParsedJob {
        ParsedJob {
            identity: self.identity,
            description: self.job.finish(),
            metrics: self.metrics.into_records(),
            sys_info: self.sys_info.into_records(),
            warnings: self.warnings,
            entries: self.entries,
            unmatched: self.unmatched,
        }
    }
}

/// Drive a whole entry sequence through a fresh `JobParser`.
///
/// Fatal errors from the entry source (corrupt first line, read failure)
/// abort the file; per-entry problems end up in `ParsedJob::warnings`.
pub fn parse_job<I>(
    identity: JobIdentity,
    workflow: &WorkflowInfo,
    entries: I,
) -> Result<ParsedJob, LogError>
where
    I: IntoIterator<Item = Result<LogEntry, LogError>>,
{
    let mut parser = JobParser::new(identity, workflow);
    for entry in entries {
        parser.handle(&entry?);
    }
    Ok(parser.finish())
}

fn literal_object(rule: Rule, payload: &str) -> Result<Map<String, Value>, LogError> {
    match parse_literal(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(LogError::shape(rule.name(), "expected an object")),
        Err(e) => Err(LogError::payload(rule.name(), e)),
    }
}

fn captured_pid(digits: &str) -> Option<Value> {
    match digits.parse::<u64>() {
        Ok(pid) => Some(Value::from(pid)),
        Err(_) => Some(Value::String(digits.to_string())),
    }
}

/// Pick the `eth` interface: the first entry if it is named `eth`,
/// otherwise the second one.
fn select_eth(interfaces: Vec<Value>) -> Option<Value> {
    let mut iter = interfaces.into_iter();
    let first = iter.next()?;
    if first.get("name").and_then(Value::as_str) == Some("eth") {
        return Some(first);
    }
    iter.next()
}

/// Merge `[{name: size}, ...]` into one mapping.
fn file_sizes(rule: Rule, payload: &str) -> Result<FileSizes, LogError> {
    let items = match parse_literal(payload.trim()) {
        Ok(Value::Array(items)) => items,
        Ok(_) => return Err(LogError::shape(rule.name(), "expected an array")),
        Err(e) => return Err(LogError::payload(rule.name(), e)),
    };
    let mut sizes = FileSizes::new();
    for item in items {
        let Value::Object(pairs) = item else {
            return Err(LogError::shape(rule.name(), "expected {name: size} objects"));
        };
        for (name, size) in pairs {
            let size = size.as_u64().ok_or_else(|| {
                LogError::shape(rule.name(), format!("size of {:?} is not an integer", name))
            })?;
            sizes.insert(name, size);
        }
    }
    Ok(sizes)
}
