//! Ordered classification rules for reconstructed entries.
//!
//! The first matching rule wins; an entry matching none is dropped.
//! `JobMessage` is searched anywhere in the text, every other rule is
//! anchored at the start.

use regex::{Captures, Regex};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    JobStarted,
    JobFinished,
    HandlerStarted,
    HandlerFinished,
    JobMessage,
    JobCommand,
    ProcUsage,
    Io,
    NetDev,
    SysInfo,
    JobInputs,
    JobOutputs,
    EnvVars,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::JobStarted => "JobStarted",
            Rule::JobFinished => "JobFinished",
            Rule::HandlerStarted => "HandlerStarted",
            Rule::HandlerFinished => "HandlerFinished",
            Rule::JobMessage => "JobMessage",
            Rule::JobCommand => "JobCommand",
            Rule::ProcUsage => "ProcUsage",
            Rule::Io => "IO",
            Rule::NetDev => "NetDev",
            Rule::SysInfo => "SysInfo",
            Rule::JobInputs => "JobInputs",
            Rule::JobOutputs => "JobOutputs",
            Rule::EnvVars => "EnvVars",
        }
    }
}

/// Rule table in evaluation order.
static RULES: LazyLock<Vec<(Rule, Regex)>> = LazyLock::new(|| {
    vec![
        (Rule::JobStarted, Regex::new(r"(?i)^job started").unwrap()),
        (Rule::JobFinished, Regex::new(r"(?i)^job successful").unwrap()),
        (Rule::HandlerStarted, Regex::new(r"(?i)^handler started").unwrap()),
        // "handler exiting" is what older job executors print
        (
            Rule::HandlerFinished,
            Regex::new(r"(?i)^handler (?:finished|exiting)").unwrap(),
        ),
        (
            Rule::JobMessage,
            Regex::new(r"(?i)jobMessage[^{]*(\{.*\})").unwrap(),
        ),
        (
            Rule::JobCommand,
            Regex::new(r"(?i)^Job command[^']*'([^']*)").unwrap(),
        ),
        (
            Rule::ProcUsage,
            Regex::new(r"(?i)^Procusage: pid: (\d+)[^{]*(\{.*\})").unwrap(),
        ),
        (Rule::Io, Regex::new(r"(?i)^IO[^{]*(\{.*\})").unwrap()),
        (
            Rule::NetDev,
            Regex::new(r"(?i)^NetDev: pid: (\d+)[^\[]*(\[.*\])").unwrap(),
        ),
        (Rule::SysInfo, Regex::new(r"(?i)^Sysinfo[^{]*(\{.*\})").unwrap()),
        (
            Rule::JobInputs,
            Regex::new(r"(?i)^Job\sinputs:\s+(\[.*\])").unwrap(),
        ),
        (
            Rule::JobOutputs,
            Regex::new(r"(?i)^Job\soutputs:\s+(\[.*\])").unwrap(),
        ),
        (
            Rule::EnvVars,
            Regex::new(r"(?i)^Environment\s+variables\s+\(HF_LOG\):(.*)").unwrap(),
        ),
    ]
});

/// A rule hit with its capture groups.
#[derive(Debug)]
pub struct Matched<'t> {
    pub rule: Rule,
    pub captures: Captures<'t>,
}

impl<'t> Matched<'t> {
    /// Capture group `i`, or "" if it did not participate.
    pub fn group(&self, i: usize) -> &'t str {
        self.captures.get(i).map_or("", |m| m.as_str())
    }
}

/// Find the first rule matching `text`.
pub fn classify(text: &str) -> Option<Matched<'_>> {
    RULES.iter().find_map(|(rule, pattern)| {
        pattern.captures(text).map(|captures| Matched {
            rule: *rule,
            captures,
        })
    })
}

/// Rules in evaluation order.
pub fn rule_order() -> impl Iterator<Item = Rule> {
    RULES.iter().map(|(rule, _)| *rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_of(text: &str) -> Option<Rule> {
        classify(text).map(|m| m.rule)
    }

    #[test]
    fn test_event_rules_case_insensitive() {
        assert_eq!(rule_of("Job started"), Some(Rule::JobStarted));
        assert_eq!(rule_of("JOB SUCCESSFUL (exit 0)"), Some(Rule::JobFinished));
        assert_eq!(rule_of("handler started, pid 12"), Some(Rule::HandlerStarted));
        assert_eq!(rule_of("Handler finished"), Some(Rule::HandlerFinished));
        assert_eq!(rule_of("handler exiting"), Some(Rule::HandlerFinished));
    }

    #[test]
    fn test_prefix_rules_are_anchored() {
        assert_eq!(rule_of("the job started late"), None);
        assert_eq!(rule_of("unrelated Sysinfo: {}"), None);
    }

    #[test]
    fn test_job_message_found_anywhere() {
        let m = classify("received jobMessage: {\"name\": \"mAdd\"}").unwrap();
        assert_eq!(m.rule, Rule::JobMessage);
        assert_eq!(m.group(1), "{\"name\": \"mAdd\"}");
    }

    #[test]
    fn test_job_message_keeps_single_quoted_object() {
        let m = classify("jobMessage {'name': 'mAdd', 'args': ['-p']} ").unwrap();
        assert_eq!(m.rule, Rule::JobMessage);
        assert_eq!(m.group(1), "{'name': 'mAdd', 'args': ['-p']}");
    }

    #[test]
    fn test_captures() {
        let m = classify("Job command: 'mProject -X in.fits' (shell)").unwrap();
        assert_eq!(m.rule, Rule::JobCommand);
        assert_eq!(m.group(1), "mProject -X in.fits");

        let m = classify("Procusage: pid: 42 usage {\"cpu\": 1}").unwrap();
        assert_eq!(m.rule, Rule::ProcUsage);
        assert_eq!(m.group(1), "42");
        assert_eq!(m.group(2), "{\"cpu\": 1}");

        let m = classify("NetDev: pid: 3 [{\"name\": \"lo\"}]").unwrap();
        assert_eq!(m.rule, Rule::NetDev);
        assert_eq!(m.group(2), "[{\"name\": \"lo\"}]");

        let m = classify("Job outputs:  [{'b.txt': 2}]").unwrap();
        assert_eq!(m.rule, Rule::JobOutputs);
        assert_eq!(m.group(1), "[{'b.txt': 2}]");

        let m = classify("Environment variables (HF_LOG):{\"nodeName\": \"n1\"}").unwrap();
        assert_eq!(m.rule, Rule::EnvVars);
        assert_eq!(m.group(1), "{\"nodeName\": \"n1\"}");
    }

    #[test]
    fn test_unknown_line_dropped() {
        assert_eq!(rule_of("Some future log line we do not know"), None);
    }

    #[test]
    fn test_table_order() {
        let order: Vec<Rule> = rule_order().collect();
        assert_eq!(order.len(), 13);
        assert_eq!(order[0], Rule::JobStarted);
        assert_eq!(order[4], Rule::JobMessage);
        assert_eq!(order[12], Rule::EnvVars);
    }
}
