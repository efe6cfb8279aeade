//! End-to-end tests: raw log text → parsed job.
//!
//! Covers entry reconstruction, classification, cross-line enrichment and
//! the recoverable/fatal error split.

use hflog_core::{
    entries_from_str, parse_job, parse_log_file, FileRef, JobIdentity, LogError, ParsedJob,
    WorkflowInfo,
};
use serde_json::json;
use std::io::Write;

fn workflow() -> WorkflowInfo {
    WorkflowInfo {
        workflow_name: "montage".to_string(),
        size: 43,
        version: "1.0.0".to_string(),
    }
}

fn identity() -> JobIdentity {
    JobIdentity::from_file_name("task-hf1__3__17__1.log").unwrap()
}

fn run(log: &str) -> ParsedJob {
    parse_job(identity(), &workflow(), entries_from_str(log)).unwrap()
}

// =============================================================================
// Metrics
// =============================================================================

#[test]
fn test_procusage_yields_three_records() {
    let job = run(r#"[2024-01-01T00:00:01.000] [INFO] hf - Procusage: pid: 7 {"cpu": 1, "memory": 2, "ctime": 3}"#);

    assert_eq!(job.metrics.len(), 3);
    let params: Vec<&str> = job.metrics.iter().map(|m| m.parameter.as_str()).collect();
    assert_eq!(params, vec!["cpu", "memory", "ctime"]);
    let values: Vec<_> = job.metrics.iter().map(|m| m.value.clone()).collect();
    assert_eq!(values, vec![json!(1), json!(2), json!(3)]);
    for m in &job.metrics {
        assert_eq!(m.time, "2024-01-01T00:00:01.000");
        assert_eq!(m.pid, Some(json!(7)));
        assert_eq!(m.job_id, "hf1-3-17");
        assert_eq!(m.workflow_id, "hf1-3");
    }
}

#[test]
fn test_netdev_selects_eth_when_second() {
    let job = run(r#"[1] [INFO] hf - NetDev: pid: 3 [{"name":"lo","rx":1},{"name":"eth","rx":2}]"#);
    assert_eq!(job.metrics.len(), 1);
    assert_eq!(job.metrics[0].parameter, "network");
    assert_eq!(job.metrics[0].value["rx"], json!(2));
    assert_eq!(job.metrics[0].pid, Some(json!(3)));
}

#[test]
fn test_netdev_selects_eth_when_first() {
    let job = run(r#"[1] [INFO] hf - NetDev: pid: 3 [{"name":"eth","rx":5},{"name":"lo","rx":1}]"#);
    assert_eq!(job.metrics[0].value["rx"], json!(5));
}

#[test]
fn test_events_and_name_tagging() {
    let log = "\
[2024-01-01T00:00:00.000] [INFO] hf - handler started
[2024-01-01T00:00:00.100] [INFO] hf - jobMessage: {\"name\": \"mProject\", \"redis_url\": \"redis://r\"}
[2024-01-01T00:00:00.200] [INFO] hf - Job started
[2024-01-01T00:00:01.200] [INFO] hf - Job successful
[2024-01-01T00:00:01.300] [INFO] hf - handler exiting
";
    let job = run(log);
    let events: Vec<_> = job.metrics.iter().map(|m| m.value.clone()).collect();
    assert_eq!(
        events,
        vec![json!("handlerStart"), json!("jobStart"), json!("jobEnd"), json!("handlerEnd")]
    );
    assert_eq!(job.metrics[0].name, None);
    assert!(job.metrics[1..]
        .iter()
        .all(|m| m.name.as_deref() == Some("mProject")));
    assert_eq!(job.description.exec_time_ms, Some(1000));
    assert!(!job.description.extra.contains_key("redis_url"));
}

// =============================================================================
// Job description
// =============================================================================

#[test]
fn test_exec_time_ms() {
    let log = "\
[2024-01-01T00:00:00.000000] [INFO] hf - Job started
[2024-01-01T00:00:05.500000] [INFO] hf - Job successful
";
    assert_eq!(run(log).description.exec_time_ms, Some(5500));
}

#[test]
fn test_input_size_enrichment_across_lines() {
    let log = r#"[1] [INFO] hf - jobMessage {"name": "mAdd", "inputs": [{"name": "a.txt"}], "outputs": [{"name": "out.fits"}]}
[2] [INFO] hf - Job command: 'mAdd a.txt out.fits'
[3] [INFO] hf - Job inputs: [{"a.txt": 1024}]
[4] [INFO] hf - Job outputs: [{'out.fits': 77}]
"#;
    let job = run(log);
    assert!(job.warnings.is_empty(), "{:?}", job.warnings);

    let description = serde_json::to_value(&job.description).unwrap();
    assert_eq!(description["inputs"], json!([{"name": "a.txt", "size": 1024}]));
    assert_eq!(description["outputs"], json!([{"name": "out.fits", "size": 77}]));
    assert_eq!(description["command"], json!("mAdd a.txt out.fits"));
    assert_eq!(description["name"], json!("mAdd"));
    assert_eq!(description["workflowName"], json!("montage"));
    assert_eq!(description["jobId"], json!("hf1-3-17"));
}

#[test]
fn test_missing_size_keeps_entry_and_warns() {
    let log = r#"[1] [INFO] hf - jobMessage {"name": "x", "inputs": [{"name": "a.txt"}, {"name": "b.txt"}]}
[2] [INFO] hf - Job inputs: [{"a.txt": 1}]
"#;
    let job = run(log);
    assert_eq!(
        job.description.inputs,
        Some(vec![FileRef::sized("a.txt", 1), FileRef::named("b.txt")])
    );
    assert_eq!(job.warnings.len(), 1);
    assert!(matches!(
        &job.warnings[0].error,
        LogError::UnmatchedFileSizeKey(name) if name == "b.txt"
    ));
}

#[test]
fn test_file_fields_kept_without_size_line() {
    let log = r#"[1] [INFO] hf - jobMessage {'name': 'mAdd', 'inputs': [{'name': 'a.txt', 'workflow_input': True}]}
"#;
    let job = run(log);
    assert!(job.warnings.is_empty(), "{:?}", job.warnings);
    let description = serde_json::to_value(&job.description).unwrap();
    assert_eq!(description["inputs"], json!([{"name": "a.txt", "workflow_input": true}]));
    assert_eq!(description["name"], json!("mAdd"));
}

#[test]
fn test_later_lines_own_command_and_env() {
    let log = r#"[1] [INFO] hf - jobMessage {"name": "x", "env": "inline", "command": ["a"]}
[2] [INFO] hf - Environment variables (HF_LOG):{"nodeName": "n1"}
[3] [INFO] hf - Job command: 'run a'
"#;
    let job = run(log);
    let line = serde_json::to_string(&job.description).unwrap();
    assert_eq!(line.matches("\"env\"").count(), 1, "{}", line);
    assert_eq!(line.matches("\"command\"").count(), 1, "{}", line);
    assert_eq!(job.description.command.as_deref(), Some("run a"));
    assert_eq!(job.description.env.as_ref().unwrap()["nodeName"], json!("n1"));
    assert_eq!(job.description.node_name, Some(json!("n1")));
}

#[test]
fn test_env_vars_and_sysinfo() {
    let log = r#"[1] [INFO] hf - Environment variables (HF_LOG): {"nodeName": "node-7", "HF_VAR_X": "1"}
[2] [INFO] hf - Sysinfo: {'cpu': {'cores': 8},
    'mem': {'total': 16}}
"#;
    let job = run(log);
    assert_eq!(job.description.node_name, Some(json!("node-7")));
    assert_eq!(job.description.env.as_ref().unwrap()["HF_VAR_X"], json!("1"));
    assert_eq!(job.sys_info.len(), 1);
    assert_eq!(job.sys_info[0]["cpu"]["cores"], json!(8));
    assert_eq!(job.sys_info[0]["mem"]["total"], json!(16));
    assert_eq!(job.sys_info[0]["jobId"], json!("hf1-3-17"));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_malformed_payload_is_reported_not_fatal() {
    let log = r#"[1] [INFO] hf - handler started
[2] [INFO] hf - Sysinfo: {'cpu': os.cpu_count()}
[3] [INFO] hf - IO: {"pid": 4, "read": 10}
"#;
    let job = run(log);
    assert_eq!(job.entries, 3);
    assert_eq!(job.metrics.len(), 2);
    assert!(job.sys_info.is_empty());
    assert_eq!(job.warnings.len(), 1);
    assert_eq!(job.warnings[0].rule, "SysInfo");
    assert_eq!(job.warnings[0].time, "2");
    assert!(matches!(job.warnings[0].error, LogError::MalformedPayload { .. }));
}

#[test]
fn test_bad_start_time_keeps_event() {
    let log = "\
[2024-13-45T99:00:00] [INFO] hf - Job started
[2024-01-01T00:00:01.000] [INFO] hf - Job successful
";
    let job = run(log);
    let events: Vec<_> = job.metrics.iter().map(|m| m.value.clone()).collect();
    assert_eq!(events, vec![json!("jobStart"), json!("jobEnd")]);
    assert_eq!(job.metrics[0].time, "2024-13-45T99:00:00");
    assert_eq!(job.warnings.len(), 1);
    assert_eq!(job.warnings[0].rule, "JobStarted");
    assert_eq!(job.warnings[0].time, "2024-13-45T99:00:00");
    assert!(matches!(job.warnings[0].error, LogError::MalformedTimestamp(_)));
    assert_eq!(job.description.exec_time_ms, None);
}

#[test]
fn test_corrupt_first_line_fails_file() {
    let err = parse_job(
        identity(),
        &workflow(),
        entries_from_str("garbage\n[1] [INFO] hf - Job started\n"),
    )
    .unwrap_err();
    assert!(matches!(err, LogError::CorruptFirstLine(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_unknown_lines_are_dropped() {
    let job = run("[1] [INFO] hf - something new\n[2] [INFO] hf - handler finished\n");
    assert_eq!(job.entries, 2);
    assert_eq!(job.unmatched, 1);
    assert_eq!(job.metrics.len(), 1);
    assert!(job.warnings.is_empty());
}

// =============================================================================
// Files on disk
// =============================================================================

#[test]
fn test_parse_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("task-wf9__1__2__1.log");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[2024-01-01T00:00:00.000] [INFO] hf - Job started").unwrap();
    writeln!(file, "[2024-01-01T00:00:02.000] [INFO] hf - Job successful").unwrap();
    drop(file);

    let job = parse_log_file(&path, &workflow()).unwrap();
    assert_eq!(job.identity.job_id, "wf9-1-2");
    assert_eq!(job.description.exec_time_ms, Some(2000));
}

#[test]
fn test_parse_log_file_bad_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.log");
    std::fs::write(&path, "[1] [INFO] hf - Job started\n").unwrap();

    let err = parse_log_file(&path, &workflow()).unwrap_err();
    assert!(matches!(err, LogError::MalformedFilename(_)));
}
