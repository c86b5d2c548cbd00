//! Golden tests for the audit log.
//!
//! Tests verify:
//! - Concurrent appends never interleave or truncate lines, whether writers
//!   share one handle or open their own
//! - Each line matches the published schema
//! - Records are append-only across log handles

use crosswind_guard::{
    AuditSink, Guardrail, JsonlAuditLog, RunwayHeading, TraceCategory, TraceRecorder,
    VerifyOptions, WindObservation,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

const THREADS: usize = 8;
const PER_THREAD: usize = 25;

#[test]
fn test_concurrent_emits_stay_whole() {
    let dir = tempdir().unwrap();
    let log = Arc::new(JsonlAuditLog::new(dir.path().join("trace.jsonl")));

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let log = Arc::clone(&log);
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    let mut tracer = TraceRecorder::new(TraceCategory::Crosswind);
                    tracer.set_context("worker", worker);
                    tracer.set_context("padding", "x".repeat(512 + i * 37));
                    tracer.log_input(None, Some("220 @ 10"));
                    tracer.emit(&*log).unwrap();
                }
            });
        }
    });

    let content = std::fs::read_to_string(log.path()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), THREADS * PER_THREAD);

    let mut ids = HashSet::new();
    for line in &lines {
        let value: Value = serde_json::from_str(line).expect("every line is a whole JSON object");
        ids.insert(value["trace_id"].as_str().unwrap().to_string());
    }
    assert_eq!(ids.len(), THREADS * PER_THREAD);
}

#[test]
fn test_separate_handles_share_one_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");

    thread::scope(|scope| {
        for _ in 0..THREADS {
            let path = path.clone();
            scope.spawn(move || {
                // One handle per writer, as a guardrail built per request would
                let log = JsonlAuditLog::new(&path);
                for i in 0..PER_THREAD {
                    let mut tracer = TraceRecorder::new(TraceCategory::Crosswind);
                    tracer.set_context("padding", "y".repeat(4096 + i * 53));
                    tracer.log_input(None, Some("220 @ 10"));
                    tracer.emit(&log).unwrap();
                }
            });
        }
    });

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), THREADS * PER_THREAD);
    for line in &lines {
        serde_json::from_str::<Value>(line).expect("every line is a whole JSON object");
    }
}

#[test]
fn test_concurrent_guardrail_verifications() {
    let dir = tempdir().unwrap();
    let log = Arc::new(JsonlAuditLog::new(dir.path().join("audit/trace.jsonl")));
    let guard = Guardrail::new().with_audit_sink(log.clone());

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let guard = guard.clone();
            scope.spawn(move || {
                let wind = WindObservation::new("KDEN", Some(220.0), 10.0, None).unwrap();
                let claim = format!("crosswind {} kt", worker + 5);
                let detailed = guard.verify_detailed(
                    &claim,
                    &wind,
                    &RunwayHeading::Degrees(260.0),
                    &VerifyOptions::default(),
                );
                assert!(detailed.audit_error.is_none());
            });
        }
    });

    let records = log.read_all().unwrap();
    assert_eq!(records.len(), THREADS);
    for record in &records {
        assert!(record.validate().is_ok());
        assert_eq!(record.events().len(), 4);
    }
}

#[test]
fn test_line_schema() {
    let dir = tempdir().unwrap();
    let log = JsonlAuditLog::new(dir.path().join("trace.jsonl"));
    let guard = Guardrail::new().with_audit_sink(Arc::new(JsonlAuditLog::new(log.path())));
    guard.verify_detailed(
        "crosswind 7 kt",
        &WindObservation::new("KDEN", Some(220.0), 10.0, None).unwrap(),
        &RunwayHeading::from("26"),
        &VerifyOptions::default(),
    );

    let content = std::fs::read_to_string(log.path()).unwrap();
    let line = content.lines().next().unwrap();
    let value: Value = serde_json::from_str(line).unwrap();

    let object = value.as_object().unwrap();
    let keys: Vec<&str> = object.keys().map(String::as_str).collect();
    assert_eq!(keys.len(), 4);
    assert!(value["trace_id"].is_string());
    assert_eq!(value["category"], "crosswind");
    assert_eq!(value["context"]["runway_heading"], "26");
    assert!(line.starts_with("{\"trace_id\":"));
    assert!(line.find("\"category\"").unwrap() < line.find("\"context\"").unwrap());
    assert!(line.find("\"context\"").unwrap() < line.find("\"events\"").unwrap());

    for event in value["events"].as_array().unwrap() {
        assert!(event["type"].is_string());
        assert!(event["ts"].is_f64());
    }
    assert_eq!(value["events"][2]["function"], "sin");
    assert_eq!(value["events"][3]["crosswind_kt"], 7.37);
}

#[test]
fn test_reopened_log_appends() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");

    for _ in 0..3 {
        let log = JsonlAuditLog::new(&path);
        let mut tracer = TraceRecorder::new(TraceCategory::SafeFail);
        tracer.log_input(None, None);
        log.append(&tracer.finish()).unwrap();
    }

    assert_eq!(JsonlAuditLog::new(&path).read_all().unwrap().len(), 3);
}
