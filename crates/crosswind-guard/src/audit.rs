//! Durable, append-only audit log of trace records.
//!
//! One JSON object per line. Concurrent writers never interleave partial
//! lines: each append serializes and writes the whole line under one lock,
//! with a single `write_all` on a file opened in append mode. Every
//! `JsonlAuditLog` for the same path shares that lock.

use crate::error::GuardError;
use crate::trace::TraceRecord;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Default log location, relative to the working directory.
pub const DEFAULT_AUDIT_PATH: &str = "logs/trace.jsonl";

/// Reported as the audit error when a record had nowhere to go.
pub const NO_AUDIT_SINK: &str = "no audit sink configured";

/// Write locks keyed by absolute log path
static WRITE_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Destination for sealed trace records.
pub trait AuditSink: Send + Sync {
    /// Append one record atomically.
    fn append(&self, record: &TraceRecord) -> Result<(), GuardError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock_for(path: &Path) -> Arc<Mutex<()>> {
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    Arc::clone(lock(&WRITE_LOCKS).entry(key).or_default())
}

/// Emit `record` to `sink`, returning any failure as text. A missing sink is
/// a failure too: the record is lost and the caller must be told.
pub(crate) fn emit_or_report(sink: Option<&dyn AuditSink>, record: &TraceRecord) -> Option<String> {
    let Some(sink) = sink else {
        warn!(trace_id = record.trace_id(), "no audit sink configured, record dropped");
        return Some(NO_AUDIT_SINK.to_string());
    };
    match record.emit(sink) {
        Ok(()) => None,
        Err(e) => {
            warn!(trace_id = record.trace_id(), error = %e, "audit emission failed");
            Some(e.to_string())
        }
    }
}

/// JSONL file sink.
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonlAuditLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            write_lock: write_lock_for(&path),
            path,
        }
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_AUDIT_PATH)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record. Blank or unreadable lines are skipped.
    pub fn read_all(&self) -> Result<Vec<TraceRecord>, GuardError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TraceRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = index + 1, error = %e, "skipping unreadable audit line"),
            }
        }
        Ok(records)
    }
}

impl AuditSink for JsonlAuditLog {
    fn append(&self, record: &TraceRecord) -> Result<(), GuardError> {
        let _guard = lock(&*self.write_lock);

        let mut line = record.to_json_line()?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// In-process sink, for tests and embedders that ship records elsewhere.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<TraceRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        lock(&self.records).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, record: &TraceRecord) -> Result<(), GuardError> {
        lock(&self.records).push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{TraceCategory, TraceRecorder};
    use tempfile::tempdir;

    fn sample(category: TraceCategory) -> TraceRecord {
        let mut tracer = TraceRecorder::new(category);
        tracer.set_context("airport", "KDEN");
        tracer.log_input(None, Some("220 @ 10"));
        tracer.finish()
    }

    #[test]
    fn test_append_creates_parent_dir() {
        let dir = tempdir().unwrap();
        let log = JsonlAuditLog::new(dir.path().join("nested/logs/trace.jsonl"));
        let record = sample(TraceCategory::Crosswind);
        record.emit(&log).unwrap();

        let back = log.read_all().unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].trace_id(), record.trace_id());
    }

    #[test]
    fn test_append_only() {
        let dir = tempdir().unwrap();
        let log = JsonlAuditLog::new(dir.path().join("trace.jsonl"));
        let first = sample(TraceCategory::Crosswind);
        let second = sample(TraceCategory::SafeFail);
        first.emit(&log).unwrap();
        second.emit(&log).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(first.trace_id()));
        assert!(lines[1].contains("\"category\":\"safe_fail\""));
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = JsonlAuditLog::new(dir.path().join("absent.jsonl"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_read_skips_garbage_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let log = JsonlAuditLog::new(&path);
        sample(TraceCategory::Crosswind).emit(&log).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        assert_eq!(log.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryAuditLog::new();
        assert!(sink.is_empty());
        sample(TraceCategory::Crosswind).emit(&sink).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].category(), TraceCategory::Crosswind);
    }

    #[test]
    fn test_handles_share_lock_per_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let first = JsonlAuditLog::new(&path);
        let second = JsonlAuditLog::new(dir.path().join(".").join("trace.jsonl"));
        let other = JsonlAuditLog::new(dir.path().join("other.jsonl"));

        assert!(Arc::ptr_eq(&first.write_lock, &JsonlAuditLog::new(&path).write_lock));
        assert!(Arc::ptr_eq(&first.write_lock, &second.write_lock));
        assert!(!Arc::ptr_eq(&first.write_lock, &other.write_lock));
    }

    #[test]
    fn test_missing_sink_is_reported() {
        let record = sample(TraceCategory::SafeFail);
        assert_eq!(emit_or_report(None, &record).as_deref(), Some(NO_AUDIT_SINK));

        let sink = MemoryAuditLog::new();
        assert_eq!(emit_or_report(Some(&sink), &record), None);
        assert_eq!(sink.len(), 1);
    }
}
