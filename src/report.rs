//! Test-run records and their narrow persistence seams.
//!
//! Persistence and report generation are external collaborators; this
//! module only defines the record value type, the [`RunStore`] /
//! [`ReportRenderer`] interfaces, and a JSON-lines store for harness use.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed,
    Skipped,
}

/// Metadata for one executed test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRunRecord {
    pub id: String,
    pub name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Persist and look up run records by identifier.
pub trait RunStore {
    fn create(&mut self, record: &TestRunRecord) -> Result<()>;
    fn update(&mut self, record: &TestRunRecord) -> Result<()>;
    fn find(&self, id: &str) -> Result<Option<TestRunRecord>>;
}

/// Turn a directory of raw results into a rendered report directory.
pub trait ReportRenderer {
    fn render(&self, results_dir: &Path) -> Result<PathBuf>;
}

/// Append-only JSON-lines store; the latest line for an id wins.
#[derive(Debug, Clone)]
pub struct JsonRunStore {
    path: PathBuf,
}

impl JsonRunStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, record: &TestRunRecord) -> Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| Error::Config(format!("run record serialization failed: {e}")))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

impl RunStore for JsonRunStore {
    fn create(&mut self, record: &TestRunRecord) -> Result<()> {
        self.append(record)
    }

    fn update(&mut self, record: &TestRunRecord) -> Result<()> {
        self.append(record)
    }

    fn find(&self, id: &str) -> Result<Option<TestRunRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut latest = None;
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let record: TestRunRecord = serde_json::from_str(line)
                .map_err(|e| Error::Config(format!("corrupt run record: {e}")))?;
            if record.id == id {
                latest = Some(record);
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, status: RunStatus) -> TestRunRecord {
        TestRunRecord {
            id: id.to_string(),
            name: format!("case {id}"),
            status,
            started_at: Utc::now(),
            duration_ms: 42,
            failure: None,
        }
    }

    #[test]
    fn test_create_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonRunStore::new(dir.path().join("runs.jsonl"));

        store.create(&record("run-1", RunStatus::Passed)).unwrap();
        store.create(&record("run-2", RunStatus::Failed)).unwrap();

        let found = store.find("run-2").unwrap().unwrap();
        assert_eq!(found.status, RunStatus::Failed);
        assert!(store.find("run-9").unwrap().is_none());
    }

    #[test]
    fn test_update_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonRunStore::new(dir.path().join("runs.jsonl"));

        let mut rec = record("run-1", RunStatus::Skipped);
        store.create(&rec).unwrap();
        rec.status = RunStatus::Passed;
        rec.duration_ms = 99;
        store.update(&rec).unwrap();

        let found = store.find("run-1").unwrap().unwrap();
        assert_eq!(found.status, RunStatus::Passed);
        assert_eq!(found.duration_ms, 99);
    }

    #[test]
    fn test_find_on_missing_file() {
        let store = JsonRunStore::new("/nonexistent/dir/runs.jsonl");
        assert!(store.find("x").unwrap().is_none());
    }

    #[test]
    fn test_failure_field_round_trips() {
        let mut rec = record("run-1", RunStatus::Failed);
        rec.failure = Some("assertion failed: status code".to_string());

        let line = serde_json::to_string(&rec).unwrap();
        let parsed: TestRunRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, rec);
    }
}
