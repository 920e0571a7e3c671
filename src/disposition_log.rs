//! Append-only record disposition log.
//!
//! One NDJSON line per submitted (or locally rejected) record, tagged with a
//! correlation id so a run can be reconciled offline against the API side.

use crate::error::Result;
use crate::types::{Job, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Success,
    Failure,
}

/// `cid` tags a submission attempt, `sid` a record that never left the
/// process because its payload could not be serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    Cid,
    Sid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispositionEntry {
    pub recorded_at: DateTime<Utc>,
    pub disposition: Disposition,
    pub id_kind: IdKind,
    pub id: String,
    pub digest: String,
    pub payload: String,
}

impl DispositionEntry {
    pub fn submission(disposition: Disposition, cid: &str, job: &Job) -> Self {
        Self {
            recorded_at: Utc::now(),
            disposition,
            id_kind: IdKind::Cid,
            id: cid.to_string(),
            digest: job.digest.clone(),
            payload: job.payload_text(),
        }
    }

    /// Failure entry for a record whose envelope could not be serialized.
    /// The payload is rebuilt by hand so the record is still recoverable.
    pub fn serialization_failure(sid: &str, record: &Record) -> Self {
        let payload = match serde_json::to_string(record) {
            Ok(inner) => format!("{{\"PaymentRecord\":{}}}", inner),
            Err(_) => format!("{{\"PaymentRecord\":{}}}", record.to_json_string()),
        };
        Self {
            recorded_at: Utc::now(),
            disposition: Disposition::Failure,
            id_kind: IdKind::Sid,
            id: sid.to_string(),
            digest: record.digest(),
            payload,
        }
    }
}

/// Sink for disposition entries, shared by every worker of a run.
pub trait DispositionLog: Send + Sync {
    fn append(&self, entry: &DispositionEntry) -> Result<()>;
}

/// File-backed log writing one JSON object per line.
pub struct FileDispositionLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileDispositionLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DispositionLog for FileDispositionLog {
    fn append(&self, entry: &DispositionEntry) -> Result<()> {
        let line = serde_json::to_string(entry)?;
        // A poisoned lock only means another writer panicked mid-line; keep appending.
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// In-memory log, handy for tests and dry runs.
#[derive(Default)]
pub struct MemoryDispositionLog {
    entries: Mutex<Vec<DispositionEntry>>,
}

impl MemoryDispositionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<DispositionEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl DispositionLog for MemoryDispositionLog {
    fn append(&self, entry: &DispositionEntry) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        Ok(())
    }
}

/// Read every entry back from a disposition log file.
pub fn read_entries(path: &Path) -> Result<Vec<DispositionEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(out)
}
