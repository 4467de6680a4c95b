pub mod jsonl;
pub mod sqlite;

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use thiserror::Error;

use crate::record::{NewScanRecord, ScanRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Jsonl,
    Sqlite,
    None,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt stored record {id}: {reason}")]
    Corrupt { id: i64, reason: String },
    #[error("sink lock poisoned")]
    Poisoned,
}

/// Persistence collaborator for classified scans.
///
/// # Example
/// ```rust
/// use ioctriage::store::{MemorySink, ScanSink};
///
/// let sink = MemorySink::default();
/// assert!(sink.records().unwrap().is_empty());
/// sink.flush().unwrap();
/// ```
pub trait ScanSink: Send + Sync {
    /// Store one record, assigning its id and timestamp. No retries, no batching.
    fn insert(&self, scan: NewScanRecord) -> Result<ScanRecord, StoreError>;

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Keeps records in process.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<ScanRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Result<Vec<ScanRecord>, StoreError> {
        let guard = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.clone())
    }
}

impl ScanSink for MemorySink {
    fn insert(&self, scan: NewScanRecord) -> Result<ScanRecord, StoreError> {
        let mut guard = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        let record = ScanRecord::assign(guard.len() as i64 + 1, Utc::now(), scan);
        guard.push(record.clone());
        Ok(record)
    }
}

/// Assigns ids but keeps nothing.
pub struct DryRunSink {
    next_id: Mutex<i64>,
}

impl Default for DryRunSink {
    fn default() -> Self {
        Self {
            next_id: Mutex::new(1),
        }
    }
}

impl ScanSink for DryRunSink {
    fn insert(&self, scan: NewScanRecord) -> Result<ScanRecord, StoreError> {
        let mut next = self.next_id.lock().map_err(|_| StoreError::Poisoned)?;
        let id = *next;
        *next += 1;
        Ok(ScanRecord::assign(id, Utc::now(), scan))
    }
}

pub fn build_sink(
    kind: StoreKind,
    run_id: &str,
    tool_version: &str,
    config_hash: &str,
    run_output_dir: &Path,
) -> Result<Box<dyn ScanSink>, StoreError> {
    match kind {
        StoreKind::Jsonl => Ok(Box::new(jsonl::JsonlSink::new(
            run_id,
            tool_version,
            config_hash,
            run_output_dir,
        )?)),
        StoreKind::Sqlite => Ok(Box::new(sqlite::SqliteSink::open(
            &run_output_dir.join(sqlite::DB_FILE),
        )?)),
        StoreKind::None => Ok(Box::new(DryRunSink::default())),
    }
}
