use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use tracing::debug;

use crate::artifact::FileKind;
use crate::record::{NewScanRecord, RiskLevel, ScanRecord};
use crate::store::{ScanSink, StoreError};

pub const DB_FILE: &str = "scans.sqlite";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS scans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    filename TEXT NOT NULL,
    sha256 TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    file_kind TEXT NOT NULL,
    yara_matches TEXT NOT NULL,
    regex_matches TEXT NOT NULL,
    ml_score REAL NOT NULL,
    sqlite_scan TEXT,
    aleapp_scan TEXT NOT NULL,
    report_url TEXT,
    risk_level TEXT NOT NULL,
    degraded TEXT NOT NULL
)";

const COLUMNS: &str = "id, created_at, filename, sha256, size_bytes, file_kind, yara_matches, \
     regex_matches, ml_score, sqlite_scan, aleapp_scan, report_url, risk_level, degraded";

/// Scan history in a `scans` table; nested findings are stored as JSON text.
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Most recently inserted first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ScanRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM scans ORDER BY id DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], StoredRow::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_record()?);
        }
        Ok(out)
    }

    pub fn get(&self, id: i64) -> Result<Option<ScanRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM scans WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], StoredRow::from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?.into_record()?)),
            None => Ok(None),
        }
    }
}

impl ScanSink for SqliteSink {
    fn insert(&self, scan: NewScanRecord) -> Result<ScanRecord, StoreError> {
        let created_at = Utc::now();
        let yara = serde_json::to_string(&scan.signature_matches)?;
        let regex = serde_json::to_string(&scan.pattern_findings)?;
        let datastore = scan
            .datastore_findings
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let aleapp = serde_json::to_string(&scan.archive_findings)?;
        let degraded = serde_json::to_string(&scan.degraded)?;
        let kind = serde_json::to_value(scan.file_kind)?;

        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO scans (created_at, filename, sha256, size_bytes, file_kind, yara_matches, \
             regex_matches, ml_score, sqlite_scan, aleapp_scan, report_url, risk_level, degraded) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                created_at.to_rfc3339(),
                scan.filename,
                scan.sha256,
                scan.size_bytes as i64,
                kind.as_str().unwrap_or("other"),
                yara,
                regex,
                scan.toxicity_score,
                datastore,
                aleapp,
                scan.report_url,
                scan.risk_level.as_str(),
                degraded,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("stored scan {id} for {}", scan.filename);
        Ok(ScanRecord::assign(id, created_at, scan))
    }
}

struct StoredRow {
    id: i64,
    created_at: String,
    filename: String,
    sha256: String,
    size_bytes: i64,
    file_kind: String,
    yara_matches: String,
    regex_matches: String,
    ml_score: f64,
    sqlite_scan: Option<String>,
    aleapp_scan: String,
    report_url: Option<String>,
    risk_level: String,
    degraded: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            filename: row.get(2)?,
            sha256: row.get(3)?,
            size_bytes: row.get(4)?,
            file_kind: row.get(5)?,
            yara_matches: row.get(6)?,
            regex_matches: row.get(7)?,
            ml_score: row.get(8)?,
            sqlite_scan: row.get(9)?,
            aleapp_scan: row.get(10)?,
            report_url: row.get(11)?,
            risk_level: row.get(12)?,
            degraded: row.get(13)?,
        })
    }

    fn into_record(self) -> Result<ScanRecord, StoreError> {
        let id = self.id;
        let corrupt = |reason: String| StoreError::Corrupt { id, reason };
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|err| corrupt(format!("created_at: {err}")))?
            .with_timezone(&Utc);
        let risk_level = RiskLevel::parse(&self.risk_level)
            .ok_or_else(|| corrupt(format!("risk_level: {}", self.risk_level)))?;
        let file_kind: FileKind =
            serde_json::from_value(serde_json::Value::String(self.file_kind))?;
        let scan = NewScanRecord {
            filename: self.filename,
            sha256: self.sha256,
            size_bytes: u64::try_from(self.size_bytes).unwrap_or_default(),
            file_kind,
            signature_matches: serde_json::from_str(&self.yara_matches)?,
            pattern_findings: serde_json::from_str(&self.regex_matches)?,
            datastore_findings: self
                .sqlite_scan
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            toxicity_score: self.ml_score,
            archive_findings: serde_json::from_str(&self.aleapp_scan)?,
            report_url: self.report_url,
            risk_level,
            degraded: serde_json::from_str(&self.degraded)?,
        };
        Ok(ScanRecord::assign(id, created_at, scan))
    }
}
