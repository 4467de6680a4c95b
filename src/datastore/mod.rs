//! # Datastore Module
//!
//! Forensic content scanner for embedded SQLite datastores. Every text or blob cell
//! of every scanned row runs through the datastore pattern table plus the watchlist
//! heuristics, and findings are aggregated across the whole file.

pub mod watchlist;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DatastoreConfig;
use crate::ioc::{IndicatorAccumulator, IndicatorKind, PatternSet};

pub use watchlist::Watchlists;

#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("datastore not found: {0}")]
    NotFound(PathBuf),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub table: String,
    pub total_rows: u64,
    pub rows_scanned: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatastoreSummary {
    pub tables_scanned: usize,
    pub table_details: Vec<TableSummary>,
}

impl DatastoreSummary {
    pub fn rows_scanned(&self) -> u64 {
        self.table_details.iter().map(|t| t.rows_scanned).sum()
    }
}

/// Distinct values of one category; `count` is never capped, `values` may be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CappedValues {
    pub count: usize,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatastoreReport {
    pub summary: DatastoreSummary,
    pub iocs: BTreeMap<IndicatorKind, CappedValues>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl DatastoreReport {
    pub fn has(&self, kind: IndicatorKind) -> bool {
        self.iocs.contains_key(&kind)
    }
}

pub struct ForensicScanner {
    watchlists: Arc<Watchlists>,
    limits: DatastoreConfig,
}

impl ForensicScanner {
    pub fn new(watchlists: Arc<Watchlists>, limits: DatastoreConfig) -> Self {
        Self { watchlists, limits }
    }

    pub fn scan(&self, path: &Path) -> Result<DatastoreReport, DatastoreError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.scan_named(path, &name)
    }

    /// Scan `path`, checking `display_name` (the uploaded name) against the filename
    /// watchlist. The connection is closed before this returns on every path.
    pub fn scan_named(
        &self,
        path: &Path,
        display_name: &str,
    ) -> Result<DatastoreReport, DatastoreError> {
        if !path.exists() {
            return Err(DatastoreError::NotFound(path.to_path_buf()));
        }

        let mut warnings = Vec::new();
        if self.watchlists.is_suspicious_filename(display_name) {
            warn!("suspicious datastore filename detected: {display_name}");
            warnings.push(format!("suspicious datastore filename: {display_name}"));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let tables = list_tables(&conn)?;

        let mut acc = IndicatorAccumulator::new();
        let mut budget = self.limits.row_limit;
        let mut table_details = Vec::with_capacity(tables.len());
        for table in &tables {
            table_details.push(self.scan_table(&conn, table, &mut budget, &mut acc));
        }

        if let Err((_, err)) = conn.close() {
            warn!("datastore close error: {err}");
        }

        let cap = self.limits.value_cap;
        let iocs = acc
            .into_sets()
            .into_iter()
            .map(|(kind, set)| {
                let count = set.len();
                let values = set.into_values().into_iter().take(cap).collect();
                (kind, CappedValues { count, values })
            })
            .collect();

        Ok(DatastoreReport {
            summary: DatastoreSummary {
                tables_scanned: tables.len(),
                table_details,
            },
            iocs,
            warnings,
        })
    }

    fn scan_table(
        &self,
        conn: &Connection,
        table: &str,
        budget: &mut u64,
        acc: &mut IndicatorAccumulator,
    ) -> TableSummary {
        let mut summary = TableSummary {
            table: table.to_string(),
            total_rows: 0,
            rows_scanned: 0,
            error: None,
        };
        if let Err(err) = self.walk_table(conn, table, budget, acc, &mut summary) {
            warn!("table {table} aborted after {} rows: {err}", summary.rows_scanned);
            summary.error = Some(err.to_string());
        }
        debug!(
            "table {} total_rows={} rows_scanned={}",
            summary.table, summary.total_rows, summary.rows_scanned
        );
        summary
    }

    fn walk_table(
        &self,
        conn: &Connection,
        table: &str,
        budget: &mut u64,
        acc: &mut IndicatorAccumulator,
        summary: &mut TableSummary,
    ) -> rusqlite::Result<()> {
        let quoted = quote_identifier(table);
        let total: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {quoted}"), [], |row| row.get(0))?;
        summary.total_rows = total.max(0) as u64;

        let mut stmt = conn.prepare(&format!("SELECT * FROM {quoted} LIMIT ?1 OFFSET ?2"))?;
        let column_count = stmt.column_count();
        let batch_size = self.limits.batch_size.max(1);

        while summary.rows_scanned < summary.total_rows && *budget > 0 {
            let limit = batch_size.min(*budget);
            let mut rows = stmt.query(params![limit as i64, summary.rows_scanned as i64])?;
            let mut fetched = 0u64;
            while let Some(row) = rows.next()? {
                for idx in 0..column_count {
                    if let Some(text) = cell_text(row.get_ref(idx)?) {
                        self.inspect(&text, acc);
                    }
                }
                fetched += 1;
                summary.rows_scanned += 1;
                *budget -= 1;
            }
            if fetched == 0 {
                break;
            }
        }
        Ok(())
    }

    fn inspect(&self, text: &str, acc: &mut IndicatorAccumulator) {
        PatternSet::datastore().collect(text, acc);

        let lowered = text.to_lowercase();
        for domain in self.watchlists.domains_in(&lowered) {
            acc.add(IndicatorKind::SuspiciousDomains, domain);
        }
        for keyword in self.watchlists.keywords_in(&lowered) {
            acc.add(IndicatorKind::SuspiciousKeywords, keyword);
        }
        if self.watchlists.is_suspicious_package(text) {
            acc.add(IndicatorKind::SuspiciousPackages, text);
        }
    }
}

fn list_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table'")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Text cells as-is, blobs with non-printable bytes stripped; everything else skipped.
fn cell_text(value: ValueRef<'_>) -> Option<Cow<'_, str>> {
    match value {
        ValueRef::Text(bytes) if !bytes.is_empty() => Some(String::from_utf8_lossy(bytes)),
        ValueRef::Blob(bytes) => {
            let printable: String = bytes
                .iter()
                .filter(|b| matches!(**b, 0x20..=0x7E))
                .map(|&b| b as char)
                .collect();
            if printable.is_empty() {
                None
            } else {
                Some(Cow::Owned(printable))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn scanner(row_limit: u64, batch_size: u64, value_cap: usize) -> ForensicScanner {
        let loaded = crate::config::load_config(None).expect("config");
        let watchlists = Watchlists::from_config(&loaded.config.watchlists).expect("watchlists");
        ForensicScanner::new(
            Arc::new(watchlists),
            DatastoreConfig {
                row_limit,
                batch_size,
                value_cap,
            },
        )
    }

    #[test]
    fn aggregates_indicators_across_cells() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("app.db");
        let conn = Connection::open(&path).expect("conn");
        conn.execute(
            "CREATE TABLE messages (id INTEGER PRIMARY KEY, body TEXT, raw BLOB, n INTEGER)",
            [],
        )
        .expect("create");
        conn.execute(
            "INSERT INTO messages (body, raw, n) VALUES (?1, ?2, ?3)",
            (
                "mail ops@evil.example.com via http://evil.xyz/drop",
                b"\x00\x01bearer\x02token\xff".to_vec(),
                4155551234i64,
            ),
        )
        .expect("insert");
        conn.execute(
            "INSERT INTO messages (body, raw, n) VALUES (?1, NULL, NULL)",
            ("com.keylogger.agent",),
        )
        .expect("insert");
        drop(conn);

        let report = scanner(5000, 1000, 100).scan(&path).expect("scan");
        assert_eq!(report.summary.tables_scanned, 1);
        assert_eq!(report.summary.table_details[0].total_rows, 2);
        assert_eq!(report.summary.table_details[0].rows_scanned, 2);
        assert_eq!(
            report.iocs[&IndicatorKind::Emails].values,
            vec!["ops@evil.example.com".to_string()]
        );
        assert_eq!(
            report.iocs[&IndicatorKind::SuspiciousDomains].values,
            vec!["evil.xyz".to_string()]
        );
        let keywords = &report.iocs[&IndicatorKind::SuspiciousKeywords].values;
        assert!(keywords.iter().any(|k| k == "bearer"));
        assert!(keywords.iter().any(|k| k == "token"));
        assert_eq!(
            report.iocs[&IndicatorKind::SuspiciousPackages].values,
            vec!["com.keylogger.agent".to_string()]
        );
        assert!(!report.has(IndicatorKind::PhoneNumbers));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn row_budget_is_shared_across_tables() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("budget.sqlite");
        let conn = Connection::open(&path).expect("conn");
        for table in ["first", "second", "third"] {
            conn.execute(&format!("CREATE TABLE {table} (v TEXT)"), [])
                .expect("create");
            for i in 0..30 {
                conn.execute(
                    &format!("INSERT INTO {table} (v) VALUES (?1)"),
                    (format!("row {i}"),),
                )
                .expect("insert");
            }
        }
        drop(conn);

        let report = scanner(40, 7, 100).scan(&path).expect("scan");
        let details = &report.summary.table_details;
        assert_eq!(report.summary.tables_scanned, 3);
        assert_eq!(details[0].table, "first");
        assert_eq!(details[0].rows_scanned, 30);
        assert_eq!(details[1].rows_scanned, 10);
        assert_eq!(details[2].rows_scanned, 0);
        assert_eq!(details[2].total_rows, 30);
        assert!(report.summary.rows_scanned() <= 40);
    }

    #[test]
    fn caps_materialized_values_but_not_count() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("contacts.db");
        let conn = Connection::open(&path).expect("conn");
        conn.execute("CREATE TABLE contacts (email TEXT)", [])
            .expect("create");
        for i in 0..150 {
            conn.execute(
                "INSERT INTO contacts (email) VALUES (?1)",
                (format!("user{i}@example.org"),),
            )
            .expect("insert");
        }
        drop(conn);

        let report = scanner(5000, 1000, 100).scan(&path).expect("scan");
        let emails = &report.iocs[&IndicatorKind::Emails];
        assert_eq!(emails.count, 150);
        assert_eq!(emails.values.len(), 100);
        assert_eq!(emails.values[0], "user0@example.org");
    }

    #[test]
    fn missing_datastore_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let err = scanner(10, 10, 10)
            .scan(&dir.path().join("absent.db"))
            .expect_err("missing");
        assert!(matches!(err, DatastoreError::NotFound(_)));
    }

    #[test]
    fn suspicious_filename_warns_without_aborting() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("upload.tmp");
        let conn = Connection::open(&path).expect("conn");
        conn.execute("CREATE TABLE t (v TEXT)", []).expect("create");
        conn.execute("INSERT INTO t (v) VALUES ('10.1.2.3')", [])
            .expect("insert");
        drop(conn);

        let report = scanner(10, 10, 10)
            .scan_named(&path, "wa.db")
            .expect("scan");
        assert_eq!(report.warnings.len(), 1);
        assert!(report.has(IndicatorKind::Ipv4));
    }

    #[test]
    fn failing_table_keeps_other_tables_findings() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("mixed.db");
        let conn = Connection::open(&path).expect("conn");
        conn.execute("CREATE TABLE alpha (v TEXT)", []).expect("create");
        conn.execute("INSERT INTO alpha (v) VALUES ('a@b.io')", [])
            .expect("insert");
        conn.execute(
            "CREATE TABLE broken (a INTEGER, b INTEGER AS (abs(a)))",
            [],
        )
        .expect("create");
        conn.execute("INSERT INTO broken (a) VALUES (?1)", [i64::MIN])
            .expect("insert");
        conn.execute("CREATE TABLE gamma (v TEXT)", []).expect("create");
        conn.execute("INSERT INTO gamma (v) VALUES ('call malspam.ru')", [])
            .expect("insert");
        drop(conn);

        let report = scanner(5000, 1000, 100).scan(&path).expect("scan");
        let details = &report.summary.table_details;
        assert_eq!(report.summary.tables_scanned, 3);
        assert!(details[0].error.is_none());
        assert!(details[1].error.is_some());
        assert_eq!(details[2].rows_scanned, 1);
        assert!(report.has(IndicatorKind::Emails));
        assert!(report.has(IndicatorKind::SuspiciousDomains));
    }

    #[test]
    fn blob_cells_are_stripped_to_printable_ascii() {
        let text = cell_text(ValueRef::Blob(b"\x00ab\x7fc\n")).expect("text");
        assert_eq!(text, "abc");
        assert!(cell_text(ValueRef::Blob(b"\x00\x01")).is_none());
        assert!(cell_text(ValueRef::Integer(7)).is_none());
        assert!(cell_text(ValueRef::Null).is_none());
        assert!(cell_text(ValueRef::Text(b"")).is_none());
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
