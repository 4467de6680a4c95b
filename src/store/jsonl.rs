use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

use crate::record::{NewScanRecord, ScanRecord};
use crate::store::{ScanSink, StoreError};

pub const FILE_NAME: &str = "scans.jsonl";

struct Writer {
    out: BufWriter<File>,
    next_id: i64,
}

pub struct JsonlSink {
    run_id: String,
    tool_version: String,
    config_hash: String,
    path: PathBuf,
    writer: Mutex<Writer>,
}

#[derive(Serialize)]
struct ScanLine<'a> {
    #[serde(flatten)]
    record: &'a ScanRecord,
    run_id: &'a str,
    tool_version: &'a str,
    config_hash: &'a str,
}

impl JsonlSink {
    pub fn new(
        run_id: &str,
        tool_version: &str,
        config_hash: &str,
        run_output_dir: &Path,
    ) -> Result<Self, StoreError> {
        std::fs::create_dir_all(run_output_dir)?;
        let path = run_output_dir.join(FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            run_id: run_id.to_string(),
            tool_version: tool_version.to_string(),
            config_hash: config_hash.to_string(),
            path,
            writer: Mutex::new(Writer {
                out: BufWriter::new(file),
                next_id: 1,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScanSink for JsonlSink {
    fn insert(&self, scan: NewScanRecord) -> Result<ScanRecord, StoreError> {
        let mut guard = self.writer.lock().map_err(|_| StoreError::Poisoned)?;
        let record = ScanRecord::assign(guard.next_id, Utc::now(), scan);
        let line = ScanLine {
            record: &record,
            run_id: &self.run_id,
            tool_version: &self.tool_version,
            config_hash: &self.config_hash,
        };
        serde_json::to_writer(&mut guard.out, &line)?;
        guard.out.write_all(b"\n")?;
        guard.out.flush()?;
        guard.next_id += 1;
        Ok(record)
    }

    fn flush(&self) -> Result<(), StoreError> {
        let mut guard = self.writer.lock().map_err(|_| StoreError::Poisoned)?;
        guard.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::sample;

    #[test]
    fn writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new("run-1", "0.1.0", "cafe", dir.path()).unwrap();
        let first = sink.insert(sample("one.apk")).unwrap();
        let second = sink.insert(sample("two.apk")).unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        let text = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[0]["filename"], "one.apk");
        assert_eq!(lines[0]["run_id"], "run-1");
        assert_eq!(lines[0]["config_hash"], "cafe");
        assert_eq!(lines[0]["risk_level"], "HIGH");
        assert_eq!(lines[1]["signature_matches"][0], "Android_Spy");
        assert_eq!(lines[1]["degraded"][0]["engine"], "toxicity");
        assert!(lines[1]["pattern_findings"]["urls"].is_array());
    }

    #[test]
    fn record_round_trips_through_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new("run-1", "0.1.0", "cafe", dir.path()).unwrap();
        let stored = sink.insert(sample("one.apk")).unwrap();
        let text = std::fs::read_to_string(sink.path()).unwrap();
        let parsed: ScanRecord = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(parsed.id, stored.id);
        assert_eq!(parsed.scan, stored.scan);
    }
}
