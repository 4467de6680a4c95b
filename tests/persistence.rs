mod common;

use std::sync::Arc;

use ioctriage::pipeline::Orchestrator;
use ioctriage::record::RiskLevel;
use ioctriage::store::sqlite::{DB_FILE, SqliteSink};
use ioctriage::store::{ScanSink, StoreKind, build_sink, jsonl};

use common::{FixedScore, ScriptedTools, test_config, write_file};

#[test]
fn sqlite_history_keeps_degraded_notes() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let sink = Arc::new(SqliteSink::open(&dir.path().join("out").join(DB_FILE)).unwrap());
    let orchestrator = Orchestrator::from_config(
        &cfg,
        Arc::new(ScriptedTools::new().with_signature(common::yara_matches(&["Spy_Rule"]))),
        Arc::new(FixedScore::Unavailable),
        sink.clone(),
    )
    .unwrap();

    let first = orchestrator
        .scan_path(&write_file(dir.path(), "one.apk", b"first"))
        .unwrap();
    let second = orchestrator
        .scan_path(&write_file(dir.path(), "two.apk", b"second"))
        .unwrap();
    assert!(second.id > first.id);

    let recent = sink.recent(10).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].filename, "two.apk");
    assert_eq!(recent[0].risk_level, RiskLevel::High);
    assert_eq!(recent[0].signature_matches, vec!["Spy_Rule"]);
    assert_eq!(recent[0].degraded[0].engine, "toxicity");
    assert_eq!(recent[1].scan, first.scan);
}

#[test]
fn jsonl_sink_writes_under_run_dir() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let run_dir = dir.path().join("output").join("run-7");
    let sink: Arc<dyn ScanSink> =
        Arc::from(build_sink(StoreKind::Jsonl, "run-7", "0.1.0", "deadbeef", &run_dir).unwrap());
    let orchestrator = Orchestrator::from_config(
        &cfg,
        Arc::new(ScriptedTools::new()),
        Arc::new(FixedScore::Score(0.2)),
        sink.clone(),
    )
    .unwrap();

    orchestrator
        .scan_path(&write_file(dir.path(), "a.txt", b"contact admin@example.net"))
        .unwrap();
    sink.flush().unwrap();

    let text = std::fs::read_to_string(run_dir.join(jsonl::FILE_NAME)).unwrap();
    let line: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    assert_eq!(line["run_id"], "run-7");
    assert_eq!(line["filename"], "a.txt");
    assert_eq!(line["risk_level"], "LOW");
    assert_eq!(line["pattern_findings"]["emails"][0], "admin@example.net");
    assert_eq!(line["sha256"].as_str().map(str::len), Some(64));
}
