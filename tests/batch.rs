mod common;

use std::sync::Arc;

use ioctriage::pipeline::{ScanError, batch};
use ioctriage::record::RiskLevel;

use common::{FixedScore, ScriptedTools, harness, test_config, write_file};

#[test]
fn results_come_back_in_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let h = harness(&cfg, ScriptedTools::new(), FixedScore::Score(0.0));

    let mut inputs = Vec::new();
    for i in 0..12 {
        if i == 5 {
            inputs.push(dir.path().join("missing.apk"));
        } else {
            let name = format!("sample-{i:02}.txt");
            inputs.push(write_file(dir.path(), &name, format!("artifact {i}").as_bytes()));
        }
    }

    let sink = h.sink.clone();
    let output = batch::run_batch(Arc::new(h.orchestrator), inputs, 4);
    assert_eq!(output.results.len(), 12);
    for (i, result) in output.results.iter().enumerate() {
        if i == 5 {
            assert!(matches!(result, Err(ScanError::Input(_))));
        } else {
            let record = result.as_ref().expect("scan ok");
            assert_eq!(record.filename, format!("sample-{i:02}.txt"));
        }
    }
    assert_eq!(output.stats.scanned, 11);
    assert_eq!(output.stats.failed, 1);
    assert_eq!(output.stats.high_risk, 0);
    assert_eq!(sink.records().unwrap().len(), 11);
}

#[test]
fn stats_count_high_risk_and_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let tools = ScriptedTools::new().with_signature(common::yara_matches(&["Dropper"]));
    let h = harness(&cfg, tools, FixedScore::Unavailable);
    let inputs = vec![
        write_file(dir.path(), "a.bin", b"aaa"),
        write_file(dir.path(), "b.bin", b"bbb"),
    ];

    let output = batch::run_batch(Arc::new(h.orchestrator), inputs, 8);
    assert!(output.results.iter().all(|r| {
        r.as_ref()
            .map(|rec| rec.risk_level == RiskLevel::High)
            .unwrap_or(false)
    }));
    assert_eq!(output.stats.high_risk, 2);
    assert_eq!(output.stats.degraded, 2);
}

#[test]
fn empty_batch_is_fine() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let h = harness(&cfg, ScriptedTools::new(), FixedScore::Score(0.0));
    let output = batch::run_batch(Arc::new(h.orchestrator), Vec::new(), 4);
    assert!(output.results.is_empty());
    assert_eq!(output.stats, batch::BatchStats::default());
}
