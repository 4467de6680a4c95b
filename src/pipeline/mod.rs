//! # Pipeline Module
//!
//! Runs one artifact through every applicable engine, fuses the tagged outcomes into a
//! verdict and hands exactly one record to the persistence sink. Engines for a single
//! request run on scoped threads and are all joined before classification.

pub mod batch;
pub mod outcome;

use std::path::Path;
use std::sync::Arc;
use std::thread;

use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::archive::{ArchiveBridge, ArchiveReport};
use crate::artifact::{Artifact, ArtifactError, FileKind};
use crate::config::{Config, IntakeConfig, RiskConfig};
use crate::datastore::watchlist::WatchlistError;
use crate::datastore::{DatastoreReport, ForensicScanner, Watchlists};
use crate::ioc::{IndicatorReport, PatternSet};
use crate::record::{NewScanRecord, ScanRecord};
use crate::risk;
use crate::signature::{SignatureBridge, SignatureError};
use crate::store::{ScanSink, StoreError};
use crate::tools::ToolRunner;
use crate::toxicity::ToxicityScorer;

pub use outcome::EngineOutcome;

/// The single user-visible failure of a scan request.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("input missing: {0}")]
    Input(String),
    #[error("signature tool failure: {0}")]
    Signature(String),
    #[error("persistence failure: {0}")]
    Persist(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Input(_) => "input_missing",
            ScanError::Signature(_) => "signature_tool_failure",
            ScanError::Persist(_) => "persist_failure",
            ScanError::Io(_) => "io",
            ScanError::Internal(_) => "internal",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({ "error": self.kind(), "message": self.to_string() })
    }
}

impl From<ArtifactError> for ScanError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::InputMissing(what) => ScanError::Input(what),
            ArtifactError::Io(err) => ScanError::Io(err.to_string()),
        }
    }
}

impl From<SignatureError> for ScanError {
    fn from(err: SignatureError) -> Self {
        ScanError::Signature(err.to_string())
    }
}

impl From<StoreError> for ScanError {
    fn from(err: StoreError) -> Self {
        ScanError::Persist(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScanStage {
    Received,
    Dispatched,
    Aggregating,
    Classified,
    Persisted,
}

impl std::fmt::Display for ScanStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScanStage::Received => "received",
            ScanStage::Dispatched => "dispatched",
            ScanStage::Aggregating => "aggregating",
            ScanStage::Classified => "classified",
            ScanStage::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// Forward-only stage log for one request.
struct StageLog<'a> {
    filename: &'a str,
    stage: ScanStage,
}

impl<'a> StageLog<'a> {
    fn start(filename: &'a str) -> Self {
        info!("scan {filename}: {}", ScanStage::Received);
        Self {
            filename,
            stage: ScanStage::Received,
        }
    }

    fn advance(&mut self, next: ScanStage) {
        debug_assert!(next > self.stage, "{} -> {next}", self.stage);
        self.stage = next;
        info!("scan {}: {next}", self.filename);
    }
}

pub struct Orchestrator {
    intake: IntakeConfig,
    risk: RiskConfig,
    signature: SignatureBridge,
    archive: ArchiveBridge,
    datastore: ForensicScanner,
    toxicity: Arc<dyn ToxicityScorer>,
    sink: Arc<dyn ScanSink>,
}

impl Orchestrator {
    pub fn from_config(
        cfg: &Config,
        runner: Arc<dyn ToolRunner>,
        toxicity: Arc<dyn ToxicityScorer>,
        sink: Arc<dyn ScanSink>,
    ) -> Result<Self, WatchlistError> {
        let watchlists = Arc::new(Watchlists::from_config(&cfg.watchlists)?);
        Ok(Self {
            intake: cfg.intake.clone(),
            risk: cfg.risk.clone(),
            signature: SignatureBridge::new(runner.clone(), &cfg.signature),
            archive: ArchiveBridge::new(runner, cfg.archive.clone()),
            datastore: ForensicScanner::new(watchlists, cfg.datastore.clone()),
            toxicity,
            sink,
        })
    }

    /// Stage a file already on disk and scan it.
    pub fn scan_path(&self, path: &Path) -> Result<ScanRecord, ScanError> {
        let artifact = Artifact::from_path(path, None, None, &self.intake)?;
        self.scan(&artifact)
    }

    /// Stage uploaded bytes and scan them; the staged copy is removed afterwards.
    pub fn scan_upload(
        &self,
        original_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<ScanRecord, ScanError> {
        let artifact = Artifact::stage_bytes(&self.intake, original_name, content_type, bytes)?;
        self.scan(&artifact)
    }

    pub fn scan(&self, artifact: &Artifact) -> Result<ScanRecord, ScanError> {
        let mut stages = StageLog::start(artifact.original_name());
        let text = artifact.read_text()?;

        stages.advance(ScanStage::Dispatched);
        let kind = artifact.kind();
        let (signature, patterns, datastore, archive, toxicity) = thread::scope(|s| {
            let signature = s.spawn(|| self.run_signature(artifact));
            let patterns = s.spawn(|| PatternSet::artifact().scan(&text));
            let datastore = match kind {
                FileKind::Datastore => Some(s.spawn(|| self.run_datastore(artifact))),
                _ => None,
            };
            let archive = match kind {
                FileKind::Archive => Some(s.spawn(|| self.run_archive(artifact))),
                _ => None,
            };
            let toxicity = s.spawn(|| self.run_toxicity(artifact));

            (
                joined("signature", signature.join()),
                patterns.join(),
                datastore.map(|h| joined("datastore", h.join())),
                archive.map(|h| joined("archive", h.join())),
                joined("toxicity", toxicity.join()),
            )
        });

        stages.advance(ScanStage::Aggregating);
        let mut degraded = Vec::new();
        let signature_matches = signature.resolve("signature", &mut degraded)?;
        let pattern_findings: IndicatorReport = patterns
            .map_err(|_| ScanError::Internal("pattern engine panicked".into()))?;
        let datastore_findings = match datastore {
            Some(outcome) => outcome.resolve("datastore", &mut degraded)?,
            None => None,
        };
        let archive_report = match archive {
            Some(outcome) => outcome.resolve("archive", &mut degraded)?,
            None => ArchiveReport::default(),
        };
        let toxicity_score = toxicity.resolve("toxicity", &mut degraded)?;

        let risk_level = risk::classify(
            &signature_matches,
            toxicity_score,
            self.risk.high_toxicity_threshold,
        );
        let scan = NewScanRecord {
            filename: artifact.original_name().to_string(),
            sha256: artifact.sha256().to_string(),
            size_bytes: artifact.len(),
            file_kind: kind,
            signature_matches,
            pattern_findings,
            datastore_findings,
            toxicity_score,
            archive_findings: Vec::new(),
            report_url: None,
            risk_level,
            degraded,
        }
        .with_archive(archive_report);
        stages.advance(ScanStage::Classified);
        info!(
            "scan {}: risk={} signatures={} indicators={} toxicity={:.2} degraded={}",
            scan.filename,
            scan.risk_level,
            scan.signature_matches.len(),
            scan.pattern_findings.total_matches(),
            scan.toxicity_score,
            scan.degraded.len()
        );

        let record = self.sink.insert(scan)?;
        stages.advance(ScanStage::Persisted);
        Ok(record)
    }

    fn run_signature(&self, artifact: &Artifact) -> EngineOutcome<Vec<String>> {
        match self.signature.scan(artifact.path()) {
            Ok(rules) => EngineOutcome::Success(rules),
            Err(err) => EngineOutcome::Fatal(err.into()),
        }
    }

    fn run_datastore(&self, artifact: &Artifact) -> EngineOutcome<Option<DatastoreReport>> {
        match self
            .datastore
            .scan_named(artifact.path(), artifact.original_name())
        {
            Ok(report) => EngineOutcome::Success(Some(report)),
            Err(err) => {
                warn!("datastore scan of {} degraded: {err}", artifact.original_name());
                EngineOutcome::degraded(None, err.to_string())
            }
        }
    }

    fn run_archive(&self, artifact: &Artifact) -> EngineOutcome<ArchiveReport> {
        match self.archive.extract(artifact.path(), artifact.original_name()) {
            Ok(report) => EngineOutcome::Success(report),
            Err(err) => {
                warn!("archive extraction of {} degraded: {err}", artifact.original_name());
                EngineOutcome::degraded(ArchiveReport::default(), err.to_string())
            }
        }
    }

    fn run_toxicity(&self, artifact: &Artifact) -> EngineOutcome<f64> {
        match self.toxicity.score(artifact) {
            Ok(score) if score.is_finite() => EngineOutcome::Success(score.clamp(0.0, 1.0)),
            Ok(score) => EngineOutcome::degraded(0.0, format!("non-finite score {score}")),
            Err(err) => {
                warn!("toxicity scoring of {} degraded: {err}", artifact.original_name());
                EngineOutcome::degraded(0.0, err.to_string())
            }
        }
    }
}

fn joined<T>(engine: &str, result: thread::Result<EngineOutcome<T>>) -> EngineOutcome<T> {
    result.unwrap_or_else(|_| {
        EngineOutcome::Fatal(ScanError::Internal(format!("{engine} engine panicked")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_serialise_with_kind_and_message() {
        let err = ScanError::from(ArtifactError::InputMissing("no file".into()));
        let value = err.to_json();
        assert_eq!(value["error"], "input_missing");
        assert_eq!(value["message"], "input missing: no file");

        let err = ScanError::Signature("exit 2".into());
        assert_eq!(err.to_json()["error"], "signature_tool_failure");
    }

    #[test]
    fn stages_are_ordered() {
        assert!(ScanStage::Received < ScanStage::Dispatched);
        assert!(ScanStage::Dispatched < ScanStage::Aggregating);
        assert!(ScanStage::Classified < ScanStage::Persisted);
        assert_eq!(ScanStage::Aggregating.to_string(), "aggregating");
    }

    #[test]
    fn panicking_engine_is_fatal() {
        let outcome: EngineOutcome<f64> = joined("toxicity", Err(Box::new("boom")));
        assert!(matches!(outcome, EngineOutcome::Fatal(ScanError::Internal(_))));
    }
}
