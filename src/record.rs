use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::ArchiveReport;
use crate::artifact::FileKind;
use crate::datastore::DatastoreReport;
use crate::ioc::IndicatorReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An engine whose contribution was replaced by a neutral value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineNote {
    pub engine: String,
    pub reason: String,
}

/// A classified scan, before the sink assigns identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScanRecord {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub file_kind: FileKind,
    pub signature_matches: Vec<String>,
    pub pattern_findings: IndicatorReport,
    pub datastore_findings: Option<DatastoreReport>,
    pub toxicity_score: f64,
    pub archive_findings: Vec<String>,
    pub report_url: Option<String>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub degraded: Vec<EngineNote>,
}

impl NewScanRecord {
    pub fn with_archive(mut self, report: ArchiveReport) -> Self {
        self.archive_findings = report.entries;
        self.report_url = report.report_url;
        self
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub scan: NewScanRecord,
}

impl ScanRecord {
    pub fn assign(id: i64, created_at: DateTime<Utc>, scan: NewScanRecord) -> Self {
        Self {
            id,
            created_at,
            scan,
        }
    }
}

impl std::ops::Deref for ScanRecord {
    type Target = NewScanRecord;

    fn deref(&self) -> &Self::Target {
        &self.scan
    }
}
