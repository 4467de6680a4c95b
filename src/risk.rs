//! Verdict rules.
//!
//! `classify` produces the persisted level and only ever answers `Low` or `High`.
//! `presentation_level` is a finer display tier that adds `Medium`; it is never stored.

use crate::ioc::{IndicatorKind, IndicatorReport};
use crate::record::{NewScanRecord, RiskLevel};

pub const PRESENTATION_HIGH_TOXICITY: f64 = 0.8;
pub const PRESENTATION_MEDIUM_TOXICITY: f64 = 0.4;

const MEDIUM_KINDS: &[IndicatorKind] = &[
    IndicatorKind::Ips,
    IndicatorKind::Urls,
    IndicatorKind::Domains,
    IndicatorKind::CharCodeObfuscation,
    IndicatorKind::LongStrings,
];

pub fn classify(signature_matches: &[String], toxicity: f64, high_toxicity_threshold: f64) -> RiskLevel {
    if !signature_matches.is_empty() || toxicity > high_toxicity_threshold {
        RiskLevel::High
    } else {
        RiskLevel::Low
    }
}

pub fn presentation_level(record: &NewScanRecord) -> RiskLevel {
    if !record.signature_matches.is_empty() || record.toxicity_score > PRESENTATION_HIGH_TOXICITY {
        return RiskLevel::High;
    }
    if record.toxicity_score > PRESENTATION_MEDIUM_TOXICITY
        || !record.archive_findings.is_empty()
        || has_medium_signal(&record.pattern_findings)
    {
        return RiskLevel::Medium;
    }
    RiskLevel::Low
}

fn has_medium_signal(report: &IndicatorReport) -> bool {
    MEDIUM_KINDS.iter().any(|kind| report.has(*kind))
        || !report.heuristics.high_entropy_strings.is_empty()
        || report.heuristics.has_alerts()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::FileKind;

    fn record(text: &str) -> NewScanRecord {
        NewScanRecord {
            filename: "a.apk".into(),
            sha256: String::new(),
            size_bytes: text.len() as u64,
            file_kind: FileKind::Other,
            signature_matches: Vec::new(),
            pattern_findings: crate::ioc::scan_text(text),
            datastore_findings: None,
            toxicity_score: 0.0,
            archive_findings: Vec::new(),
            report_url: None,
            risk_level: RiskLevel::Low,
            degraded: Vec::new(),
        }
    }

    #[test]
    fn signature_match_is_high_regardless_of_score() {
        assert_eq!(classify(&["Spy".into()], 0.0, 0.7), RiskLevel::High);
        assert_eq!(classify(&[], 0.71, 0.7), RiskLevel::High);
    }

    #[test]
    fn threshold_is_strict() {
        assert_eq!(classify(&[], 0.7, 0.7), RiskLevel::Low);
        assert_eq!(classify(&[], 0.0, 0.7), RiskLevel::Low);
    }

    #[test]
    fn pattern_findings_alone_never_raise_persisted_level() {
        let rec = record("contact evil@example.com at http://203.0.113.9/payload");
        assert!(!rec.pattern_findings.is_clean());
        assert_eq!(
            classify(&rec.signature_matches, rec.toxicity_score, 0.7),
            RiskLevel::Low
        );
    }

    #[test]
    fn presentation_tiers() {
        let mut rec = record("nothing to see here");
        assert_eq!(presentation_level(&rec), RiskLevel::Low);

        rec.toxicity_score = 0.5;
        assert_eq!(presentation_level(&rec), RiskLevel::Medium);

        rec.toxicity_score = 0.81;
        assert_eq!(presentation_level(&rec), RiskLevel::High);

        let rec = record("beacon to http://203.0.113.9/x");
        assert_eq!(presentation_level(&rec), RiskLevel::Medium);

        let mut rec = record("plain");
        rec.archive_findings.push("Accounts.html".into());
        assert_eq!(presentation_level(&rec), RiskLevel::Medium);

        let mut rec = record("plain");
        rec.signature_matches.push("Rule".into());
        assert_eq!(presentation_level(&rec), RiskLevel::High);
    }
}
