//! Derived signals computed after direct matching: high-entropy strings and
//! co-occurrence alerts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{IndicatorKind, IndicatorMap, ValueSet};

/// Reported when the combination pass ran and no rule fired.
pub const NO_SUSPICIOUS_COMBINATION: &str = "No suspicious combinations detected";

pub const ENTROPY_THRESHOLD: f64 = 4.5;
pub const ENTROPY_MIN_LEN: usize = 20;

static ENTROPY_CANDIDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9+/=]{20,}").expect("entropy candidate pattern"));

/// Fires when at least one kind from each side is present.
#[derive(Debug, Clone, Copy)]
pub struct CombinationRule {
    pub any_of: &'static [IndicatorKind],
    pub with_any_of: &'static [IndicatorKind],
    pub alert: &'static str,
}

pub const COMBINATION_RULES: &[CombinationRule] = &[
    CombinationRule {
        any_of: &[IndicatorKind::Urls],
        with_any_of: &[IndicatorKind::ScriptDroppers],
        alert: "URLs combined with script dropper patterns detected",
    },
    CombinationRule {
        any_of: &[IndicatorKind::ObfuscatedCode, IndicatorKind::CharCodeObfuscation],
        with_any_of: &[IndicatorKind::SuspiciousFunctions],
        alert: "Obfuscation combined with dangerous functions detected",
    },
    CombinationRule {
        any_of: &[IndicatorKind::RatKeywords],
        with_any_of: &[IndicatorKind::Urls, IndicatorKind::Ips, IndicatorKind::Domains],
        alert: "RAT indicators combined with network IOCs detected",
    },
];

impl CombinationRule {
    fn fires(&self, indicators: &IndicatorMap) -> bool {
        let present = |kinds: &[IndicatorKind]| kinds.iter().any(|k| indicators.contains_key(k));
        present(self.any_of) && present(self.with_any_of)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heuristics {
    pub high_entropy_strings: Vec<String>,
    pub suspicious_combinations: Vec<String>,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            high_entropy_strings: Vec::new(),
            suspicious_combinations: vec![NO_SUSPICIOUS_COMBINATION.to_string()],
        }
    }
}

impl Heuristics {
    pub fn evaluate(text: &str, indicators: &IndicatorMap) -> Self {
        Self {
            high_entropy_strings: high_entropy_strings(text),
            suspicious_combinations: suspicious_combinations(indicators),
        }
    }

    /// True when at least one co-occurrence rule fired.
    pub fn has_alerts(&self) -> bool {
        self.suspicious_combinations
            .iter()
            .any(|alert| alert != NO_SUSPICIOUS_COMBINATION)
    }
}

/// Shannon entropy in bits per symbol over the byte distribution.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; 256];
    for &byte in data {
        counts[byte as usize] += 1;
    }

    let len = data.len() as f64;
    let mut entropy = 0.0;
    for &count in &counts {
        if count > 0 {
            let p = count as f64 / len;
            entropy -= p * p.log2();
        }
    }

    entropy
}

pub fn is_high_entropy(candidate: &str) -> bool {
    candidate.len() >= ENTROPY_MIN_LEN && shannon_entropy(candidate.as_bytes()) > ENTROPY_THRESHOLD
}

/// Base64-alphabet runs of at least 20 characters above the entropy threshold.
pub fn high_entropy_strings(text: &str) -> Vec<String> {
    let mut out = ValueSet::default();
    for m in ENTROPY_CANDIDATE.find_iter(text) {
        if is_high_entropy(m.as_str()) {
            out.insert(m.as_str());
        }
    }
    out.into_values()
}

pub fn suspicious_combinations(indicators: &IndicatorMap) -> Vec<String> {
    let alerts: Vec<String> = COMBINATION_RULES
        .iter()
        .filter(|rule| rule.fires(indicators))
        .map(|rule| rule.alert.to_string())
        .collect();
    if alerts.is_empty() {
        vec![NO_SUSPICIOUS_COMBINATION.to_string()]
    } else {
        alerts
    }
}
