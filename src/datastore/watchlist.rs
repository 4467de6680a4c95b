//! Curated watchlists used by the datastore heuristics.
//!
//! Loaded once from configuration and shared read-only across concurrent scans.

use regex::Regex;
use thiserror::Error;

use crate::config::WatchlistConfig;

#[derive(Debug, Error)]
pub enum WatchlistError {
    #[error("invalid package pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Default)]
pub struct Watchlists {
    domains: Vec<String>,
    keywords: Vec<String>,
    filenames: Vec<String>,
    package_patterns: Vec<Regex>,
}

impl Watchlists {
    pub fn from_config(cfg: &WatchlistConfig) -> Result<Self, WatchlistError> {
        let mut package_patterns = Vec::with_capacity(cfg.suspicious_package_patterns.len());
        for pattern in &cfg.suspicious_package_patterns {
            let regex = Regex::new(pattern).map_err(|source| WatchlistError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            package_patterns.push(regex);
        }
        Ok(Self {
            domains: lowered(&cfg.suspicious_domains),
            keywords: lowered(&cfg.suspicious_keywords),
            filenames: lowered(&cfg.suspicious_filenames),
            package_patterns,
        })
    }

    /// Every listed domain contained in already-lowercased text.
    pub fn domains_in<'a>(&'a self, lowered_text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.domains
            .iter()
            .filter(move |d| lowered_text.contains(d.as_str()))
            .map(String::as_str)
    }

    /// Every listed keyword contained in already-lowercased text.
    pub fn keywords_in<'a>(&'a self, lowered_text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.keywords
            .iter()
            .filter(move |k| lowered_text.contains(k.as_str()))
            .map(String::as_str)
    }

    pub fn is_suspicious_filename(&self, filename: &str) -> bool {
        let lowered = filename.to_lowercase();
        self.filenames.iter().any(|f| lowered.contains(f.as_str()))
    }

    pub fn is_suspicious_package(&self, text: &str) -> bool {
        self.package_patterns.iter().any(|re| re.is_match(text))
    }
}

fn lowered(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
