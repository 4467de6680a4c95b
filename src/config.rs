use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Deserialize, Clone)]
pub struct IntakeConfig {
    pub upload_dir: PathBuf,
    pub datastore_extensions: Vec<String>,
    pub archive_extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignatureConfig {
    pub binary: String,
    pub rules_path: PathBuf,
    /// Optional deadline for the rule matcher; unset means wait for completion.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    pub python: PathBuf,
    pub script: PathBuf,
    pub reports_root: PathBuf,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ToxicityConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatastoreConfig {
    pub row_limit: u64,
    pub batch_size: u64,
    pub value_cap: usize,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            row_limit: 5000,
            batch_size: 1000,
            value_cap: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RiskConfig {
    pub high_toxicity_threshold: f64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WatchlistConfig {
    pub suspicious_domains: Vec<String>,
    pub suspicious_keywords: Vec<String>,
    pub suspicious_filenames: Vec<String>,
    pub suspicious_package_patterns: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub run_id: String,
    pub intake: IntakeConfig,
    pub signature: SignatureConfig,
    pub archive: ArchiveConfig,
    pub toxicity: ToxicityConfig,
    pub datastore: DatastoreConfig,
    pub risk: RiskConfig,
    pub watchlists: WatchlistConfig,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub config_hash: String,
}

const EMBEDDED: &[u8] = include_bytes!("../config/default.yml");

/// Reads `path` (or the embedded defaults) and hashes the exact bytes so runs can be
/// tied back to the configuration that produced them.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let bytes = match path {
        Some(p) => std::fs::read(p).with_context(|| format!("reading config {}", p.display()))?,
        None => EMBEDDED.to_vec(),
    };

    let mut config: Config = serde_yaml::from_slice(&bytes).context("parsing config yaml")?;
    validate(&config)?;
    if config.run_id.trim().is_empty() {
        config.run_id = generate_run_id();
    }

    Ok(LoadedConfig {
        config,
        config_hash: hex::encode(Sha256::digest(&bytes)),
    })
}

fn validate(cfg: &Config) -> Result<()> {
    let threshold = cfg.risk.high_toxicity_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        bail!("risk.high_toxicity_threshold must be within [0, 1], got {threshold}");
    }
    if cfg.datastore.batch_size == 0 {
        bail!("datastore.batch_size must be positive");
    }
    if cfg.archive.timeout_secs == 0 {
        bail!("archive.timeout_secs must be positive");
    }
    Ok(())
}

fn generate_run_id() -> String {
    let now = chrono::Utc::now();
    format!("{}_{}", now.format("%Y%m%dT%H%M%SZ"), hex::encode(rand::random::<[u8; 4]>()))
}
