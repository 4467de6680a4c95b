//! Bridge to the ALEAPP mobile-artifact extractor.
//!
//! Each run gets a fresh output directory under `<reports_root>/aleapp`. A finished run
//! yields the report entry pages the tool rendered and, when the HTML index exists, a
//! `/reports/...` URL that always resolves inside the reports root.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ArchiveConfig;
use crate::tools::{ToolError, ToolInvocation, ToolRunner, tail};

const REPORT_DIR_PREFIX: &str = "ALEAPP_Reports";
const OUTPUT_DIR_ATTEMPTS: usize = 16;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive extraction timed out after {0:?}")]
    Timeout(Duration),
    #[error("archive extractor failed: {0}")]
    ToolFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveReport {
    /// Report pages rendered by the extractor, relative to the report's `_HTML` dir.
    pub entries: Vec<String>,
    pub report_url: Option<String>,
    #[serde(skip)]
    pub output_dir: Option<PathBuf>,
}

/// `-t` argument for the extractor, from the uploaded name.
pub fn input_type(original_name: &str) -> &'static str {
    let lowered = original_name.to_ascii_lowercase();
    if lowered.ends_with(".zip") {
        "zip"
    } else if lowered.ends_with(".tar") {
        "tar"
    } else if lowered.ends_with(".gz") || lowered.ends_with(".tgz") {
        "gz"
    } else {
        "fs"
    }
}

pub struct ArchiveBridge {
    runner: Arc<dyn ToolRunner>,
    cfg: ArchiveConfig,
}

impl ArchiveBridge {
    pub fn new(runner: Arc<dyn ToolRunner>, cfg: ArchiveConfig) -> Self {
        Self { runner, cfg }
    }

    pub fn extract(&self, path: &Path, original_name: &str) -> Result<ArchiveReport, ArchiveError> {
        let out_dir = self.fresh_output_dir()?;
        let timeout = Duration::from_secs(self.cfg.timeout_secs);
        let invocation = self.invocation(path, &out_dir, input_type(original_name), timeout);

        info!(
            "running archive extractor on {} into {}",
            original_name,
            out_dir.display()
        );
        let output = match self.runner.run(&invocation) {
            Ok(output) => output,
            Err(ToolError::Timeout { .. }) => return Err(ArchiveError::Timeout(timeout)),
            Err(err) => return Err(ArchiveError::ToolFailed(err.to_string())),
        };
        if !output.success() {
            let detail = if output.stderr.trim().is_empty() {
                &output.stdout
            } else {
                &output.stderr
            };
            return Err(ArchiveError::ToolFailed(tail(detail, 1024)));
        }

        let mut report = ArchiveReport {
            output_dir: Some(out_dir.clone()),
            ..ArchiveReport::default()
        };
        let Some(report_dir) = find_report_dir(&out_dir)? else {
            warn!("no {REPORT_DIR_PREFIX}* directory in {}", out_dir.display());
            return Ok(report);
        };
        let html_dir = report_dir.join("_HTML");
        let index = html_dir.join("index.html");
        if !index.is_file() {
            warn!("report index missing at {}", index.display());
            return Ok(report);
        }

        report.entries = report_entries(&html_dir)?;
        report.report_url = report_url(&self.cfg.reports_root, &index);
        debug!("archive report url: {:?}", report.report_url);
        Ok(report)
    }

    fn invocation(
        &self,
        artifact: &Path,
        out_dir: &Path,
        input_type: &str,
        timeout: Duration,
    ) -> ToolInvocation {
        let mut inv = ToolInvocation::new(&self.cfg.python)
            .arg(&self.cfg.script)
            .arg("-i")
            .arg(artifact)
            .arg("-o")
            .arg(out_dir)
            .arg("-t")
            .arg(input_type)
            .timeout(Some(timeout));

        if let Some(bin_dir) = self.cfg.python.parent().filter(|p| !p.as_os_str().is_empty()) {
            let mut path_var = OsString::from(bin_dir);
            if let Some(existing) = std::env::var_os("PATH") {
                path_var.push(if cfg!(windows) { ";" } else { ":" });
                path_var.push(existing);
            }
            inv = inv.env("PATH", path_var);
        }
        if let Some(script_dir) = self.cfg.script.parent() {
            inv = inv.env("PYTHONPATH", script_dir);
        }
        inv
    }

    fn fresh_output_dir(&self) -> Result<PathBuf, ArchiveError> {
        let base = self.cfg.reports_root.join("aleapp");
        std::fs::create_dir_all(&base)?;
        for _ in 0..OUTPUT_DIR_ATTEMPTS {
            let candidate = base.join(format!("aleapp-{}", random_suffix()));
            match std::fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(ArchiveError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "could not allocate a unique extractor output directory",
        )))
    }
}

fn random_suffix() -> String {
    hex::encode(rand::random::<[u8; 3]>())
}

fn find_report_dir(out_dir: &Path) -> Result<Option<PathBuf>, ArchiveError> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(out_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir()
            && entry.file_name().to_string_lossy().starts_with(REPORT_DIR_PREFIX)
        {
            candidates.push(entry.path());
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

fn report_entries(html_dir: &Path) -> Result<Vec<String>, ArchiveError> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(html_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_file() && name.ends_with(".html") && name != "index.html" {
            entries.push(name);
        }
    }
    entries.sort();
    Ok(entries)
}

/// `/reports/<relative>` for `target`, or `None` when it does not resolve under `root`.
pub fn report_url(root: &Path, target: &Path) -> Option<String> {
    let root = match root.canonicalize() {
        Ok(root) => root,
        Err(err) => {
            warn!("reports root {} unavailable: {err}", root.display());
            return None;
        }
    };
    let target = match target.canonicalize() {
        Ok(target) => target,
        Err(err) => {
            warn!("report entry {} unavailable: {err}", target.display());
            return None;
        }
    };
    let Ok(relative) = target.strip_prefix(&root) else {
        warn!("report {} escapes reports root", target.display());
        return None;
    };

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!("/reports/{}", parts.join("/")))
}
