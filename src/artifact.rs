use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::IntakeConfig;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("input missing: {0}")]
    InputMissing(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Datastore,
    Archive,
    Other,
}

impl FileKind {
    /// Classify by the original name's extension, matched case-insensitively.
    pub fn detect(name: &str, intake: &IntakeConfig) -> Self {
        let lowered = name.to_ascii_lowercase();
        let ends_with_any = |exts: &[String]| {
            exts.iter()
                .any(|ext| lowered.ends_with(&ext.to_ascii_lowercase()))
        };
        if ends_with_any(&intake.datastore_extensions) {
            FileKind::Datastore
        } else if ends_with_any(&intake.archive_extensions) {
            FileKind::Archive
        } else {
            FileKind::Other
        }
    }
}

/// A staged artifact. Staged uploads are removed when the artifact is dropped.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    original_name: String,
    content_type: Option<String>,
    kind: FileKind,
    len: u64,
    sha256: String,
    _staged: Option<NamedTempFile>,
}

impl Artifact {
    /// Use a file already on disk.
    pub fn from_path(
        path: &Path,
        original_name: Option<&str>,
        content_type: Option<&str>,
        intake: &IntakeConfig,
    ) -> Result<Self, ArtifactError> {
        if !path.is_file() {
            return Err(ArtifactError::InputMissing(path.display().to_string()));
        }
        let name = match original_name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let (len, sha256) = digest_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            kind: FileKind::detect(&name, intake),
            original_name: name,
            content_type: content_type.map(str::to_string),
            len,
            sha256,
            _staged: None,
        })
    }

    /// Write uploaded bytes into `intake.upload_dir` and stage them for one scan.
    pub fn stage_bytes(
        intake: &IntakeConfig,
        original_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<Self, ArtifactError> {
        std::fs::create_dir_all(&intake.upload_dir)?;
        let suffix = staged_suffix(original_name);
        let mut staged = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&intake.upload_dir)?;
        staged.write_all(bytes)?;
        staged.flush()?;

        Ok(Self {
            path: staged.path().to_path_buf(),
            original_name: original_name.to_string(),
            content_type: content_type.map(str::to_string),
            kind: FileKind::detect(original_name, intake),
            len: bytes.len() as u64,
            sha256: hex::encode(Sha256::digest(bytes)),
            _staged: Some(staged),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Full contents as lossy UTF-8.
    pub fn read_text(&self) -> Result<String, ArtifactError> {
        let bytes = std::fs::read(&self.path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn digest_file(path: &Path) -> Result<(u64, String), ArtifactError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut len = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        len += n as u64;
    }
    Ok((len, hex::encode(hasher.finalize())))
}

// Keep the extension so external tools that sniff by name still see it.
fn staged_suffix(original_name: &str) -> String {
    let base = Path::new(original_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lowered = base.to_ascii_lowercase();
    if lowered.ends_with(".tar.gz") {
        return ".tar.gz".to_string();
    }
    match base.rfind('.') {
        Some(idx) if idx > 0 => base[idx..]
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
            .collect(),
        _ => String::new(),
    }
}
