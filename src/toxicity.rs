//! Client for the external toxicity/ML scoring service.

use std::time::Duration;

use reqwest::blocking::{Client, multipart};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::artifact::Artifact;
use crate::config::ToxicityConfig;

const SCORE_FIELD: &str = "toxicity_percentage";

#[derive(Debug, Error)]
pub enum ToxicityError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("scoring service returned {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed scoring response: {0}")]
    Malformed(String),
}

pub trait ToxicityScorer: Send + Sync {
    /// Score in `[0, 1]`.
    fn score(&self, artifact: &Artifact) -> Result<f64, ToxicityError>;
}

/// Always scores zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledScorer;

impl ToxicityScorer for DisabledScorer {
    fn score(&self, _artifact: &Artifact) -> Result<f64, ToxicityError> {
        Ok(0.0)
    }
}

pub struct HttpToxicityScorer {
    client: Client,
    endpoint: String,
}

impl HttpToxicityScorer {
    pub fn new(cfg: &ToxicityConfig) -> Result<Self, ToxicityError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(concat!("ioctriage/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
        })
    }
}

impl ToxicityScorer for HttpToxicityScorer {
    fn score(&self, artifact: &Artifact) -> Result<f64, ToxicityError> {
        let bytes = std::fs::read(artifact.path())?;
        let part = multipart::Part::bytes(bytes)
            .file_name(artifact.original_name().to_string())
            .mime_str(artifact.content_type().unwrap_or("application/octet-stream"))?;
        let form = multipart::Form::new().part("file", part);

        let response = self.client.post(&self.endpoint).multipart(form).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToxicityError::Status(status));
        }
        let body: Value = response
            .json()
            .map_err(|err| ToxicityError::Malformed(err.to_string()))?;
        let score = score_from_body(&body)?;
        debug!("toxicity score for {}: {score:.3}", artifact.original_name());
        Ok(score)
    }
}

/// The service reports a percentage; missing means zero.
pub fn score_from_body(body: &Value) -> Result<f64, ToxicityError> {
    let raw = match body.get(SCORE_FIELD) {
        None | Some(Value::Null) => return Ok(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match raw {
        Some(pct) if pct.is_finite() => Ok(normalise_percentage(pct)),
        _ => Err(ToxicityError::Malformed(format!(
            "{SCORE_FIELD} is not a number: {}",
            body[SCORE_FIELD]
        ))),
    }
}

pub fn normalise_percentage(pct: f64) -> f64 {
    (pct / 100.0).clamp(0.0, 1.0)
}
