use crate::record::EngineNote;

use super::ScanError;

/// What one engine contributed to a scan.
#[derive(Debug)]
pub enum EngineOutcome<T> {
    Success(T),
    /// The engine failed and `value` is the neutral stand-in.
    Degraded { value: T, reason: String },
    Fatal(ScanError),
}

impl<T> EngineOutcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        EngineOutcome::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, EngineOutcome::Degraded { .. })
    }

    /// Unwrap the contribution, noting a degradation under `engine`.
    pub fn resolve(self, engine: &str, notes: &mut Vec<EngineNote>) -> Result<T, ScanError> {
        match self {
            EngineOutcome::Success(value) => Ok(value),
            EngineOutcome::Degraded { value, reason } => {
                notes.push(EngineNote {
                    engine: engine.to_string(),
                    reason,
                });
                Ok(value)
            }
            EngineOutcome::Fatal(err) => Err(err),
        }
    }
}
