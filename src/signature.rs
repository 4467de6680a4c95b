//! Bridge to the external YARA rule matcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::SignatureConfig;
use crate::tools::{ToolError, ToolInvocation, ToolRunner, tail};

/// Exit status the matcher uses for "scanned, nothing matched". The same status
/// comes back for unreadable rules or targets, which always carry a diagnostic on
/// stderr.
const NO_MATCH_EXIT: i32 = 1;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature tool error: {0}")]
    Tool(#[from] ToolError),
    #[error("signature tool exited with {code:?}: {detail}")]
    Failed { code: Option<i32>, detail: String },
}

pub struct SignatureBridge {
    runner: Arc<dyn ToolRunner>,
    binary: PathBuf,
    rules_path: PathBuf,
    timeout: Option<Duration>,
}

impl SignatureBridge {
    pub fn new(runner: Arc<dyn ToolRunner>, cfg: &SignatureConfig) -> Self {
        Self {
            runner,
            binary: PathBuf::from(&cfg.binary),
            rules_path: cfg.rules_path.clone(),
            timeout: cfg.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Names of matching rules, distinct, in reported order.
    pub fn scan(&self, path: &Path) -> Result<Vec<String>, SignatureError> {
        let invocation = ToolInvocation::new(&self.binary)
            .arg(&self.rules_path)
            .arg(path)
            .timeout(self.timeout);
        let output = self.runner.run(&invocation)?;

        match output.code {
            Some(0) => {
                let rules = parse_rule_names(&output.stdout);
                debug!("signature scan of {} matched {} rules", path.display(), rules.len());
                Ok(rules)
            }
            Some(NO_MATCH_EXIT) if output.stderr.trim().is_empty() => Ok(Vec::new()),
            code => Err(SignatureError::Failed {
                code,
                detail: tail(
                    if output.stderr.trim().is_empty() {
                        &output.stdout
                    } else {
                        &output.stderr
                    },
                    512,
                ),
            }),
        }
    }
}

/// First token of each non-blank `<rule> <file>` line.
pub fn parse_rule_names(stdout: &str) -> Vec<String> {
    let mut rules: Vec<String> = Vec::new();
    for line in stdout.lines() {
        let Some(rule) = line.split_whitespace().next() else {
            continue;
        };
        if !rules.iter().any(|r| r == rule) {
            rules.push(rule.to_string());
        }
    }
    rules
}
