// Scan configuration for proxyscan
// Loaded from an optional JSON file, then overridden by CLI flags

use serde::Deserialize;
use std::path::Path;
use tokio::sync::Semaphore;

use crate::analyzers::{UrlJoin, CPF_PATTERN, PII_SCANNER_NAME};
use crate::error::ScanError;
use crate::replay::DEFAULT_REPLAY_TIMEOUT;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    pub enabled: bool,
    /// Join with `&` when the URL already has a query string
    pub strict_url_join: bool,
    /// Upper bound on concurrent replays; unbounded when absent
    pub max_in_flight: Option<usize>,
    pub replay_timeout_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict_url_join: false,
            max_in_flight: None,
            replay_timeout_secs: DEFAULT_REPLAY_TIMEOUT.as_secs(),
        }
    }
}

impl IdempotencyConfig {
    pub fn url_join(&self) -> UrlJoin {
        if self.strict_url_join {
            UrlJoin::Strict
        } else {
            UrlJoin::Literal
        }
    }
}

/// One regex-backed scanner
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PatternConfig {
    pub name: String,
    pub label: String,
    pub regex: String,
}

impl PatternConfig {
    pub fn cpf() -> Self {
        Self {
            name: PII_SCANNER_NAME.to_string(),
            label: "CPF".to_string(),
            regex: CPF_PATTERN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub idempotency: IdempotencyConfig,
    pub pii_enabled: bool,
    pub patterns: Vec<PatternConfig>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            idempotency: IdempotencyConfig::default(),
            pii_enabled: true,
            patterns: vec![PatternConfig::cpf()],
        }
    }
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, ScanError> {
        let config: ScanConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if self.idempotency.max_in_flight == Some(0) {
            return Err(ScanError::Config("max_in_flight must be at least 1".to_string()));
        }
        if let Some(max) = self.idempotency.max_in_flight.filter(|max| *max > Semaphore::MAX_PERMITS) {
            return Err(ScanError::Config(format!(
                "max_in_flight {} exceeds the limit of {}",
                max,
                Semaphore::MAX_PERMITS
            )));
        }
        if self.idempotency.replay_timeout_secs == 0 {
            return Err(ScanError::Config("replay_timeout_secs must be at least 1".to_string()));
        }
        if let Some(p) = self.patterns.iter().find(|p| p.name.trim().is_empty()) {
            return Err(ScanError::Config(format!("pattern `{}` has an empty name", p.regex)));
        }
        Ok(())
    }
}
