// Response Body Pattern Scanner
//
// Flags sensitive data leaking in response bodies. One compiled regex per instance;
// the stock instance looks for Brazilian CPF numbers (XXX.XXX.XXX-XX).
//
// Every non-overlapping match becomes its own finding, attributed to the request that
// produced the response.

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::info;

use super::Analyzer;
use crate::error::{AnalyzerError, ScanError};
use crate::finding::Finding;
use crate::finding_log::FindingLog;
use crate::models::Exchange;

pub const PII_SCANNER_NAME: &str = "PII Scanner";

pub const CPF_PATTERN: &str = r"\b\d{3}\.\d{3}\.\d{3}-\d{2}\b";

lazy_static! {
    static ref CPF_REGEX: Regex = Regex::new(CPF_PATTERN).unwrap();
}

pub struct PatternAnalyzer {
    name: String,
    label: String,
    regex: Regex,
}

impl PatternAnalyzer {
    /// Compile a custom pattern. `label` is what the finding message calls the match.
    pub fn new(name: impl Into<String>, label: impl Into<String>, pattern: &str) -> Result<Self, ScanError> {
        let name = name.into();
        let regex = Regex::new(pattern).map_err(|source| ScanError::Pattern {
            name: name.clone(),
            source,
        })?;
        Ok(Self {
            name,
            label: label.into(),
            regex,
        })
    }

    /// The stock CPF scanner
    pub fn cpf() -> Self {
        Self {
            name: PII_SCANNER_NAME.to_string(),
            label: "CPF".to_string(),
            regex: CPF_REGEX.clone(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// All non-overlapping matches in `body`, left to right
    pub fn find_matches<'a>(&self, body: &'a str) -> Vec<&'a str> {
        self.regex.find_iter(body).map(|m| m.as_str()).collect()
    }
}

impl Analyzer for PatternAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn analyze(&self, exchange: &Exchange, log: &Arc<FindingLog>) -> Result<(), AnalyzerError> {
        for matched in self.find_matches(&exchange.response.body) {
            let message = format!("{} found in response body {}", self.label, matched);
            info!("ISSUE DETECTED: {}", message);
            log.append(Finding::new(&self.name, message, exchange));
        }
        Ok(())
    }
}
