// Error types for proxyscan
// Only FindingLogError is meant to reach the presentation layer; the rest stay inside
// analyzers or surface at startup through the CLI.

use thiserror::Error;

/// Errors raised by the findings log
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FindingLogError {
    #[error("finding index {index} out of range (log holds {count})")]
    OutOfRange { index: usize, count: usize },
}

/// Internal analyzer faults. Logged and swallowed by the pipeline.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("no tokio runtime available to schedule replay")]
    NoRuntime,

    #[error("{0}")]
    Other(String),
}

/// Failures of an out-of-band replay request
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("invalid replay URL: {0}")]
    InvalidUrl(String),

    #[error("replay timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ReplayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ReplayError::Timeout
        } else if e.is_builder() {
            ReplayError::InvalidUrl(e.to_string())
        } else {
            ReplayError::Transport(e.to_string())
        }
    }
}

/// Errors from the outer surfaces: capture loading, configuration, reporting
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern `{name}`: {source}")]
    Pattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported input: {0}")]
    Unsupported(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
