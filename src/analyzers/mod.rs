// Passive Analyzers
//
// Each analyzer looks at one completed exchange and may append findings to the shared log.
//
// - pattern: synchronous regex scan of response bodies (PII such as CPF numbers)
// - idempotency: POST endpoints that also accept the same parameters over GET,
//   verified by an asynchronous replay
//
// Analyzers never talk to each other. The log is the only shared state.

pub mod idempotency;
pub mod pattern;

pub use idempotency::*;
pub use pattern::*;

use std::sync::Arc;

use crate::error::AnalyzerError;
use crate::finding_log::FindingLog;
use crate::models::Exchange;

/// Capability every analyzer provides to the pipeline
pub trait Analyzer: Send + Sync {
    /// Name recorded on every finding this analyzer produces
    fn name(&self) -> &str;

    /// Inspect one exchange. Must return promptly: network work is spawned, not awaited.
    fn analyze(&self, exchange: &Exchange, log: &Arc<FindingLog>) -> Result<(), AnalyzerError>;
}
