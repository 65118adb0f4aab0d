// Analysis pipeline for proxyscan
// Owns the findings log and fans each completed exchange out to the registered analyzers

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::analyzers::{Analyzer, IdempotencyAnalyzer, PatternAnalyzer};
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::finding_log::FindingLog;
use crate::models::{Exchange, HttpRequest, HttpResponse};
use crate::replay::{HttpReplayClient, ReplayClient, ReplayTracker};

pub struct Pipeline {
    log: Arc<FindingLog>,
    analyzers: Vec<Box<dyn Analyzer>>,
    replays: Arc<ReplayTracker>,
}

impl Pipeline {
    /// Empty pipeline writing into `log`
    pub fn new(log: Arc<FindingLog>) -> Self {
        Self {
            log,
            analyzers: Vec::new(),
            replays: ReplayTracker::new(),
        }
    }

    /// Register the built-in analyzers enabled by `config`, replaying over HTTP.
    pub fn from_config(config: &ScanConfig, log: Arc<FindingLog>, runtime: Handle) -> Result<Self, ScanError> {
        let timeout = Duration::from_secs(config.idempotency.replay_timeout_secs);
        let client: Arc<dyn ReplayClient> = Arc::new(HttpReplayClient::new(timeout)?);
        Self::from_config_with_client(config, log, runtime, client)
    }

    /// Same as `from_config` with a caller-supplied replay transport
    pub fn from_config_with_client(
        config: &ScanConfig,
        log: Arc<FindingLog>,
        runtime: Handle,
        client: Arc<dyn ReplayClient>,
    ) -> Result<Self, ScanError> {
        config.validate()?;
        let mut pipeline = Self::new(log);

        if config.idempotency.enabled {
            let mut checker = IdempotencyAnalyzer::new(client, runtime)
                .with_url_join(config.idempotency.url_join())
                .with_tracker(Arc::clone(&pipeline.replays));
            if let Some(max) = config.idempotency.max_in_flight {
                checker = checker.with_max_in_flight(max);
            }
            pipeline.register(checker);
        }

        if config.pii_enabled {
            for pattern in &config.patterns {
                pipeline.register(PatternAnalyzer::new(&pattern.name, &pattern.label, &pattern.regex)?);
            }
        }

        Ok(pipeline)
    }

    /// Append an analyzer; dispatch follows registration order
    pub fn register<A: Analyzer + 'static>(&mut self, analyzer: A) -> &mut Self {
        self.analyzers.push(Box::new(analyzer));
        self
    }

    pub fn log(&self) -> &Arc<FindingLog> {
        &self.log
    }

    pub fn analyzer_names(&self) -> Vec<&str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    /// Tracker shared by the built-in replay analyzers
    pub fn replays(&self) -> Arc<ReplayTracker> {
        Arc::clone(&self.replays)
    }

    /// Deliver one completed exchange. Called exactly once per exchange, from any thread.
    pub fn on_exchange(&self, request: HttpRequest, response: HttpResponse) {
        self.dispatch(&Exchange::new(request, response));
    }

    /// Run every analyzer on `exchange`. A failing or panicking analyzer is logged and skipped.
    pub fn dispatch(&self, exchange: &Exchange) {
        for analyzer in &self.analyzers {
            let outcome = catch_unwind(AssertUnwindSafe(|| analyzer.analyze(exchange, &self.log)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Analyzer {} failed on {}: {}", analyzer.name(), exchange.request.url, e),
                Err(_) => warn!("Analyzer {} panicked on {}", analyzer.name(), exchange.request.url),
            }
        }
        debug!("Dispatched {} to {} analyzers", exchange.request.url, self.analyzers.len());
    }
}
