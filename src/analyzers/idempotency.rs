// POST-to-GET Downgrade Checker
//
// Finds form endpoints that accept the same parameters over GET as over POST.
// A GET that succeeds where only POST was intended can sidestep CSRF defenses and
// lands state-changing parameters in logs and caches.
//
// Flow per triggering exchange:
//   Idle -> ReplayScheduled -> (ReplaySucceeded: append finding | ReplayFailed: nothing)
//
// The replay runs as its own tokio task. `analyze` returns as soon as it is spawned.

use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::Analyzer;
use crate::error::AnalyzerError;
use crate::finding::Finding;
use crate::finding_log::FindingLog;
use crate::models::{Exchange, Method};
use crate::replay::{ReplayClient, ReplayTracker};

pub const GET_CHECKER_NAME: &str = "GET Checker";

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// How the POST body is glued onto the URL for the GET probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlJoin {
    /// `url + "?" + body`, even when `url` already has a query string
    #[default]
    Literal,
    /// Uses `&` instead of `?` when `url` already has a query string
    Strict,
}

/// Build the candidate GET URL. The body is assumed to be URL-encoded already.
pub fn build_get_url(url: &str, body: &str, join: UrlJoin) -> String {
    let separator = match join {
        UrlJoin::Strict if url.contains('?') => '&',
        _ => '?',
    };
    format!("{}{}{}", url, separator, body)
}

/// True for a POST carrying exactly `Content-Type: application/x-www-form-urlencoded`.
/// Name and value are compared case-sensitively.
pub fn is_candidate(exchange: &Exchange) -> bool {
    let request = &exchange.request;
    request.method == Method::POST && request.has_header_exact("Content-Type", FORM_CONTENT_TYPE)
}

pub struct IdempotencyAnalyzer {
    client: Arc<dyn ReplayClient>,
    runtime: Handle,
    join: UrlJoin,
    limiter: Option<Arc<Semaphore>>,
    tracker: Arc<ReplayTracker>,
}

impl IdempotencyAnalyzer {
    /// Replays are spawned on `runtime`, so `analyze` can be called from any thread.
    pub fn new(client: Arc<dyn ReplayClient>, runtime: Handle) -> Self {
        Self {
            client,
            runtime,
            join: UrlJoin::Literal,
            limiter: None,
            tracker: ReplayTracker::new(),
        }
    }

    /// Spawn on the runtime of the calling context
    pub fn on_current_runtime(client: Arc<dyn ReplayClient>) -> Result<Self, AnalyzerError> {
        let runtime = Handle::try_current().map_err(|_| AnalyzerError::NoRuntime)?;
        Ok(Self::new(client, runtime))
    }

    pub fn with_url_join(mut self, join: UrlJoin) -> Self {
        self.join = join;
        self
    }

    /// Cap concurrent replays. Permits are taken inside the task, so scheduling never waits.
    /// `max` is clamped to `1..=Semaphore::MAX_PERMITS`.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        let max = max.clamp(1, Semaphore::MAX_PERMITS);
        self.limiter = Some(Arc::new(Semaphore::new(max)));
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<ReplayTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn tracker(&self) -> Arc<ReplayTracker> {
        Arc::clone(&self.tracker)
    }

    fn schedule_replay(&self, exchange: &Exchange, get_url: String, log: &Arc<FindingLog>) {
        let client = Arc::clone(&self.client);
        let limiter = self.limiter.clone();
        let exchange = exchange.clone();
        let log = Arc::clone(log);
        let guard = self.tracker.start();

        self.runtime.spawn(async move {
            let _guard = guard;
            let _permit = match limiter {
                Some(sem) => match sem.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };

            let replay = match client.send(Method::GET, &get_url).await {
                Ok(replay) => replay,
                Err(e) => {
                    debug!("Replay of {} failed: {}", get_url, e);
                    return;
                }
            };

            if !(200..300).contains(&replay.status) {
                debug!("Replay of {} rejected with HTTP {}", get_url, replay.status);
                return;
            }

            let message = format!(
                "POST request to {} returned HTTP {}, GET request to {} returned {}",
                exchange.request.url, exchange.response.status, get_url, replay.status
            );
            info!("ISSUE DETECTED: {}", message);
            log.append(Finding::new(GET_CHECKER_NAME, message, &exchange));
        });
    }
}

impl Analyzer for IdempotencyAnalyzer {
    fn name(&self) -> &str {
        GET_CHECKER_NAME
    }

    fn analyze(&self, exchange: &Exchange, log: &Arc<FindingLog>) -> Result<(), AnalyzerError> {
        if !is_candidate(exchange) {
            return Ok(());
        }

        info!("Candidate POST request found: {}", exchange.request.url);
        let get_url = build_get_url(&exchange.request.url, &exchange.request.body, self.join);
        self.schedule_replay(exchange, get_url, log);
        Ok(())
    }
}
