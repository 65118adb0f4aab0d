// Out-of-band replay transport for proxyscan
// Uses reqwest and tokio to fire verification requests without blocking dispatch

use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::{ReplayError, ScanError};
use crate::models::Method;

/// What a replay probe needs back from the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayResponse {
    pub status: u16,
    pub body: String,
}

/// Issues a new, independent HTTP request
#[async_trait]
pub trait ReplayClient: Send + Sync {
    async fn send(&self, method: Method, url: &str) -> Result<ReplayResponse, ReplayError>;
}

/// Default per-request timeout for replays
pub const DEFAULT_REPLAY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpReplayClient {
    client: Client,
}

impl HttpReplayClient {
    /// Redirects are never followed: the 2xx gate must see the replay's own status.
    pub fn new(timeout: Duration) -> Result<Self, ScanError> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

fn to_reqwest_method(method: &Method) -> Result<reqwest::Method, ReplayError> {
    reqwest::Method::from_bytes(method.to_string().as_bytes())
        .map_err(|e| ReplayError::InvalidUrl(format!("bad method {}: {}", method, e)))
}

#[async_trait]
impl ReplayClient for HttpReplayClient {
    async fn send(&self, method: Method, url: &str) -> Result<ReplayResponse, ReplayError> {
        let resp = self
            .client
            .request(to_reqwest_method(&method)?, url)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(ReplayResponse { status, body })
    }
}

/// Counts replay tasks still in flight so a host can drain them before exporting.
/// Draining is optional; nothing is ever cancelled.
#[derive(Debug, Default)]
pub struct ReplayTracker {
    pending: AtomicUsize,
    idle: Notify,
}

impl ReplayTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark one replay as started. The returned guard settles it on drop, panics included.
    pub fn start(self: &Arc<Self>) -> ReplayGuard {
        self.pending.fetch_add(1, Ordering::SeqCst);
        ReplayGuard {
            tracker: Arc::clone(self),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Resolve once no replay is in flight
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a completion in between is not missed
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

pub struct ReplayGuard {
    tracker: Arc<ReplayTracker>,
}

impl Drop for ReplayGuard {
    fn drop(&mut self) {
        if self.tracker.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}
