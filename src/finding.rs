// Finding record for proxyscan
// One detected issue plus the exchange needed to reproduce it

use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;

use crate::models::{Exchange, HttpRequest, HttpResponse};

/// Immutable record of a detected issue. Fields are set once in `new` and only read afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    timestamp: DateTime<Local>,
    analyzer_name: String,
    url: String,
    request_body: String,
    message: String,
    request: Arc<HttpRequest>,
    response: Arc<HttpResponse>,
}

impl Finding {
    /// Record a finding against `exchange`, stamped with the current time.
    /// URL and body are taken from the originating request.
    pub fn new(analyzer_name: impl Into<String>, message: impl Into<String>, exchange: &Exchange) -> Self {
        Self {
            timestamp: Local::now(),
            analyzer_name: analyzer_name.into(),
            url: exchange.request.url.clone(),
            request_body: exchange.request.body.clone(),
            message: message.into(),
            request: Arc::clone(&exchange.request),
            response: Arc::clone(&exchange.response),
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn analyzer_name(&self) -> &str {
        &self.analyzer_name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn request_body(&self) -> &str {
        &self.request_body
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }
}
