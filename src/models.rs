// Core data models and traits for proxyscan
// Read-only request/response views delivered by the host for each completed exchange

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::ScanError;

/// HTTP methods seen on intercepted traffic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    OPTIONS,
    HEAD,
    /// Anything else, kept verbatim (including lowercase spellings of the above)
    Other(String),
}

impl Method {
    /// Parse a method token exactly as it appeared on the wire.
    /// Matching is case-sensitive: "post" is not POST.
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "PATCH" => Method::PATCH,
            "OPTIONS" => Method::OPTIONS,
            "HEAD" => Method::HEAD,
            other => Method::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::GET => write!(f, "GET"),
            Method::POST => write!(f, "POST"),
            Method::PUT => write!(f, "PUT"),
            Method::DELETE => write!(f, "DELETE"),
            Method::PATCH => write!(f, "PATCH"),
            Method::OPTIONS => write!(f, "OPTIONS"),
            Method::HEAD => write!(f, "HEAD"),
            Method::Other(token) => write!(f, "{}", token),
        }
    }
}

/// A single header line, order preserved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Case-insensitive lookup, first match wins
fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Snapshot of an intercepted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<Header>,
    pub body: String,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// True when a header with exactly this name (case-sensitive) carries exactly this value
    pub fn has_header_exact(&self, name: &str, value: &str) -> bool {
        self.headers.iter().any(|h| h.name == name && h.value == value)
    }
}

/// Snapshot of the response to an intercepted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<Header>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A completed request paired with its response.
/// Both halves sit behind `Arc` so findings and replay tasks can keep them without copying.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request: Arc<HttpRequest>,
    pub response: Arc<HttpResponse>,
}

impl Exchange {
    pub fn new(request: HttpRequest, response: HttpResponse) -> Self {
        Self {
            request: Arc::new(request),
            response: Arc::new(response),
        }
    }
}

/// Trait for loading captured exchanges (HAR files, etc.)
pub trait ExchangeSource {
    /// Load every exchange found at `path`, in capture order
    fn load(&self, path: &str) -> Result<Vec<Exchange>, ScanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_is_case_sensitive() {
        assert_eq!(Method::parse("POST"), Method::POST);
        assert_eq!(Method::parse("post"), Method::Other("post".to_string()));
        assert_eq!(Method::parse("PROPFIND").to_string(), "PROPFIND");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest::new(Method::GET, "http://localhost/")
            .with_header("content-type", "text/html");
        assert_eq!(req.header("Content-Type"), Some("text/html"));
        assert!(!req.has_header_exact("Content-Type", "text/html"));
        assert!(req.has_header_exact("content-type", "text/html"));
    }
}
