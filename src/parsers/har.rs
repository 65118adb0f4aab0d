// HAR capture loader for proxyscan
// Uses serde_json to walk HAR 1.2 exports and walkdir for directories of captures

use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::models::{Exchange, ExchangeSource, Header, HttpRequest, HttpResponse, Method};

pub struct HarSource;

impl ExchangeSource for HarSource {
    fn load(&self, path: &str) -> Result<Vec<Exchange>, ScanError> {
        let root = Path::new(path);
        if !root.is_dir() {
            return parse_har_file(root);
        }

        let mut files: Vec<_> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "har"))
            .map(|e| e.into_path())
            .collect();
        files.sort();

        let mut exchanges = Vec::new();
        for file in files {
            exchanges.extend(parse_har_file(&file)?);
        }
        Ok(exchanges)
    }
}

fn parse_har_file(path: &Path) -> Result<Vec<Exchange>, ScanError> {
    let data = std::fs::read_to_string(path)?;
    parse_har(&data)
}

/// Parse HAR JSON text. Entries without a usable request or response are skipped.
pub fn parse_har(data: &str) -> Result<Vec<Exchange>, ScanError> {
    let json: Value = serde_json::from_str(data)?;
    let entries = json
        .get("log")
        .and_then(|log| log.get("entries"))
        .and_then(|entries| entries.as_array())
        .ok_or_else(|| ScanError::Unsupported("HAR file has no log.entries array".to_string()))?;

    Ok(entries.iter().filter_map(parse_entry).collect())
}

fn parse_entry(entry: &Value) -> Option<Exchange> {
    let request = parse_request(entry.get("request")?)?;
    let response = parse_response(entry.get("response")?)?;
    Some(Exchange::new(request, response))
}

fn parse_request(request: &Value) -> Option<HttpRequest> {
    let method = request.get("method")?.as_str()?;
    let url = request.get("url")?.as_str()?;
    let body = request
        .get("postData")
        .and_then(|p| p.get("text"))
        .and_then(|t| t.as_str())
        .unwrap_or_default();

    Some(HttpRequest {
        method: Method::parse(method),
        url: url.to_string(),
        headers: parse_headers(request.get("headers")),
        body: body.to_string(),
    })
}

fn parse_response(response: &Value) -> Option<HttpResponse> {
    let status = response.get("status")?.as_u64()?;
    let status = u16::try_from(status).ok()?;
    let content = response.get("content");
    let text = content
        .and_then(|c| c.get("text"))
        .and_then(|t| t.as_str())
        .unwrap_or_default();
    let is_base64 = content
        .and_then(|c| c.get("encoding"))
        .and_then(|e| e.as_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("base64"));

    let body = if is_base64 {
        // Undecodable content is treated as an empty body rather than a broken capture
        general_purpose::STANDARD
            .decode(text.trim())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    } else {
        text.to_string()
    };

    Some(HttpResponse {
        status,
        headers: parse_headers(response.get("headers")),
        body,
    })
}

fn parse_headers(headers: Option<&Value>) -> Vec<Header> {
    headers
        .and_then(|h| h.as_array())
        .map(|array| {
            array
                .iter()
                .filter_map(|h| {
                    let name = h.get("name")?.as_str()?;
                    let value = h.get("value")?.as_str()?;
                    Some(Header::new(name, value))
                })
                .collect()
        })
        .unwrap_or_default()
}
