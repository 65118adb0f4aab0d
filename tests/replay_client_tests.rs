/// Integration tests for the reqwest-backed replay client
/// Each test talks to a throwaway HTTP server on a loopback socket
use proxyscan::analyzers::FORM_CONTENT_TYPE;
use proxyscan::config::ScanConfig;
use proxyscan::error::ReplayError;
use proxyscan::finding_log::FindingLog;
use proxyscan::models::{HttpRequest, HttpResponse, Method};
use proxyscan::pipeline::Pipeline;
use proxyscan::replay::{HttpReplayClient, ReplayClient, DEFAULT_REPLAY_TIMEOUT};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Read one request head and return its path
async fn read_request_path(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    let head = String::from_utf8_lossy(&head);
    head.split_whitespace().nth(1).unwrap_or("").to_string()
}

fn reply(status_line: &str, extra_headers: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        extra_headers,
        body.len(),
        body
    )
}

/// Serve every connection with `respond(path)` and record the requested paths
async fn spawn_server<F>(respond: F) -> (SocketAddr, Arc<Mutex<Vec<String>>>)
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let paths = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&paths);
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let seen = Arc::clone(&seen);
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let path = read_request_path(&mut stream).await;
                seen.lock().unwrap().push(path.clone());
                let _ = stream.write_all(respond(&path).as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (addr, paths)
}

/// Answers `/ok` with 200 and everything else with a redirect to `/ok`
async fn spawn_redirecting_server() -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    spawn_server(|path| {
        if path == "/ok" {
            reply("200 OK", "", "landed")
        } else {
            reply("302 Found", "Location: /ok\r\n", "")
        }
    })
    .await
}

// ============================================
// Status Passthrough
// ============================================

#[tokio::test]
async fn test_success_status_and_body_are_returned() {
    let (addr, paths) = spawn_server(|_| reply("200 OK", "", "hello")).await;
    let client = HttpReplayClient::new(DEFAULT_REPLAY_TIMEOUT).unwrap();

    let response = client
        .send(Method::GET, &format!("http://{}/display?user=alice", addr))
        .await
        .expect("Replay should succeed");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "hello");
    assert_eq!(paths.lock().unwrap().as_slice(), ["/display?user=alice"]);
}

#[tokio::test]
async fn test_redirects_are_not_followed() {
    let (addr, paths) = spawn_redirecting_server().await;
    let client = HttpReplayClient::new(DEFAULT_REPLAY_TIMEOUT).unwrap();

    let response = client
        .send(Method::GET, &format!("http://{}/login?next=home", addr))
        .await
        .expect("Replay should succeed");

    assert_eq!(response.status, 302, "the redirect itself is the replay's status");
    assert_eq!(paths.lock().unwrap().as_slice(), ["/login?next=home"], "Location was never requested");
}

// ============================================
// Failure Mapping
// ============================================

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = HttpReplayClient::new(DEFAULT_REPLAY_TIMEOUT).unwrap();

    let result = client.send(Method::GET, &format!("http://{}/", addr)).await;

    assert!(matches!(result, Err(ReplayError::Transport(_))), "got {:?}", result);
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        // Hold connections open without ever answering
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    let client = HttpReplayClient::new(Duration::from_millis(200)).unwrap();

    let result = client.send(Method::GET, &format!("http://{}/slow", addr)).await;

    assert!(matches!(result, Err(ReplayError::Timeout)), "got {:?}", result);
    server.abort();
}

// ============================================
// Pipeline Over A Real Socket
// ============================================

#[tokio::test]
async fn test_redirecting_endpoint_is_not_reported() {
    let (addr, paths) = spawn_redirecting_server().await;
    let log = Arc::new(FindingLog::new());
    let pipeline = Pipeline::from_config(&ScanConfig::default(), Arc::clone(&log), tokio::runtime::Handle::current())
        .expect("Default config should build");

    pipeline.on_exchange(
        HttpRequest::new(Method::POST, format!("http://{}/transfer", addr))
            .with_header("Content-Type", FORM_CONTENT_TYPE)
            .with_body("amount=10&to=bob"),
        HttpResponse::new(200),
    );
    pipeline.replays().wait_idle().await;

    assert_eq!(paths.lock().unwrap().as_slice(), ["/transfer?amount=10&to=bob"]);
    assert_eq!(log.count(), 0, "a 302 replay must not produce a GET Checker finding");
}

#[tokio::test]
async fn test_accepting_endpoint_is_reported() {
    let (addr, _paths) = spawn_server(|_| reply("200 OK", "", "done")).await;
    let log = Arc::new(FindingLog::new());
    let pipeline = Pipeline::from_config(&ScanConfig::default(), Arc::clone(&log), tokio::runtime::Handle::current())
        .expect("Default config should build");

    pipeline.on_exchange(
        HttpRequest::new(Method::POST, format!("http://{}/transfer", addr))
            .with_header("Content-Type", FORM_CONTENT_TYPE)
            .with_body("amount=10"),
        HttpResponse::new(200),
    );
    pipeline.replays().wait_idle().await;

    assert_eq!(log.count(), 1);
    assert!(log.get(0).unwrap().message().ends_with("returned 200"));
}
