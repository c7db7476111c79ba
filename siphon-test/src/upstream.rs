use std::collections::{BTreeMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;

/// A request received by the [`MockUpstream`].
#[derive(Clone, Debug)]
pub struct CapturedRequest {
    /// The request path, such as `/v1/metrics`.
    pub path: String,
    /// Request headers with lowercase names.
    pub headers: BTreeMap<String, String>,
    /// The request body parsed as JSON, or `Null` if it is not valid JSON.
    pub body: Value,
}

impl CapturedRequest {
    /// Returns the value of a header by its lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[derive(Clone, Copy, Debug)]
struct ScriptedResponse {
    status: u16,
    delay: Duration,
}

#[derive(Clone, Debug, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    responses: Arc<Mutex<VecDeque<ScriptedResponse>>>,
}

async fn capture(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_owned(), value)
        })
        .collect();

    state.requests.lock().push(CapturedRequest {
        path: uri.path().to_owned(),
        headers,
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let response = state.responses.lock().pop_front();
    let ScriptedResponse { status, delay } = response.unwrap_or(ScriptedResponse {
        status: 200,
        delay: Duration::ZERO,
    });

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, format!("mock upstream: {}", status.as_u16()))
}

/// An HTTP server standing in for the metrics API.
///
/// Every request is recorded regardless of its path. Responses are taken from a queue of scripted
/// statuses, falling back to `200 OK` once the queue is empty. The server shuts down when dropped.
pub struct MockUpstream {
    addr: SocketAddr,
    state: MockState,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    /// Starts the server on an ephemeral port on the loopback interface.
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new().fallback(capture).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Returns the base URL of the server, with a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Queues a response with the given status.
    pub fn respond_with(&self, status: u16) -> &Self {
        self.respond_after(status, Duration::ZERO)
    }

    /// Queues a response with the given status that is sent after a delay.
    pub fn respond_after(&self, status: u16, delay: Duration) -> &Self {
        self.state
            .responses
            .lock()
            .push_back(ScriptedResponse { status, delay });
        self
    }

    /// Returns all requests received so far.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.state.requests.lock().len()
    }

    /// Waits until at least `count` requests have been received.
    ///
    /// Panics if that does not happen within `timeout`.
    pub async fn wait_for_requests(&self, count: usize, timeout: Duration) {
        let wait = async {
            while self.request_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };

        if tokio::time::timeout(timeout, wait).await.is_err() {
            panic!(
                "timed out waiting for {count} requests, got {}",
                self.request_count()
            );
        }
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Returns a URL on the loopback interface where no server is listening.
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn post(url: &str) -> u16 {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let authority = url.trim_start_matches("http://").trim_end_matches('/');
        let mut stream = tokio::net::TcpStream::connect(authority).await.unwrap();
        let body = r#"{"gauges":[]}"#;
        let request = format!(
            "POST /v1/metrics HTTP/1.1\r\nHost: {authority}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response[9..12].parse().unwrap()
    }

    #[tokio::test]
    async fn test_scripted_responses() {
        crate::setup();

        let upstream = MockUpstream::start().await;
        upstream.respond_with(503);

        assert_eq!(post(&upstream.url()).await, 503);
        assert_eq!(post(&upstream.url()).await, 200);

        let requests = upstream.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].path, "/v1/metrics");
        assert_eq!(requests[0].header("content-type"), Some("application/json"));
        assert_eq!(requests[0].body, serde_json::json!({"gauges": []}));
    }
}
