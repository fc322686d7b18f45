//! Test helper utilities for integration tests

use gateway_config::GatewayConfig;
use gateway_server::{serve, AppState};
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// One decoded SSE frame
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    /// Event name
    pub event: String,
    /// JSON payload
    pub data: Value,
}

/// Decode an SSE body, skipping keep-alive comments
pub fn parse_sse(text: &str) -> Vec<SseFrame> {
    text.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    event = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data = serde_json::from_str(rest.trim()).ok();
                }
            }
            Some(SseFrame {
                event: event?,
                data: data?,
            })
        })
        .collect()
}

/// A gateway listening on an ephemeral local port
pub struct TestGateway {
    /// The server address
    pub addr: SocketAddr,
    /// HTTP client for making requests
    pub client: Client,
    /// Base URL for the server
    pub base_url: String,
    /// Shared state, for inspecting metrics and the client cache
    pub state: AppState,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestGateway {
    /// Start a gateway for `config`
    pub async fn start(config: GatewayConfig) -> Self {
        init_tracing();
        let state = AppState::from_config(config).expect("Failed to build state");

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server_state = state.clone();
        tokio::spawn(async move {
            serve(listener, server_state, async {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create client");

        Self {
            addr,
            client,
            base_url: format!("http://{addr}"),
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the full URL for a path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// `POST /v1/messages`
    pub async fn messages(&self, body: &Value) -> Response {
        self.post_json("/v1/messages", body).await
    }

    /// `POST /v1/messages` and decode the SSE reply
    pub async fn messages_stream(&self, body: &Value) -> Vec<SseFrame> {
        let response = self.messages(body).await;
        assert_status(&response, 200);
        let text = response.text().await.expect("Failed to read stream");
        parse_sse(&text)
    }

    /// Prometheus exposition of the gateway's metrics
    pub fn metrics(&self) -> String {
        self.state.metrics.render().expect("Failed to render metrics")
    }

    /// Parse response body as JSON
    pub async fn json_body(response: Response) -> Value {
        response.json().await.expect("Failed to parse JSON")
    }

    /// Shutdown the test server
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Assert that a response has the expected status code
pub fn assert_status(response: &Response, expected: u16) {
    assert_eq!(
        response.status().as_u16(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}

/// Assert that `body` is a Messages error envelope of `error_type`
pub fn assert_error_envelope(body: &Value, error_type: &str) {
    assert_eq!(body["type"], "error", "not an error envelope: {body}");
    assert_eq!(body["error"]["type"], error_type, "unexpected error type: {body}");
    assert!(body["error"]["message"].is_string(), "missing message: {body}");
}

/// Wait for a condition to be true with timeout
pub async fn wait_for<F>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Generate a random request ID
pub fn random_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_sse_skips_comments() {
        let text = "event: message_start\ndata: {\"type\":\"message_start\"}\n\n:\n\n\
                    event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n";
        let frames = parse_sse(text);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "message_start");
        assert_eq!(frames[1].data, json!({"type": "message_stop"}));
    }

    #[test]
    fn test_random_request_id() {
        let id1 = random_request_id();
        let id2 = random_request_id();
        assert!(id1.starts_with("req_"));
        assert_ne!(id1, id2);
    }
}
