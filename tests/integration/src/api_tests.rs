//! API endpoint integration tests
//!
//! Health, metrics, token counting, the Messages endpoint and its error
//! envelope, exercised over a real socket.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

async fn gateway_with_backend() -> (MockBackend, TestGateway) {
    let backend = MockBackend::new().await;
    let gateway = TestGateway::start(gateway_config(&backend.url(), routing_rules())).await;
    (backend, gateway)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_backend, gateway) = gateway_with_backend().await;

    let response = gateway.get("/health").await;
    assert_status(&response, 200);

    let body = TestGateway::json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["providers"], 3);
    assert_eq!(body["degraded"], false);
}

#[tokio::test]
async fn test_health_reports_degraded_routing() {
    let backend = MockBackend::new().await;
    let gateway = TestGateway::start(gateway_config(&backend.url(), json!({}))).await;

    let body = TestGateway::json_body(gateway.get("/health").await).await;
    assert_eq!(body["degraded"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_counts_requests() {
    let (backend, gateway) = gateway_with_backend().await;
    backend.mock_completion(DEFAULT_PREFIX, "hello").await;

    let response = gateway.messages(&messages_request(CLAUDE_MODEL, "hi")).await;
    assert_status(&response, 200);

    let response = gateway.get("/metrics").await;
    assert_status(&response, 200);
    let text = response.text().await.expect("metrics body");
    assert!(text.contains("claude_router_requests_total"));
    assert!(text.contains(r#"outcome="success""#));
    assert!(text.contains("claude_router_backend_latency_seconds"));
}

#[tokio::test]
async fn test_count_tokens() {
    let (backend, gateway) = gateway_with_backend().await;

    let short = gateway
        .post_json("/v1/messages/count_tokens", &messages_request(CLAUDE_MODEL, "Hello"))
        .await;
    assert_status(&short, 200);
    let short = TestGateway::json_body(short).await["input_tokens"]
        .as_u64()
        .expect("input_tokens");

    let long = gateway
        .post_json("/v1/messages/count_tokens", &long_context_request(CLAUDE_MODEL))
        .await;
    let long = TestGateway::json_body(long).await["input_tokens"]
        .as_u64()
        .expect("input_tokens");

    assert!(short > 0);
    assert!(long > short);
    // counting never contacts a backend
    assert_eq!(backend.calls(DEFAULT_PREFIX).await, 0);
}

#[tokio::test]
async fn test_messages_round_trip() {
    let (backend, gateway) = gateway_with_backend().await;
    backend.mock_completion(DEFAULT_PREFIX, "Hello from upstream").await;

    let response = gateway.messages(&messages_request(CLAUDE_MODEL, "Say hi")).await;
    assert_status(&response, 200);
    let body = TestGateway::json_body(response).await;

    assert_eq!(body["type"], "message");
    assert_eq!(body["role"], "assistant");
    assert_eq!(body["model"], CLAUDE_MODEL);
    assert_eq!(body["content"], json!([{"type": "text", "text": "Hello from upstream"}]));
    assert_eq!(body["stop_reason"], "end_turn");
    assert_eq!(body["usage"]["input_tokens"], 11);
    assert_eq!(body["usage"]["output_tokens"], 4);

    let outbound = &backend.received_bodies(DEFAULT_PREFIX).await[0];
    assert_eq!(outbound["model"], "default-model");
    assert_eq!(outbound["stream"], false);
    assert_eq!(outbound["max_tokens"], 256);
    assert_eq!(outbound["messages"][0]["role"], "user");
    assert_eq!(backend.received_auth(DEFAULT_PREFIX).await, ["Bearer sk-default"]);
}

#[tokio::test]
async fn test_tool_conversation_is_translated() {
    let (backend, gateway) = gateway_with_backend().await;
    backend
        .mock_json(
            DEFAULT_PREFIX,
            tool_call_completion("call_7", "read_file", &json!({"path": "Cargo.toml"})),
        )
        .await;

    let response = gateway.messages(&tool_conversation_request(CLAUDE_MODEL)).await;
    assert_status(&response, 200);
    let body = TestGateway::json_body(response).await;
    assert_eq!(body["stop_reason"], "tool_use");
    assert_eq!(
        body["content"][0],
        json!({"type": "tool_use", "id": "call_7", "name": "read_file", "input": {"path": "Cargo.toml"}})
    );

    let outbound = &backend.received_bodies(DEFAULT_PREFIX).await[0];
    let messages = outbound["messages"].as_array().expect("messages");
    assert_eq!(messages[0], json!({"role": "system", "content": "You are terse."}));
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[2]["tool_calls"][0]["id"], "toolu_1");
    assert_eq!(messages[2]["tool_calls"][0]["function"]["name"], "read_file");
    assert_eq!(messages[3]["role"], "tool");
    assert_eq!(messages[3]["tool_call_id"], "toolu_1");
    assert_eq!(outbound["tools"][0]["function"]["name"], "read_file");
}

#[tokio::test]
async fn test_request_id_is_accepted() {
    let (backend, gateway) = gateway_with_backend().await;
    backend.mock_completion(DEFAULT_PREFIX, "ok").await;

    let response = gateway
        .client
        .post(gateway.url("/v1/messages"))
        .header("x-request-id", random_request_id())
        .json(&messages_request(CLAUDE_MODEL, "hi"))
        .send()
        .await
        .expect("request");
    assert_status(&response, 200);
}

#[tokio::test]
async fn test_malformed_json() {
    let (_backend, gateway) = gateway_with_backend().await;

    let response = gateway
        .client
        .post(gateway.url("/v1/messages"))
        .header("content-type", "application/json")
        .body("{\"model\": ")
        .send()
        .await
        .expect("request");

    assert_status(&response, 400);
    assert_error_envelope(&TestGateway::json_body(response).await, "invalid_request_error");
}

#[tokio::test]
async fn test_unsupported_block_is_invalid_request() {
    let (backend, gateway) = gateway_with_backend().await;
    backend.mock_completion(DEFAULT_PREFIX, "never").await;

    let response = gateway
        .messages(&json!({
            "model": CLAUDE_MODEL,
            "max_tokens": 16,
            "messages": [{"role": "user", "content": [{"type": "hologram", "data": "?"}]}]
        }))
        .await;

    assert_status(&response, 400);
    let body = TestGateway::json_body(response).await;
    assert_error_envelope(&body, "invalid_request_error");
    assert!(body["error"]["message"]
        .as_str()
        .expect("message")
        .contains("hologram"));
    assert_eq!(backend.calls(DEFAULT_PREFIX).await, 0);
}

#[tokio::test]
async fn test_upstream_errors_are_mapped() {
    let (backend, gateway) = gateway_with_backend().await;
    backend
        .mock_error(DEFAULT_PREFIX, 429, error_response("rate_limit_exceeded", "slow down"))
        .await;
    backend
        .mock_error(FAST_PREFIX, 500, error_response("server_error", "boom"))
        .await;

    let response = gateway.messages(&messages_request(CLAUDE_MODEL, "hi")).await;
    assert_status(&response, 429);
    assert_error_envelope(&TestGateway::json_body(response).await, "rate_limit_error");

    // haiku routes to `fast`, whose 5xx becomes a bad gateway
    let response = gateway.messages(&messages_request(HAIKU_MODEL, "hi")).await;
    assert_status(&response, 502);
    assert_error_envelope(&TestGateway::json_body(response).await, "api_error");

    assert!(gateway.metrics().contains(r#"outcome="backend_invocation""#));
}

#[tokio::test]
async fn test_unreachable_backend() {
    let gateway = TestGateway::start(gateway_config("http://127.0.0.1:1", routing_rules())).await;

    let response = gateway.messages(&messages_request(CLAUDE_MODEL, "hi")).await;
    assert_status(&response, 502);
    assert_error_envelope(&TestGateway::json_body(response).await, "api_error");
}

#[tokio::test]
async fn test_concurrent_requests() {
    let (backend, gateway) = gateway_with_backend().await;
    backend
        .mock_completion_delayed(DEFAULT_PREFIX, "slow", Duration::from_millis(100))
        .await;

    let requests = (0..8).map(|i| {
        let body = messages_request(CLAUDE_MODEL, &format!("request {i}"));
        let gateway = &gateway;
        async move { gateway.messages(&body).await.status().as_u16() }
    });
    let statuses = futures::future::join_all(requests).await;

    assert!(statuses.iter().all(|status| *status == 200));
    assert_eq!(backend.calls(DEFAULT_PREFIX).await, 8);
}
