//! Streaming integration tests
//!
//! Backend SSE chunks in, Messages SSE frames out: ordering, tool calls,
//! usage and truncation.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

async fn streaming_gateway() -> (MockBackend, TestGateway) {
    let backend = MockBackend::new().await;
    let gateway = TestGateway::start(gateway_config(&backend.url(), routing_rules())).await;
    (backend, gateway)
}

fn event_names(frames: &[SseFrame]) -> Vec<&str> {
    frames.iter().map(|frame| frame.event.as_str()).collect()
}

fn frame<'a>(frames: &'a [SseFrame], event: &str) -> &'a SseFrame {
    frames
        .iter()
        .find(|frame| frame.event == event)
        .unwrap_or_else(|| panic!("no {event} frame"))
}

fn truncations(gateway: &TestGateway) -> bool {
    gateway
        .metrics()
        .contains("claude_router_stream_truncations_total{")
}

#[tokio::test]
async fn test_text_stream() {
    let (backend, gateway) = streaming_gateway().await;
    backend
        .mock_stream(
            DEFAULT_PREFIX,
            &[
                text_chunk("The "),
                text_chunk("answer "),
                text_chunk("is 42."),
                finish_chunk("stop"),
                usage_chunk(17, 6),
            ],
            true,
        )
        .await;

    let frames = gateway.messages_stream(&streaming_request(CLAUDE_MODEL, "answer?")).await;

    assert_eq!(
        event_names(&frames),
        [
            "message_start",
            "content_block_start",
            "content_block_delta",
            "content_block_delta",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop",
        ]
    );

    let start = &frame(&frames, "message_start").data["message"];
    assert_eq!(start["model"], CLAUDE_MODEL);
    assert_eq!(start["role"], "assistant");
    assert!(start["id"].as_str().expect("id").starts_with("msg_"));

    let text: String = frames
        .iter()
        .filter(|frame| frame.event == "content_block_delta")
        .map(|frame| frame.data["delta"]["text"].as_str().expect("text"))
        .collect();
    assert_eq!(text, "The answer is 42.");

    let delta = &frame(&frames, "message_delta").data;
    assert_eq!(delta["delta"]["stop_reason"], "end_turn");
    assert_eq!(delta["usage"]["output_tokens"], 6);
    assert!(!truncations(&gateway));
}

#[tokio::test]
async fn test_outbound_stream_request() {
    let (backend, gateway) = streaming_gateway().await;
    backend
        .mock_stream(DEFAULT_PREFIX, &[text_chunk("ok"), finish_chunk("stop")], true)
        .await;

    gateway.messages_stream(&streaming_request(CLAUDE_MODEL, "hi")).await;

    let outbound = &backend.received_bodies(DEFAULT_PREFIX).await[0];
    assert_eq!(outbound["stream"], true);
    assert_eq!(outbound["stream_options"], json!({"include_usage": true}));
    assert_eq!(outbound["model"], "default-model");
}

#[tokio::test]
async fn test_tool_call_stream() {
    let (backend, gateway) = streaming_gateway().await;
    backend
        .mock_stream(
            DEFAULT_PREFIX,
            &[
                text_chunk("Let me look."),
                tool_start_chunk(0, "call_a", "read_file"),
                tool_args_chunk(0, "{\"path\":"),
                tool_args_chunk(0, "\"src/main.rs\"}"),
                tool_start_chunk(1, "call_b", "list_dir"),
                tool_args_chunk(1, "{}"),
                finish_chunk("tool_calls"),
            ],
            true,
        )
        .await;

    let frames = gateway.messages_stream(&streaming_request(CLAUDE_MODEL, "look")).await;

    let starts: Vec<_> = frames
        .iter()
        .filter(|frame| frame.event == "content_block_start")
        .map(|frame| &frame.data)
        .collect();
    assert_eq!(starts.len(), 3);
    assert_eq!(starts[0]["content_block"]["type"], "text");
    assert_eq!(starts[1]["index"], 1);
    assert_eq!(starts[1]["content_block"]["id"], "call_a");
    assert_eq!(starts[1]["content_block"]["name"], "read_file");
    assert_eq!(starts[2]["index"], 2);
    assert_eq!(starts[2]["content_block"]["id"], "call_b");

    let args: String = frames
        .iter()
        .filter(|frame| frame.data["delta"]["type"] == "input_json_delta" && frame.data["index"] == 1)
        .map(|frame| frame.data["delta"]["partial_json"].as_str().expect("json"))
        .collect();
    assert_eq!(args, "{\"path\":\"src/main.rs\"}");

    // every opened block is closed before the message ends
    let stops = frames.iter().filter(|frame| frame.event == "content_block_stop").count();
    assert_eq!(stops, 3);
    assert_eq!(frame(&frames, "message_delta").data["delta"]["stop_reason"], "tool_use");
}

#[tokio::test]
async fn test_length_finish_reason() {
    let (backend, gateway) = streaming_gateway().await;
    backend
        .mock_stream(DEFAULT_PREFIX, &[text_chunk("cut"), finish_chunk("length")], true)
        .await;

    let frames = gateway.messages_stream(&streaming_request(CLAUDE_MODEL, "go on")).await;
    assert_eq!(frame(&frames, "message_delta").data["delta"]["stop_reason"], "max_tokens");
}

#[tokio::test]
async fn test_truncated_stream() {
    let (backend, gateway) = streaming_gateway().await;
    backend
        .mock_stream(
            DEFAULT_PREFIX,
            &[text_chunk("one "), text_chunk("two ")],
            false,
        )
        .await;

    let frames = gateway.messages_stream(&streaming_request(CLAUDE_MODEL, "count")).await;

    // the caller still gets a well-formed message, marked as cut short
    assert_eq!(event_names(&frames).last(), Some(&"message_stop"));
    assert!(frame(&frames, "message_delta").data["delta"]["stop_reason"].is_null());
    let text: String = frames
        .iter()
        .filter_map(|frame| frame.data["delta"]["text"].as_str())
        .collect();
    assert_eq!(text, "one two ");

    assert!(
        wait_for(
            || gateway.metrics().contains(r#"outcome="stream_truncation""#),
            Duration::from_secs(2)
        )
        .await
    );
    assert!(truncations(&gateway));
}

#[tokio::test]
async fn test_finish_without_done_is_complete() {
    let (backend, gateway) = streaming_gateway().await;
    backend
        .mock_stream(DEFAULT_PREFIX, &[text_chunk("done"), finish_chunk("stop")], false)
        .await;

    let frames = gateway.messages_stream(&streaming_request(CLAUDE_MODEL, "hi")).await;
    assert_eq!(frame(&frames, "message_delta").data["delta"]["stop_reason"], "end_turn");

    // give the producer time to record its outcome
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!truncations(&gateway));
}

#[tokio::test]
async fn test_empty_stream_is_truncated() {
    let (backend, gateway) = streaming_gateway().await;
    backend.mock_stream(DEFAULT_PREFIX, &[], false).await;

    let frames = gateway.messages_stream(&streaming_request(CLAUDE_MODEL, "hi")).await;
    assert_eq!(
        event_names(&frames),
        ["message_start", "message_delta", "message_stop"]
    );
    assert!(frame(&frames, "message_delta").data["delta"]["stop_reason"].is_null());
}

#[tokio::test]
async fn test_stream_open_failure_is_http_error() {
    let (backend, gateway) = streaming_gateway().await;
    backend
        .mock_error(DEFAULT_PREFIX, 401, error_response("invalid_api_key", "bad key"))
        .await;

    let response = gateway.messages(&streaming_request(CLAUDE_MODEL, "hi")).await;
    assert_status(&response, 401);
    assert_error_envelope(&TestGateway::json_body(response).await, "authentication_error");
}

#[tokio::test]
async fn test_routed_stream_reaches_category_provider() {
    let (backend, gateway) = streaming_gateway().await;
    backend
        .mock_stream(FAST_PREFIX, &[text_chunk("bg"), finish_chunk("stop")], true)
        .await;

    let frames = gateway.messages_stream(&streaming_request(HAIKU_MODEL, "tidy")).await;
    assert_eq!(frame(&frames, "message_start").data["message"]["model"], HAIKU_MODEL);
    assert_eq!(backend.received_bodies(FAST_PREFIX).await[0]["model"], "fast-model");
}

#[tokio::test]
async fn test_client_disconnect_stops_stream() {
    let (backend, gateway) = streaming_gateway().await;
    let chunks: Vec<_> = (0..200).map(|i| text_chunk(&format!("token{i} "))).collect();
    backend.mock_stream(DEFAULT_PREFIX, &chunks, true).await;

    let response = gateway.messages(&streaming_request(CLAUDE_MODEL, "long")).await;
    assert_status(&response, 200);
    drop(response);

    // the producer notices the closed channel and finishes as cancelled
    assert!(
        wait_for(
            || gateway.metrics().contains("claude_router_active_streams 0"),
            Duration::from_secs(2)
        )
        .await
    );
    assert!(!truncations(&gateway));
}
