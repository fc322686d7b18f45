//! Anthropic SSE framing.
//!
//! [`SseEncoder`] turns the adapter's events into `message_start`,
//! `content_block_start`, `content_block_delta`, `content_block_stop`,
//! `message_delta` and `message_stop` frames, numbering content blocks in
//! the order they open. At most one block is open at a time, and deltas
//! only ever target the open block.

use axum::response::sse::Event;
use futures::Stream;
use gateway_core::StreamEvent;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tracing::warn;

/// One SSE frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// SSE event name
    pub name: &'static str,
    /// JSON payload
    pub data: Value,
}

impl Frame {
    fn new(name: &'static str, data: Value) -> Self {
        Self { name, data }
    }

    /// Convert to an axum SSE event
    #[must_use]
    pub fn into_event(self) -> Event {
        Event::default().event(self.name).data(self.data.to_string())
    }
}

/// Stateful encoder for one response
#[derive(Debug, Default)]
pub struct SseEncoder {
    next_block: usize,
    open_block: Option<usize>,
    text_block: Option<usize>,
    tool_blocks: HashMap<u32, usize>,
}

impl SseEncoder {
    /// Create an encoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames for `event`
    pub fn encode(&mut self, event: StreamEvent) -> Vec<Frame> {
        let mut frames = Vec::new();
        match event {
            StreamEvent::Start {
                message_id,
                model,
                usage,
            } => frames.push(Frame::new(
                "message_start",
                json!({
                    "type": "message_start",
                    "message": {
                        "id": message_id,
                        "type": "message",
                        "role": "assistant",
                        "model": model,
                        "content": [],
                        "stop_reason": null,
                        "stop_sequence": null,
                        "usage": usage,
                    }
                }),
            )),
            StreamEvent::TextDelta { text } => {
                let index = match self.text_block.filter(|i| self.open_block == Some(*i)) {
                    Some(index) => index,
                    None => {
                        let index = self.open(&mut frames, json!({"type": "text", "text": ""}));
                        self.text_block = Some(index);
                        index
                    }
                };
                frames.push(Frame::new(
                    "content_block_delta",
                    json!({
                        "type": "content_block_delta",
                        "index": index,
                        "delta": {"type": "text_delta", "text": text},
                    }),
                ));
            }
            StreamEvent::ToolCallStart { index, id, name } => {
                let block = self.open(
                    &mut frames,
                    json!({"type": "tool_use", "id": id, "name": name, "input": {}}),
                );
                self.tool_blocks.insert(index, block);
            }
            StreamEvent::ToolCallDelta {
                index,
                partial_json,
            } => {
                match self.tool_blocks.get(&index).copied() {
                    Some(block) if self.open_block == Some(block) => frames.push(Frame::new(
                        "content_block_delta",
                        json!({
                            "type": "content_block_delta",
                            "index": block,
                            "delta": {"type": "input_json_delta", "partial_json": partial_json},
                        }),
                    )),
                    Some(block) => warn!(
                        tool_call = index,
                        block,
                        dropped_bytes = partial_json.len(),
                        "Arguments for a closed tool block dropped"
                    ),
                    None => warn!(tool_call = index, "Arguments for an unknown tool call dropped"),
                }
            }
            StreamEvent::Stop { stop_reason, usage } => {
                self.close(&mut frames);
                frames.push(Frame::new(
                    "message_delta",
                    json!({
                        "type": "message_delta",
                        "delta": {
                            "stop_reason": stop_reason.map(|r| r.as_str()),
                            "stop_sequence": null,
                        },
                        "usage": {"output_tokens": usage.output_tokens},
                    }),
                ));
                frames.push(Frame::new("message_stop", json!({"type": "message_stop"})));
            }
        }
        frames
    }

    fn open(&mut self, frames: &mut Vec<Frame>, content_block: Value) -> usize {
        self.close(frames);
        let index = self.next_block;
        self.next_block += 1;
        self.open_block = Some(index);
        frames.push(Frame::new(
            "content_block_start",
            json!({
                "type": "content_block_start",
                "index": index,
                "content_block": content_block,
            }),
        ));
        index
    }

    fn close(&mut self, frames: &mut Vec<Frame>) {
        if let Some(index) = self.open_block.take() {
            frames.push(Frame::new(
                "content_block_stop",
                json!({"type": "content_block_stop", "index": index}),
            ));
        }
    }
}

/// SSE body fed from the adapter's channel
pub fn sse_stream(
    mut rx: mpsc::Receiver<StreamEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    async_stream::stream! {
        let mut encoder = SseEncoder::new();
        while let Some(event) = rx.recv().await {
            for frame in encoder.encode(event) {
                yield Ok(frame.into_event());
            }
        }
    }
}
