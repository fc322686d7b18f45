//! Backend response adapter.
//!
//! Turns chat-completions output into caller-facing [`StreamEvent`]s. A whole
//! response becomes `Start`, its content, `Stop`. A chunk stream is forwarded
//! chunk by chunk over a bounded channel; the producer suspends when the
//! caller reads slowly and stops as soon as the caller goes away.

use crate::context::RequestContext;
use futures::StreamExt;
use gateway_core::{
    ChatChunk, ChatCompletionResponse, ChatStreamItem, GatewayError, MessagesResponse,
    ResponseBlock, StopReason, StreamEvent, Usage,
};
use gateway_providers::ChatStream;
use gateway_telemetry::Metrics;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Capacity of the producer/consumer channel
pub const CHANNEL_CAPACITY: usize = 32;

/// How long a finished stream may still deliver its usage chunk
pub const USAGE_GRACE: Duration = Duration::from_millis(250);

/// How a backend stream ended
#[derive(Debug)]
pub enum StreamOutcome {
    /// `[DONE]` or a finish reason was seen
    Completed {
        /// Stop reason sent to the caller
        stop_reason: StopReason,
    },
    /// The stream failed or ended without a terminal signal
    Truncated(GatewayError),
    /// The caller went away
    Cancelled,
}

fn message_id(backend_id: &str) -> String {
    if backend_id.is_empty() {
        format!("msg_{}", uuid::Uuid::new_v4().simple())
    } else {
        backend_id.to_string()
    }
}

fn tool_call_id() -> String {
    format!("toolu_{}", uuid::Uuid::new_v4().simple())
}

/// Events describing a whole backend response
#[must_use]
pub fn complete_events(response: &ChatCompletionResponse, model: &str) -> Vec<StreamEvent> {
    let usage = response.usage.map(Usage::from).unwrap_or_default();
    let mut events = vec![StreamEvent::Start {
        message_id: message_id(&response.id),
        model: model.to_string(),
        usage: Usage {
            input_tokens: usage.input_tokens,
            output_tokens: 0,
        },
    }];

    let choice = response.first_choice();
    let text = choice
        .and_then(|c| c.message.content.as_deref())
        .unwrap_or_default();
    let calls = choice
        .and_then(|c| c.message.tool_calls.as_deref())
        .unwrap_or_default();

    // one content event even for an empty reply
    if !text.is_empty() || calls.is_empty() {
        events.push(StreamEvent::TextDelta {
            text: text.to_string(),
        });
    }
    for (index, call) in (0u32..).zip(calls) {
        let id = if call.id.is_empty() {
            tool_call_id()
        } else {
            call.id.clone()
        };
        events.push(StreamEvent::ToolCallStart {
            index,
            id,
            name: call.function.name.clone(),
        });
        events.push(StreamEvent::ToolCallDelta {
            index,
            partial_json: call.function.arguments.clone(),
        });
    }

    let stop_reason = match choice.and_then(|c| c.finish_reason.as_deref()) {
        Some(reason) => StopReason::from_finish_reason(reason),
        None if !calls.is_empty() => StopReason::ToolUse,
        None => StopReason::EndTurn,
    };
    events.push(StreamEvent::Stop {
        stop_reason: Some(stop_reason),
        usage,
    });
    events
}

enum PendingBlock {
    Text(String),
    Tool {
        index: u32,
        id: String,
        name: String,
        json: String,
    },
}

/// Fold events into one Messages response
pub fn assemble(events: impl IntoIterator<Item = StreamEvent>) -> MessagesResponse {
    let mut response = MessagesResponse::new(String::new(), String::new());
    let mut blocks: Vec<PendingBlock> = Vec::new();

    for event in events {
        match event {
            StreamEvent::Start {
                message_id,
                model,
                usage,
            } => {
                response.id = message_id;
                response.model = model;
                response.usage = usage;
            }
            StreamEvent::TextDelta { text } => match blocks.last_mut() {
                Some(PendingBlock::Text(current)) => current.push_str(&text),
                _ => blocks.push(PendingBlock::Text(text)),
            },
            StreamEvent::ToolCallStart { index, id, name } => blocks.push(PendingBlock::Tool {
                index,
                id,
                name,
                json: String::new(),
            }),
            StreamEvent::ToolCallDelta {
                index,
                partial_json,
            } => {
                let tool = blocks.iter_mut().rev().find_map(|block| match block {
                    PendingBlock::Tool { index: i, json, .. } if *i == index => Some(json),
                    _ => None,
                });
                if let Some(json) = tool {
                    json.push_str(&partial_json);
                }
            }
            StreamEvent::Stop { stop_reason, usage } => {
                response.stop_reason = stop_reason;
                response.usage = usage;
            }
        }
    }

    response.content = blocks
        .into_iter()
        .map(|block| match block {
            PendingBlock::Text(text) => ResponseBlock::Text { text },
            PendingBlock::Tool { id, name, json, .. } => ResponseBlock::ToolUse {
                id,
                name,
                input: parse_arguments(&json),
            },
        })
        .collect();
    response
}

fn parse_arguments(json: &str) -> Value {
    if json.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(json).unwrap_or_else(|e| {
        warn!(error = %e, "Tool call arguments are not valid JSON");
        Value::String(json.to_string())
    })
}

/// Chunk to event translation state
struct ChunkTranslator {
    model: String,
    started: bool,
    usage: Usage,
    stop_reason: Option<StopReason>,
    tools: HashSet<u32>,
}

impl ChunkTranslator {
    fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            started: false,
            usage: Usage::default(),
            stop_reason: None,
            tools: HashSet::new(),
        }
    }

    fn start(&mut self, backend_id: &str) -> StreamEvent {
        self.started = true;
        StreamEvent::Start {
            message_id: message_id(backend_id),
            model: self.model.clone(),
            usage: Usage {
                input_tokens: self.usage.input_tokens,
                output_tokens: 0,
            },
        }
    }

    fn on_chunk(&mut self, chunk: ChatChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if let Some(usage) = chunk.usage {
            self.usage = usage.into();
        }
        if !self.started {
            events.push(self.start(&chunk.id));
        }

        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
                events.push(StreamEvent::TextDelta { text });
            }

            for call in choice.delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = call
                    .function
                    .map_or((None, None), |f| (f.name, f.arguments));
                if self.tools.insert(call.index) {
                    events.push(StreamEvent::ToolCallStart {
                        index: call.index,
                        id: call.id.unwrap_or_else(tool_call_id),
                        name: name.unwrap_or_default(),
                    });
                }
                if let Some(partial_json) = arguments.filter(|args| !args.is_empty()) {
                    events.push(StreamEvent::ToolCallDelta {
                        index: call.index,
                        partial_json,
                    });
                }
            }

            if let Some(reason) = choice.finish_reason {
                self.stop_reason = Some(StopReason::from_finish_reason(&reason));
            }
        }
        events
    }

    fn terminal(&mut self, stop_reason: Option<StopReason>) -> Vec<StreamEvent> {
        let mut events = Vec::with_capacity(2);
        if !self.started {
            events.push(self.start(""));
        }
        events.push(StreamEvent::Stop {
            stop_reason,
            usage: self.usage,
        });
        events
    }
}

async fn send_all(tx: &mpsc::Sender<StreamEvent>, events: Vec<StreamEvent>) -> bool {
    for event in events {
        if tx.send(event).await.is_err() {
            return false;
        }
    }
    true
}

/// Forward `stream` to `tx` as caller events.
///
/// Emits exactly one `Start` and one `Stop`. A finish reason ends the
/// message; at most one more chunk is read, within [`USAGE_GRACE`], to pick
/// up trailing usage. A stream that fails or ends before `[DONE]` or a
/// finish reason gets a `Stop` with no stop reason. Returns as soon as the
/// receiver is dropped; the backend stream is dropped with it.
pub async fn adapt_stream(
    mut stream: ChatStream,
    model: &str,
    tx: mpsc::Sender<StreamEvent>,
) -> StreamOutcome {
    let mut translator = ChunkTranslator::new(model);

    let failure = loop {
        let finished = translator.stop_reason.is_some();
        let next = async {
            if finished {
                tokio::time::timeout(USAGE_GRACE, stream.next())
                    .await
                    .unwrap_or(Some(Ok(ChatStreamItem::Done)))
            } else {
                stream.next().await
            }
        };
        let item = tokio::select! {
            biased;
            () = tx.closed() => return StreamOutcome::Cancelled,
            item = next => item,
        };

        match item {
            Some(Ok(ChatStreamItem::Chunk(chunk))) => {
                let events = translator.on_chunk(chunk);
                if !send_all(&tx, events).await {
                    return StreamOutcome::Cancelled;
                }
                if finished {
                    break None;
                }
            }
            Some(Ok(ChatStreamItem::Done)) => break None,
            Some(Err(err)) => break Some(format!("backend stream failed: {err}")),
            None => break Some("backend stream ended without a terminal signal".to_string()),
        }
    };

    // a finish reason already ended the message, whatever follows it
    let outcome = match (failure, translator.stop_reason) {
        (Some(message), None) => StreamOutcome::Truncated(GatewayError::stream_truncated(message)),
        (_, stop_reason) => StreamOutcome::Completed {
            stop_reason: stop_reason.unwrap_or(StopReason::EndTurn),
        },
    };

    let stop_reason = match &outcome {
        StreamOutcome::Completed { stop_reason } => Some(*stop_reason),
        _ => None,
    };
    if !send_all(&tx, translator.terminal(stop_reason)).await {
        return StreamOutcome::Cancelled;
    }
    outcome
}

/// A backend stream bound to the caller's channel
pub struct Producer {
    stream: ChatStream,
    tx: mpsc::Sender<StreamEvent>,
}

impl Producer {
    /// Bind `stream` to a new channel, returning the receiving end
    #[must_use]
    pub fn channel(stream: ChatStream) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self { stream, tx }, rx)
    }

    /// Drive the stream to completion and finish the request.
    ///
    /// Returns the context, carrying the truncation error if there was one.
    pub async fn run(self, mut ctx: RequestContext, metrics: Metrics) -> RequestContext {
        let model = ctx.requested_model().to_string();
        let provider = ctx.provider().to_string();
        let category = ctx.category();

        metrics.stream_started();
        let outcome = adapt_stream(self.stream, &model, self.tx).await;
        metrics.stream_finished();

        let elapsed_ms = ctx.started.elapsed().as_millis();
        match outcome {
            StreamOutcome::Completed { stop_reason } => {
                metrics.record_request(category, &provider, "success");
                info!(
                    request_id = %ctx.request_id,
                    provider = %provider,
                    category,
                    model = %model,
                    stop_reason = stop_reason.as_str(),
                    elapsed_ms,
                    "Stream completed"
                );
            }
            StreamOutcome::Truncated(err) => {
                metrics.record_truncation(&provider);
                metrics.record_request(category, &provider, err.class().as_str());
                warn!(
                    request_id = %ctx.request_id,
                    provider = %provider,
                    category,
                    model = %model,
                    error = %err,
                    elapsed_ms,
                    "Backend stream truncated"
                );
                ctx.error = Some(err);
            }
            StreamOutcome::Cancelled => {
                metrics.record_request(category, &provider, "cancelled");
                debug!(
                    request_id = %ctx.request_id,
                    provider = %provider,
                    elapsed_ms,
                    "Caller disconnected, stream cancelled"
                );
            }
        }
        ctx
    }
}
