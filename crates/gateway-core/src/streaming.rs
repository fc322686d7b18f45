//! Caller-facing stream events.
//!
//! A response, streamed or not, is described as a sequence of
//! [`StreamEvent`]s: one `Start`, any number of content events, one `Stop`.

use serde::{Deserialize, Serialize};

/// Why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of turn
    EndTurn,
    /// Token limit reached
    MaxTokens,
    /// A stop sequence matched
    StopSequence,
    /// The model requested a tool call
    ToolUse,
}

impl StopReason {
    /// Map a chat-completions finish reason
    ///
    /// Unknown reasons map to `EndTurn`.
    #[must_use]
    pub fn from_finish_reason(reason: &str) -> Self {
        match reason {
            "length" => Self::MaxTokens,
            "tool_calls" | "function_call" => Self::ToolUse,
            // "stop", "content_filter" and anything else
            _ => Self::EndTurn,
        }
    }

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EndTurn => "end_turn",
            Self::MaxTokens => "max_tokens",
            Self::StopSequence => "stop_sequence",
            Self::ToolUse => "tool_use",
        }
    }
}

/// Token usage reported to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Generated tokens
    pub output_tokens: u32,
}

/// Event of a caller-facing response
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Response header
    Start {
        /// Message ID
        message_id: String,
        /// Model the caller asked for
        model: String,
        /// Usage known at start
        usage: Usage,
    },
    /// Text fragment
    TextDelta {
        /// The fragment
        text: String,
    },
    /// A tool call begins
    ToolCallStart {
        /// Backend tool call index
        index: u32,
        /// Tool call ID
        id: String,
        /// Tool name
        name: String,
    },
    /// Argument JSON fragment of a tool call
    ToolCallDelta {
        /// Backend tool call index
        index: u32,
        /// JSON fragment
        partial_json: String,
    },
    /// Terminal event
    Stop {
        /// Stop reason, `None` when the backend stream was cut short
        stop_reason: Option<StopReason>,
        /// Final usage
        usage: Usage,
    },
}

impl StreamEvent {
    /// Whether this is the terminal event
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stop { .. })
    }

    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::TextDelta { .. } => "text_delta",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolCallDelta { .. } => "tool_call_delta",
            Self::Stop { .. } => "stop",
        }
    }
}
