//! OpenAI-compatible chat-completions response types.
//!
//! Only the fields the gateway reads are modelled; everything else a backend
//! sends is ignored. Most fields default so that slightly non-conforming
//! backends still parse.

use crate::streaming::Usage;
use serde::{Deserialize, Serialize};

/// Non-streaming chat completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Completion ID
    #[serde(default)]
    pub id: String,

    /// Model that produced the completion
    #[serde(default)]
    pub model: String,

    /// Completion choices
    #[serde(default)]
    pub choices: Vec<ChatChoice>,

    /// Token usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChatUsage>,
}

impl ChatCompletionResponse {
    /// First choice, which is the only one the gateway reads
    #[must_use]
    pub fn first_choice(&self) -> Option<&ChatChoice> {
        self.choices.first()
    }
}

/// A completion choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,

    /// Generated message
    #[serde(default)]
    pub message: ChatResponseMessage,

    /// Finish reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Assistant message of a completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponseMessage {
    /// Role, normally "assistant"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Generated text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Requested tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
}

/// Complete tool call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatToolCall {
    /// Tool call ID
    #[serde(default)]
    pub id: String,

    /// Call type, normally "function"
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Function name and arguments
    pub function: ChatFunctionCall,
}

/// Function call with JSON-encoded arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatFunctionCall {
    /// Function name
    #[serde(default)]
    pub name: String,

    /// JSON-encoded arguments
    #[serde(default)]
    pub arguments: String,
}

/// Backend token usage
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChatUsage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: u32,
}

impl From<ChatUsage> for Usage {
    fn from(usage: ChatUsage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}

/// Streaming chunk (`chat.completion.chunk`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Completion ID
    #[serde(default)]
    pub id: String,

    /// Model that produced the chunk
    #[serde(default)]
    pub model: String,

    /// Chunk choices
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Usage, sent on the last chunk when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChatUsage>,
}

impl ChatChunk {
    /// Chunk carrying a single text delta
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                delta: ChunkDelta {
                    content: Some(content.into()),
                    ..ChunkDelta::default()
                },
                ..ChunkChoice::default()
            }],
            ..Self::default()
        }
    }

    /// Chunk carrying only a finish reason
    #[must_use]
    pub fn finish(reason: impl Into<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                finish_reason: Some(reason.into()),
                ..ChunkChoice::default()
            }],
            ..Self::default()
        }
    }

    /// Finish reason of the first choice, if set
    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
    }
}

/// Streaming choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,

    /// Incremental content
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Finish reason, set on the final content chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Incremental message content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Role, sent on the first chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Text fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool call fragments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Tool call fragment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the tool call in the message
    #[serde(default)]
    pub index: u32,

    /// Tool call ID, sent on the first fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Function name and argument fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDelta>,
}

/// Function call fragment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDelta {
    /// Function name, sent on the first fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Argument JSON fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Item of a backend chunk stream
#[derive(Debug, Clone)]
pub enum ChatStreamItem {
    /// A parsed chunk
    Chunk(ChatChunk),
    /// The `[DONE]` sentinel
    Done,
}
