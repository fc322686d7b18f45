//! Messages API request and response types.
//!
//! This is the typed view of what callers send to `POST /v1/messages`. The
//! gateway keeps the raw JSON body for translation and uses this view for
//! validation, classification and token estimation, so unknown fields are
//! tolerated rather than rejected.

use crate::error::GatewayError;
use crate::streaming::{StopReason, Usage};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Inbound Messages request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    /// Requested model (e.g., "claude-3-5-sonnet-20241022")
    pub model: String,

    /// Conversation turns
    pub messages: Vec<Message>,

    /// System prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stream the response as server-sent events
    #[serde(default)]
    pub stream: bool,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Top-k sampling parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Custom stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    /// Tool definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    /// Tool choice, kept opaque
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,

    /// Extended thinking configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,

    /// Request metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RequestMetadata>,
}

impl MessagesRequest {
    /// Create a new builder for `MessagesRequest`
    #[must_use]
    pub fn builder() -> MessagesRequestBuilder {
        MessagesRequestBuilder::default()
    }

    /// Parse the typed view out of a raw JSON body
    ///
    /// # Errors
    /// Returns a transform error if required fields are missing or ill-typed
    pub fn from_value(body: &serde_json::Value) -> Result<Self, GatewayError> {
        if !body.is_object() {
            return Err(GatewayError::transform("request body must be a JSON object", None));
        }
        match body.get("model") {
            Some(serde_json::Value::String(_)) => {}
            Some(_) => return Err(GatewayError::transform("model must be a string", Some("model"))),
            None => return Err(GatewayError::transform("model is required", Some("model"))),
        }
        match body.get("messages") {
            Some(serde_json::Value::Array(_)) => {}
            Some(_) => {
                return Err(GatewayError::transform("messages must be an array", Some("messages")))
            }
            None => return Err(GatewayError::transform("messages is required", Some("messages"))),
        }

        let request: Self = serde_json::from_value(body.clone())?;
        request.validate()?;
        Ok(request)
    }

    /// Validate the request
    ///
    /// # Errors
    /// Returns error if any field is invalid
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.model.trim().is_empty() {
            return Err(GatewayError::transform("model cannot be empty", Some("model")));
        }

        if self.messages.is_empty() {
            return Err(GatewayError::transform("messages cannot be empty", Some("messages")));
        }

        if let Some(max_tokens) = self.max_tokens {
            if max_tokens == 0 {
                return Err(GatewayError::transform(
                    "max_tokens must be greater than 0",
                    Some("max_tokens"),
                ));
            }
        }

        Ok(())
    }

    /// Whether extended thinking was requested
    #[must_use]
    pub fn thinking_enabled(&self) -> bool {
        self.thinking.as_ref().is_some_and(ThinkingConfig::is_enabled)
    }

    /// Text segments that count towards the prompt size.
    ///
    /// Covers the system prompt, message text, tool inputs and results, and
    /// tool definitions.
    #[must_use]
    pub fn text_segments(&self) -> Vec<Cow<'_, str>> {
        let mut segments = Vec::new();

        match &self.system {
            Some(SystemPrompt::Text(text)) => segments.push(Cow::Borrowed(text.as_str())),
            Some(SystemPrompt::Blocks(blocks)) => {
                segments.extend(blocks.iter().map(|b| Cow::Borrowed(b.text.as_str())));
            }
            None => {}
        }

        for message in &self.messages {
            match &message.content {
                MessageContent::Text(text) => segments.push(Cow::Borrowed(text.as_str())),
                MessageContent::Blocks(blocks) => {
                    for block in blocks {
                        block.collect_segments(&mut segments);
                    }
                }
            }
        }

        for tool in self.tools.iter().flatten() {
            segments.push(Cow::Borrowed(tool.name.as_str()));
            if let Some(description) = &tool.description {
                segments.push(Cow::Borrowed(description.as_str()));
            }
            if let Some(schema) = &tool.input_schema {
                segments.push(Cow::Owned(schema.to_string()));
            }
        }

        segments
    }
}

/// Builder for `MessagesRequest`
#[derive(Debug, Default)]
pub struct MessagesRequestBuilder {
    model: Option<String>,
    messages: Vec<Message>,
    system: Option<SystemPrompt>,
    max_tokens: Option<u32>,
    stream: bool,
    tools: Option<Vec<ToolDefinition>>,
    thinking: Option<ThinkingConfig>,
    metadata: Option<RequestMetadata>,
}

impl MessagesRequestBuilder {
    /// Set the model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a message
    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(SystemPrompt::Text(system.into()));
        self
    }

    /// Set max_tokens
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enable streaming
    #[must_use]
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Add a tool definition
    #[must_use]
    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.get_or_insert_with(Vec::new).push(tool);
        self
    }

    /// Enable extended thinking with the given budget
    #[must_use]
    pub fn thinking(mut self, budget_tokens: u32) -> Self {
        self.thinking = Some(ThinkingConfig {
            kind: "enabled".to_string(),
            budget_tokens: Some(budget_tokens),
        });
        self
    }

    /// Set metadata
    #[must_use]
    pub fn metadata(mut self, metadata: RequestMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Build the request
    ///
    /// # Errors
    /// Returns error if required fields are missing
    pub fn build(self) -> Result<MessagesRequest, GatewayError> {
        let model = self
            .model
            .ok_or_else(|| GatewayError::transform("model is required", Some("model")))?;

        let request = MessagesRequest {
            model,
            messages: self.messages,
            system: self.system,
            max_tokens: self.max_tokens,
            stream: self.stream,
            temperature: None,
            top_p: None,
            top_k: None,
            stop_sequences: None,
            tools: self.tools,
            tool_choice: None,
            thinking: self.thinking,
            metadata: self.metadata,
        };

        request.validate()?;

        Ok(request)
    }
}

/// A conversation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Author role
    pub role: Role,

    /// String shorthand or content blocks
    pub content: MessageContent,
}

impl Message {
    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a message from content blocks
    #[must_use]
    pub fn with_blocks(role: Role, blocks: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content: MessageContent::Blocks(blocks),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User turn
    User,
    /// Assistant turn
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Message content (string shorthand or blocks)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text
    Text(String),
    /// Content blocks
    Blocks(Vec<ContentBlock>),
}

/// System prompt (string shorthand or text blocks)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    /// Plain text
    Text(String),
    /// Text blocks
    Blocks(Vec<SystemBlock>),
}

/// A system prompt block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemBlock {
    /// Block type, always "text"
    #[serde(rename = "type", default = "text_kind")]
    pub kind: String,
    /// Block text
    pub text: String,
}

fn text_kind() -> String {
    "text".to_string()
}

/// Content block inside a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text block
    Text {
        /// The text
        text: String,
    },
    /// Image block
    Image {
        /// Image source
        source: ImageSource,
    },
    /// Tool invocation requested by the assistant
    ToolUse {
        /// Tool call ID
        id: String,
        /// Tool name
        name: String,
        /// Tool arguments
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Tool result supplied by the user
    ToolResult {
        /// ID of the tool call this answers
        tool_use_id: String,
        /// Result content
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<ToolResultContent>,
        /// Whether the tool failed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Model reasoning from a previous turn
    Thinking {
        /// Reasoning text
        #[serde(default)]
        thinking: String,
    },
    /// Redacted model reasoning
    RedactedThinking,
    /// Any block type this view does not model
    #[serde(other)]
    Unsupported,
}

impl ContentBlock {
    fn collect_segments<'a>(&'a self, segments: &mut Vec<Cow<'a, str>>) {
        match self {
            Self::Text { text } => segments.push(Cow::Borrowed(text.as_str())),
            Self::ToolUse { input, .. } => segments.push(Cow::Owned(input.to_string())),
            Self::ToolResult {
                content: Some(content),
                ..
            } => match content {
                ToolResultContent::Text(text) => segments.push(Cow::Borrowed(text.as_str())),
                ToolResultContent::Blocks(blocks) => {
                    for block in blocks {
                        block.collect_segments(segments);
                    }
                }
            },
            _ => {}
        }
    }
}

/// Image source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSource {
    /// Source type ("base64" or "url")
    #[serde(rename = "type")]
    pub kind: String,
    /// MIME type for base64 data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Base64 payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Remote URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Tool result content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    /// Plain text
    Text(String),
    /// Nested blocks
    Blocks(Vec<ContentBlock>),
}

/// Tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
}

/// Extended thinking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingConfig {
    /// "enabled" or "disabled"
    #[serde(rename = "type")]
    pub kind: String,
    /// Reasoning token budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

impl ThinkingConfig {
    /// Whether thinking is switched on
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.kind == "enabled"
    }
}

/// Request metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Caller-supplied user identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Marks the request as a background, non-interactive task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<bool>,

    /// Marks the request as needing extended reasoning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub think: Option<bool>,
}

/// Non-streaming Messages response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    /// Message ID
    pub id: String,
    /// Object type, always "message"
    #[serde(rename = "type")]
    pub kind: String,
    /// Always assistant
    pub role: Role,
    /// Model the caller asked for
    pub model: String,
    /// Generated content
    pub content: Vec<ResponseBlock>,
    /// Why generation stopped
    pub stop_reason: Option<StopReason>,
    /// Matched stop sequence
    pub stop_sequence: Option<String>,
    /// Token usage
    pub usage: Usage,
}

impl MessagesResponse {
    /// Create an empty assistant message
    #[must_use]
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "message".to_string(),
            role: Role::Assistant,
            model: model.into(),
            content: Vec::new(),
            stop_reason: None,
            stop_sequence: None,
            usage: Usage::default(),
        }
    }

    /// Concatenated text of all text blocks
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text.as_str()),
                ResponseBlock::ToolUse { .. } => None,
            })
            .collect()
    }
}

/// Content block of a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    /// Generated text
    Text {
        /// The text
        text: String,
    },
    /// Tool invocation
    ToolUse {
        /// Tool call ID
        id: String,
        /// Tool name
        name: String,
        /// Tool arguments
        input: serde_json::Value,
    },
}

/// Reply of `POST /v1/messages/count_tokens`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenCountResponse {
    /// Estimated prompt tokens
    pub input_tokens: u32,
}
