//! # Gateway Core
//!
//! Core types and error handling for the Claude Router gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Messages API request and response types
//! - Chat-completions backend types
//! - Caller-facing stream events
//! - The request transformer
//! - Error types and handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chat;
pub mod error;
pub mod messages;
pub mod streaming;
pub mod transform;

// Re-export commonly used types
pub use chat::{ChatChunk, ChatCompletionResponse, ChatStreamItem, ChatUsage};
pub use error::{ErrorClass, GatewayError, GatewayResult};
pub use messages::{
    ContentBlock, Message, MessageContent, MessagesRequest, MessagesResponse, RequestMetadata,
    ResponseBlock, Role, SystemPrompt, TokenCountResponse, ToolDefinition,
};
pub use streaming::{StopReason, StreamEvent, Usage};
pub use transform::transform;
