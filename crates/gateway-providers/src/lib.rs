//! # Gateway Providers
//!
//! Backend provider plumbing for the Claude Router gateway:
//! - [`ProviderRegistry`]: configured OpenAI-compatible providers by name
//! - [`ProviderClient`]: HTTP client for one provider's chat-completions API
//! - [`ClientCache`]: LRU + TTL cache of live clients shared across requests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod client;
pub mod registry;

// Re-export main types
pub use cache::{CacheOutcome, ClientCache};
pub use client::{chat_completions_url, ChatStream, ProviderClient};
pub use registry::{Provider, ProviderRegistry, DEFAULT_PROVIDER};
