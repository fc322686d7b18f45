//! Prompt token estimation.

use gateway_core::MessagesRequest;
use tiktoken_rs::CoreBPE;

/// Prompt text size above which counting belongs on a blocking thread
pub const BLOCKING_TEXT_BYTES: usize = 64 * 1024;

/// Counts tokens with the `cl100k_base` encoding
#[derive(Clone, Copy)]
pub struct TokenCounter {
    bpe: &'static CoreBPE,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoding", &"cl100k_base")
            .finish()
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter {
    /// Create a counter; the encoding is loaded on first use
    #[must_use]
    pub fn new() -> Self {
        Self {
            bpe: tiktoken_rs::cl100k_base_singleton(),
        }
    }

    /// Load the encoding ahead of the first request (takes a few hundred ms)
    pub fn preload() {
        let _ = tiktoken_rs::cl100k_base_singleton();
    }

    /// Tokens in `text`
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Bytes of text the tokenizer would see for `request`
    #[must_use]
    pub fn text_bytes(request: &MessagesRequest) -> usize {
        request.text_segments().iter().map(|segment| segment.len()).sum()
    }

    /// Whether counting `request` is heavy enough to move off the async
    /// workers
    #[must_use]
    pub fn is_heavy(request: &MessagesRequest) -> bool {
        Self::text_bytes(request) >= BLOCKING_TEXT_BYTES
    }

    /// Prompt tokens of a request: system prompt, message text, tool inputs
    /// and results, and tool definitions
    #[must_use]
    pub fn count_request(&self, request: &MessagesRequest) -> usize {
        request
            .text_segments()
            .iter()
            .map(|segment| self.count(segment))
            .sum()
    }
}
