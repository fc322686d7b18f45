//! Request classification.
//!
//! A request falls into one of four categories. Classification never fails:
//! when the rule table is incomplete every request is `Default`.

use crate::rules::RoutingRules;
use crate::tokens::TokenCounter;
use gateway_core::MessagesRequest;
use std::fmt;
use tracing::trace;

/// Routing category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Background, non-interactive work
    Background,
    /// Extended reasoning
    Think,
    /// Prompt above the long-context threshold
    LongContext,
    /// Everything else
    Default,
}

impl Category {
    /// Config key and log label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Think => "think",
            Self::LongContext => "longContext",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides the category of a request
pub trait Classify: Send + Sync {
    /// Category of `request` under `rules`
    fn classify(&self, request: &MessagesRequest, rules: &RoutingRules) -> Category;
}

/// Whether the caller marked the request as background work
///
/// `metadata.background == true`, or a `haiku` model was requested.
#[must_use]
pub fn is_background(request: &MessagesRequest) -> bool {
    let flagged = request
        .metadata
        .as_ref()
        .and_then(|m| m.background)
        .unwrap_or(false);
    flagged || request.model.to_ascii_lowercase().contains("haiku")
}

/// Whether the caller asked for extended reasoning
///
/// `thinking.type == "enabled"`, or `metadata.think == true`.
#[must_use]
pub fn wants_thinking(request: &MessagesRequest) -> bool {
    request.thinking_enabled()
        || request
            .metadata
            .as_ref()
            .and_then(|m| m.think)
            .unwrap_or(false)
}

/// Priority classifier: long context, then background, then think
#[derive(Debug, Clone, Default)]
pub struct DefaultClassifier {
    counter: TokenCounter,
}

impl DefaultClassifier {
    /// Create a classifier
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classify for DefaultClassifier {
    fn classify(&self, request: &MessagesRequest, rules: &RoutingRules) -> Category {
        if !rules.is_complete() {
            return Category::Default;
        }

        let tokens = self.counter.count_request(request);
        trace!(tokens, threshold = rules.long_context_threshold, "Estimated prompt tokens");

        if tokens > rules.long_context_threshold {
            Category::LongContext
        } else if is_background(request) {
            Category::Background
        } else if wants_thinking(request) {
            Category::Think
        } else {
            Category::Default
        }
    }
}
