//! # Gateway Routing
//!
//! Request classification and route resolution for the Claude Router gateway.
//!
//! This crate provides:
//! - Routing categories and the rule table mapping them to `provider:model`
//! - Prompt token estimation
//! - A pluggable classifier deciding a request's category
//! - The router resolving a request to a concrete provider and model

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classifier;
pub mod router;
pub mod rules;
pub mod tokens;

// Re-export main types
pub use classifier::{Category, Classify, DefaultClassifier};
pub use router::{RouteDecision, Router};
pub use rules::RoutingRules;
pub use tokens::{TokenCounter, BLOCKING_TEXT_BYTES};
