//! # Gateway Server
//!
//! HTTP surface of the Claude Router.
//!
//! This crate provides:
//! - Axum server with the Messages, token counting, health and metrics endpoints
//! - The request pipeline (config, rewrite, route, format, invoke, adapt)
//! - Stream adaptation and Messages SSE framing
//! - PID file lifecycle and graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod context;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod lifecycle;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod sse;
pub mod state;

// Re-export main types
pub use adapter::{adapt_stream, StreamOutcome};
pub use context::{Reply, RequestContext};
pub use error::ApiError;
pub use lifecycle::{LifecycleError, PidFile};
pub use pipeline::{Pipeline, Stage};
pub use routes::create_router;
pub use server::{serve, serve_with_deadline, Server, ServerConfig, DEFAULT_GRACEFUL_TIMEOUT};
pub use shutdown::shutdown_signal;
pub use sse::SseEncoder;
pub use state::AppState;
