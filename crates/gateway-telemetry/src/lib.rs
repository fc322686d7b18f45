//! # Gateway Telemetry
//!
//! Observability for the Claude Router gateway.
//!
//! This crate provides:
//! - Structured logging (pretty or JSON) with `RUST_LOG` filtering
//! - Optional OpenTelemetry tracing layer
//! - Prometheus metrics for requests, backend latency, stream truncation and
//!   the client cache

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod metrics;
pub mod tracing_setup;

// Re-export main types
pub use logging::{init_logging, LoggingConfig};
pub use metrics::{Metrics, MetricsConfig};
pub use tracing_setup::{init_tracing, shutdown_tracing, TracingConfig, TracingError};
