//! Logging entry point.

use crate::tracing_setup::{init_tracing, TracingConfig, TracingError};
use opentelemetry_sdk::trace::TracerProvider;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines
    pub json: bool,
    /// Attach the OpenTelemetry layer
    pub otel: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            otel: false,
        }
    }
}

impl LoggingConfig {
    /// Create a default logging configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the level
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Select JSON output
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Attach the OpenTelemetry layer
    #[must_use]
    pub fn with_otel(mut self, otel: bool) -> Self {
        self.otel = otel;
        self
    }
}

impl From<&LoggingConfig> for TracingConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self::default()
            .with_log_level(&config.level)
            .with_json(config.json)
            .with_otel(config.otel)
    }
}

/// Install the global subscriber for `config`
///
/// # Errors
/// Returns error if a subscriber is already installed or the level is invalid
pub fn init_logging(config: &LoggingConfig) -> Result<Option<TracerProvider>, TracingError> {
    init_tracing(&TracingConfig::from(config))
}
