//! Subscriber setup with optional OpenTelemetry.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the configured
//! level. Output is pretty or JSON. With `otel_enabled`, spans are also fed to
//! an OpenTelemetry tracer provider so trace and span IDs are assigned.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{
    trace::{Config, RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Attach the OpenTelemetry layer
    pub otel_enabled: bool,
    /// Service name
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Sampling rate (0.0 - 1.0)
    pub sampling_rate: f64,
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON lines instead of pretty output
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            otel_enabled: false,
            service_name: "claude-router".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            sampling_rate: 1.0,
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl TracingConfig {
    /// Create a new tracing configuration
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Enable the OpenTelemetry layer
    #[must_use]
    pub fn with_otel(mut self, enabled: bool) -> Self {
        self.otel_enabled = enabled;
        self
    }

    /// Set the sampling rate
    #[must_use]
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the log level
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Select JSON output
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn sampler(&self) -> Sampler {
        if self.sampling_rate >= 1.0 {
            Sampler::AlwaysOn
        } else if self.sampling_rate <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.sampling_rate)
        }
    }
}

/// Install the global subscriber
///
/// Returns the tracer provider when the OpenTelemetry layer is attached.
///
/// # Errors
/// Returns error if the filter is invalid or a subscriber is already set
pub fn init_tracing(config: &TracingConfig) -> Result<Option<TracerProvider>, TracingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|e| TracingError::Filter(format!("{}: {e}", config.log_level)))?,
    };

    let provider = config.otel_enabled.then(|| {
        let resource = Resource::new(vec![
            opentelemetry::KeyValue::new("service.name", config.service_name.clone()),
            opentelemetry::KeyValue::new("service.version", config.service_version.clone()),
        ]);

        TracerProvider::builder()
            .with_config(
                Config::default()
                    .with_sampler(config.sampler())
                    .with_id_generator(RandomIdGenerator::default())
                    .with_resource(resource),
            )
            .build()
    });

    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(config.service_name.clone())));

    let (json_layer, pretty_layer) = if config.json {
        (
            Some(fmt::layer().json().with_current_span(true).with_span_list(false)),
            None,
        )
    } else {
        (None, Some(fmt::layer().with_target(true)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|e| TracingError::Init(e.to_string()))?;

    info!(
        service = %config.service_name,
        level = %config.log_level,
        json = config.json,
        otel = config.otel_enabled,
        "Tracing initialized"
    );

    Ok(provider)
}

/// Flush and drop the tracer provider
pub fn shutdown_tracing(provider: Option<TracerProvider>) {
    if let Some(provider) = provider {
        for result in provider.force_flush() {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to flush spans");
            }
        }
        drop(provider);
        info!("Tracing shutdown complete");
    }
}

/// Tracing initialization error
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// Failed to install the subscriber
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
    /// Invalid filter directive
    #[error("Invalid log filter: {0}")]
    Filter(String),
}

/// Create a span for one gateway request
#[macro_export]
macro_rules! llm_request_span {
    ($request_id:expr, $model:expr, $stream:expr) => {
        tracing::info_span!(
            "llm_request",
            request_id = %$request_id,
            model = %$model,
            stream = $stream,
            category = tracing::field::Empty,
            provider = tracing::field::Empty,
            otel.kind = "server"
        )
    };
}

/// Create a span for a backend call
#[macro_export]
macro_rules! provider_span {
    ($provider:expr, $model:expr, $operation:expr) => {
        tracing::info_span!(
            "provider_call",
            provider = %$provider,
            model = %$model,
            operation = %$operation,
            otel.kind = "client"
        )
    };
}
