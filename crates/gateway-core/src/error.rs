//! Error types for the gateway.
//!
//! Every failure a request can hit falls into one of four classes:
//! configuration (a rule points at a provider that does not exist),
//! transformation (the inbound body cannot be translated), backend invocation
//! (the provider call failed) and stream truncation (the provider stream ended
//! without a terminal signal).

use thiserror::Error;

/// Result alias used throughout the gateway crates
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Unified gateway error
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// A provider name could not be resolved in the registry
    #[error("Provider not found: {name}")]
    ProviderNotFound {
        /// Name that was looked up
        name: String,
    },

    /// Invalid or incomplete configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// The inbound body could not be translated
    #[error("Invalid request: {message}")]
    Transform {
        /// Error message
        message: String,
        /// Offending field, if known
        field: Option<String>,
    },

    /// Network or protocol failure while calling a provider
    #[error("Provider '{provider}' failed: {message}")]
    Backend {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
        /// Upstream HTTP status, if a response was received
        status: Option<u16>,
    },

    /// Provider stream ended before a terminal signal
    #[error("Stream truncated: {message}")]
    StreamTruncated {
        /// Error message
        message: String,
    },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

/// Coarse error class, used for logging and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Provider lookup or configuration failure
    Configuration,
    /// Inbound body translation failure
    Transform,
    /// Provider call failure
    BackendInvocation,
    /// Provider stream ended abnormally
    StreamTruncation,
    /// Anything else
    Internal,
}

impl ErrorClass {
    /// Label used in logs and metrics
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Transform => "transform",
            Self::BackendInvocation => "backend_invocation",
            Self::StreamTruncation => "stream_truncation",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GatewayError {
    /// Create a provider-not-found error
    #[must_use]
    pub fn provider_not_found(name: impl Into<String>) -> Self {
        Self::ProviderNotFound { name: name.into() }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a transformation error
    #[must_use]
    pub fn transform(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Transform {
            message: message.into(),
            field: field.map(String::from),
        }
    }

    /// Create a backend invocation error
    #[must_use]
    pub fn backend(provider: impl Into<String>, message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Backend {
            provider: provider.into(),
            message: message.into(),
            status,
        }
    }

    /// Create a stream truncation error
    #[must_use]
    pub fn stream_truncated(message: impl Into<String>) -> Self {
        Self::StreamTruncated {
            message: message.into(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Error class of this error
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ProviderNotFound { .. } | Self::Configuration { .. } => ErrorClass::Configuration,
            Self::Transform { .. } => ErrorClass::Transform,
            Self::Backend { .. } => ErrorClass::BackendInvocation,
            Self::StreamTruncated { .. } => ErrorClass::StreamTruncation,
            Self::Internal { .. } => ErrorClass::Internal,
        }
    }

    /// HTTP status code to reply with
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Transform { .. } => 400,
            Self::Backend {
                status: Some(status),
                ..
            } if (400..500).contains(status) => *status,
            Self::Backend { .. } | Self::StreamTruncated { .. } => 502,
            Self::ProviderNotFound { .. } | Self::Configuration { .. } | Self::Internal { .. } => 500,
        }
    }

    /// Messages API error type for the error envelope
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self.status_code() {
            400 | 422 => "invalid_request_error",
            401 => "authentication_error",
            403 => "permission_error",
            404 => "not_found_error",
            429 => "rate_limit_error",
            _ => "api_error",
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::transform(format!("Invalid JSON: {err}"), None)
    }
}
