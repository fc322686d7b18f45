//! Per-request state threaded through the pipeline.

use crate::adapter::Producer;
use gateway_config::{GatewayConfig, RouteTarget};
use gateway_core::{ChatCompletionResponse, GatewayError, MessagesRequest, MessagesResponse, StreamEvent};
use gateway_providers::ChatStream;
use gateway_routing::RouteDecision;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Result of the backend call
pub enum BackendResponse {
    /// Whole JSON response
    Complete(ChatCompletionResponse),
    /// Chunk stream
    Stream(ChatStream),
}

/// What the caller gets back
#[derive(Debug)]
pub enum Reply {
    /// One Messages JSON object
    Message(MessagesResponse),
    /// Events to encode as SSE
    Stream(mpsc::Receiver<StreamEvent>),
}

/// Mutable state of one request. Owned by exactly one task at a time.
pub struct RequestContext {
    /// Request ID
    pub request_id: String,
    /// Inbound body as received
    pub body: Value,
    /// Typed view of the body, set by `rewrite`
    pub request: Option<MessagesRequest>,
    /// Configuration snapshot, set by `attach_config`
    pub config: Option<Arc<GatewayConfig>>,
    /// Explicit `provider,model` target named in the model field
    pub explicit: Option<RouteTarget>,
    /// Routing decision
    pub route: Option<RouteDecision>,
    /// Body sent to the provider
    pub outbound: Option<Value>,
    /// Backend result, consumed by `adapt`
    pub backend: Option<BackendResponse>,
    /// Streaming producer waiting to be launched
    pub producer: Option<Producer>,
    /// Reply handed to the HTTP layer
    pub reply: Option<Reply>,
    /// First error hit by the request
    pub error: Option<GatewayError>,
    /// When the request entered the pipeline
    pub started: Instant,
}

impl RequestContext {
    /// Create a context for `body`
    pub fn new(request_id: impl Into<String>, body: Value) -> Self {
        Self {
            request_id: request_id.into(),
            body,
            request: None,
            config: None,
            explicit: None,
            route: None,
            outbound: None,
            backend: None,
            producer: None,
            reply: None,
            error: None,
            started: Instant::now(),
        }
    }

    /// Whether the caller asked for a stream
    #[must_use]
    pub fn is_stream(&self) -> bool {
        match &self.request {
            Some(request) => request.stream,
            None => self.body.get("stream").and_then(Value::as_bool).unwrap_or(false),
        }
    }

    /// Model the caller asked for
    #[must_use]
    pub fn requested_model(&self) -> &str {
        match &self.request {
            Some(request) => &request.model,
            None => self.body.get("model").and_then(Value::as_str).unwrap_or(""),
        }
    }

    /// Category label for logs and metrics
    #[must_use]
    pub fn category(&self) -> &'static str {
        self.route.as_ref().map_or("none", |route| route.category.as_str())
    }

    /// Provider label for logs and metrics
    #[must_use]
    pub fn provider(&self) -> &str {
        self.route.as_ref().map_or("none", |route| route.provider.name.as_str())
    }

    /// Routing decision, or an internal error if routing has not run
    pub fn route(&self) -> Result<&RouteDecision, GatewayError> {
        self.route
            .as_ref()
            .ok_or_else(|| GatewayError::internal("request was not routed"))
    }

    /// Typed request, or an internal error if `rewrite` has not run
    pub fn request(&self) -> Result<&MessagesRequest, GatewayError> {
        self.request
            .as_ref()
            .ok_or_else(|| GatewayError::internal("request body was not parsed"))
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("model", &self.requested_model())
            .field("route", &self.route)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
