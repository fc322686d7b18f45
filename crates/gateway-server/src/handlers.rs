//! HTTP request handlers.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{sse::KeepAlive, IntoResponse, Response, Sse},
    Json,
};
use gateway_core::{MessagesRequest, TokenCountResponse};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::{
    context::{Reply, RequestContext},
    error::ApiError,
    extractors::{JsonBody, RequestId},
    pipeline::with_router,
    sse::sse_stream,
    state::AppState,
};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Version
    pub version: &'static str,
    /// Registered providers
    pub providers: usize,
    /// Every request uses the default route
    pub degraded: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        providers: state.router.registry().len(),
        degraded: state.router.is_degraded(),
    })
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `POST /v1/messages`
#[instrument(skip_all, fields(request_id = %request_id))]
pub async fn messages(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    JsonBody(body): JsonBody<Value>,
) -> Result<Response, ApiError> {
    let ctx = RequestContext::new(request_id, body);
    debug!(model = %ctx.requested_model(), stream = ctx.is_stream(), "Messages request");

    match state.pipeline.execute(ctx, &state).await? {
        Reply::Message(message) => Ok(Json(message).into_response()),
        Reply::Stream(rx) => Ok(Sse::new(sse_stream(rx))
            .keep_alive(KeepAlive::default())
            .into_response()),
    }
}

/// `POST /v1/messages/count_tokens`
#[instrument(skip_all, fields(request_id = %request_id))]
pub async fn count_tokens(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<TokenCountResponse>, ApiError> {
    let request = MessagesRequest::from_value(&body)?;
    let tokens = with_router(&state.router, &request, |router, request| {
        router.count_tokens(request)
    })
    .await?;
    debug!(model = %request.model, tokens, "Counted tokens");

    Ok(Json(TokenCountResponse {
        input_tokens: u32::try_from(tokens).unwrap_or(u32::MAX),
    }))
}
