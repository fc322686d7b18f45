//! Request pipeline.
//!
//! Every request runs the same six stages in order:
//! `attach_config → rewrite → route → format → invoke → adapt`. When the
//! routing rules are incomplete the `route` slot holds `static_default`
//! instead. A stage mutates the request context and the first error stops
//! the request.

use crate::adapter::{assemble, complete_events, Producer};
use crate::context::{BackendResponse, Reply, RequestContext};
use crate::state::AppState;
use async_trait::async_trait;
use gateway_core::{transform, GatewayError, GatewayResult, MessagesRequest};
use gateway_providers::CacheOutcome;
use gateway_routing::{RouteDecision, Router, TokenCounter};
use gateway_telemetry::{llm_request_span, provider_span};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, Instrument, Span};

/// One step of the pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name for logs
    fn name(&self) -> &'static str;

    /// Run against `ctx`
    async fn run(&self, ctx: &mut RequestContext, state: &AppState) -> GatewayResult<()>;
}

/// Attach the configuration snapshot
#[derive(Debug, Clone, Copy)]
pub struct AttachConfig;

#[async_trait]
impl Stage for AttachConfig {
    fn name(&self) -> &'static str {
        "attach_config"
    }

    async fn run(&self, ctx: &mut RequestContext, state: &AppState) -> GatewayResult<()> {
        ctx.config = Some(state.config.clone());
        Ok(())
    }
}

/// Parse the typed view of the body and detect an explicit provider
#[derive(Debug, Clone, Copy)]
pub struct Rewrite;

#[async_trait]
impl Stage for Rewrite {
    fn name(&self) -> &'static str {
        "rewrite"
    }

    async fn run(&self, ctx: &mut RequestContext, state: &AppState) -> GatewayResult<()> {
        let request = MessagesRequest::from_value(&ctx.body)?;
        ctx.explicit = state.router.explicit_target(&request.model);
        if let Some(target) = &ctx.explicit {
            debug!(target = %target, "Explicit provider in model field");
        }
        ctx.request = Some(request);
        Ok(())
    }
}

fn record_route(ctx: &mut RequestContext, decision: RouteDecision) {
    let span = Span::current();
    span.record("category", decision.category.as_str());
    span.record("provider", decision.provider.name.as_str());
    debug!(
        category = %decision.category,
        provider = %decision.provider.name,
        model = %decision.model,
        explicit = decision.explicit,
        "Request routed"
    );
    ctx.route = Some(decision);
}

/// Run `work` with the router, on the blocking pool when `request` carries
/// enough text for tokenization to hold up an async worker
pub(crate) async fn with_router<T, F>(
    router: &Arc<Router>,
    request: &MessagesRequest,
    work: F,
) -> GatewayResult<T>
where
    F: FnOnce(&Router, &MessagesRequest) -> T + Send + 'static,
    T: Send + 'static,
{
    if !TokenCounter::is_heavy(request) {
        return Ok(work(router, request));
    }
    trace!("Counting tokens on the blocking pool");
    let router = Arc::clone(router);
    let request = request.clone();
    tokio::task::spawn_blocking(move || work(&router, &request))
        .await
        .map_err(|e| GatewayError::internal(format!("token counting task failed: {e}")))
}

/// Classify and resolve provider and model
#[derive(Debug, Clone, Copy)]
pub struct Route;

#[async_trait]
impl Stage for Route {
    fn name(&self) -> &'static str {
        "route"
    }

    async fn run(&self, ctx: &mut RequestContext, state: &AppState) -> GatewayResult<()> {
        let decision = match &ctx.explicit {
            Some(target) => state.router.resolve_explicit(target)?,
            None => {
                with_router(&state.router, ctx.request()?, |router, request| router.route(request))
                    .await??
            }
        };
        record_route(ctx, decision);
        Ok(())
    }
}

/// Assign the default provider and model, whatever the request says
#[derive(Debug, Clone, Copy)]
pub struct StaticDefault;

#[async_trait]
impl Stage for StaticDefault {
    fn name(&self) -> &'static str {
        "static_default"
    }

    async fn run(&self, ctx: &mut RequestContext, state: &AppState) -> GatewayResult<()> {
        let decision = state.router.static_default()?;
        record_route(ctx, decision);
        Ok(())
    }
}

/// Translate the body for the provider
#[derive(Debug, Clone, Copy)]
pub struct Format;

#[async_trait]
impl Stage for Format {
    fn name(&self) -> &'static str {
        "format"
    }

    async fn run(&self, ctx: &mut RequestContext, _state: &AppState) -> GatewayResult<()> {
        let model = &ctx.route()?.model;
        let mut outbound = transform(&ctx.body, model)?;

        let stream = ctx.is_stream();
        if let Some(body) = outbound.as_object_mut() {
            body.insert("stream".to_string(), Value::Bool(stream));
            if stream {
                body.entry("stream_options")
                    .or_insert_with(|| json!({"include_usage": true}));
            } else {
                body.remove("stream_options");
            }
        }

        ctx.outbound = Some(outbound);
        Ok(())
    }
}

/// Call the provider once
#[derive(Debug, Clone, Copy)]
pub struct Invoke;

#[async_trait]
impl Stage for Invoke {
    fn name(&self) -> &'static str {
        "invoke"
    }

    async fn run(&self, ctx: &mut RequestContext, state: &AppState) -> GatewayResult<()> {
        let stream = ctx.is_stream();
        let route = ctx.route()?.clone();
        let body = ctx
            .outbound
            .take()
            .ok_or_else(|| GatewayError::internal("request was not formatted"))?;

        let (client, outcome) = state.clients.lookup(&route.provider)?;
        match outcome {
            CacheOutcome::Hit => state.metrics.record_cache_event("hit"),
            CacheOutcome::Miss => state.metrics.record_cache_event("miss"),
            CacheOutcome::MissWithEviction => {
                state.metrics.record_cache_event("miss");
                state.metrics.record_cache_event("eviction");
            }
        }

        let provider = route.provider.name.as_str();
        let started = Instant::now();
        let backend = if stream {
            let span = provider_span!(provider, route.model, "chat_completion_stream");
            BackendResponse::Stream(client.chat_completion_stream(&body).instrument(span).await?)
        } else {
            let span = provider_span!(provider, route.model, "chat_completion");
            BackendResponse::Complete(client.chat_completion(&body).instrument(span).await?)
        };
        state
            .metrics
            .observe_backend_latency(provider, stream, started.elapsed().as_secs_f64());

        ctx.outbound = Some(body);
        ctx.backend = Some(backend);
        Ok(())
    }
}

/// Hand the backend result to the response adapter
#[derive(Debug, Clone, Copy)]
pub struct Adapt;

#[async_trait]
impl Stage for Adapt {
    fn name(&self) -> &'static str {
        "adapt"
    }

    async fn run(&self, ctx: &mut RequestContext, _state: &AppState) -> GatewayResult<()> {
        let reply = match ctx.backend.take() {
            Some(BackendResponse::Complete(response)) => {
                Reply::Message(assemble(complete_events(&response, ctx.requested_model())))
            }
            Some(BackendResponse::Stream(stream)) => {
                let (producer, rx) = Producer::channel(stream);
                ctx.producer = Some(producer);
                Reply::Stream(rx)
            }
            None => return Err(GatewayError::internal("backend was not invoked")),
        };
        ctx.reply = Some(reply);
        Ok(())
    }
}

/// Ordered stage list
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Stages for `router`; `static_default` replaces `route` when the rules
    /// are incomplete
    #[must_use]
    pub fn for_router(router: &Router) -> Self {
        let route: Box<dyn Stage> = if router.is_degraded() {
            Box::new(StaticDefault)
        } else {
            Box::new(Route)
        };
        Self {
            stages: vec![
                Box::new(AttachConfig),
                Box::new(Rewrite),
                route,
                Box::new(Format),
                Box::new(Invoke),
                Box::new(Adapt),
            ],
        }
    }

    /// Stage names in order
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run `ctx` through every stage.
    ///
    /// A streaming reply comes back immediately; its producer keeps running
    /// on its own task until the backend stream ends or the caller leaves.
    ///
    /// # Errors
    /// Returns the first stage error
    pub async fn execute(&self, ctx: RequestContext, state: &AppState) -> GatewayResult<Reply> {
        let span = llm_request_span!(ctx.request_id, ctx.requested_model(), ctx.is_stream());
        self.drive(ctx, state).instrument(span).await
    }

    async fn drive(&self, mut ctx: RequestContext, state: &AppState) -> GatewayResult<Reply> {
        for stage in &self.stages {
            trace!(stage = stage.name(), "Running stage");
            if let Err(err) = stage.run(&mut ctx, state).await {
                return Err(fail(&ctx, stage.name(), err, state));
            }
        }

        let Some(reply) = ctx.reply.take() else {
            let err = GatewayError::internal("pipeline produced no reply");
            return Err(fail(&ctx, "adapt", err, state));
        };

        match ctx.producer.take() {
            Some(producer) => {
                let metrics = state.metrics.clone();
                tokio::spawn(producer.run(ctx, metrics).instrument(Span::current()));
            }
            None => {
                state.metrics.record_request(ctx.category(), ctx.provider(), "success");
                info!(
                    request_id = %ctx.request_id,
                    provider = %ctx.provider(),
                    category = ctx.category(),
                    model = %ctx.requested_model(),
                    elapsed_ms = ctx.started.elapsed().as_millis(),
                    "Request completed"
                );
            }
        }
        Ok(reply)
    }
}

fn fail(ctx: &RequestContext, stage: &'static str, err: GatewayError, state: &AppState) -> GatewayError {
    let class = err.class().as_str();
    state.metrics.record_request(ctx.category(), ctx.provider(), class);
    error!(
        request_id = %ctx.request_id,
        provider = %ctx.provider(),
        category = ctx.category(),
        model = %ctx.requested_model(),
        stage,
        class,
        error = %err,
        "Request failed"
    );
    err
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}
