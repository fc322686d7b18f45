//! Shared application state.

use crate::pipeline::Pipeline;
use gateway_config::GatewayConfig;
use gateway_core::{GatewayError, GatewayResult};
use gateway_providers::{ClientCache, ProviderRegistry};
use gateway_routing::{Router, RoutingRules};
use gateway_telemetry::{Metrics, MetricsConfig};
use std::sync::Arc;
use tracing::{info, warn};

/// State injected into every handler. Built once at startup; only the
/// client cache mutates afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Configuration snapshot
    pub config: Arc<GatewayConfig>,
    /// Router over the provider registry
    pub router: Arc<Router>,
    /// Backend client cache
    pub clients: Arc<ClientCache>,
    /// Metrics
    pub metrics: Metrics,
    /// Request pipeline
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Assemble state from its parts
    #[must_use]
    pub fn new(config: GatewayConfig, router: Router, clients: ClientCache, metrics: Metrics) -> Self {
        let pipeline = Pipeline::for_router(&router);
        Self {
            config: Arc::new(config),
            router: Arc::new(router),
            clients: Arc::new(clients),
            metrics,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Build registry, router, client cache and metrics from `config`
    ///
    /// # Errors
    /// Returns error if a provider or routing rule is invalid
    pub fn from_config(config: GatewayConfig) -> GatewayResult<Self> {
        let registry = Arc::new(ProviderRegistry::from_config(&config)?);
        let rules = RoutingRules::from_config(&config.router)?;
        let router = Router::new(registry, rules);

        if router.registry().is_empty() {
            warn!("No providers configured, every request will fail");
        } else if router.is_degraded() {
            info!("Routing rules incomplete, all requests use the default route");
        }

        let clients = ClientCache::new(config.client_cache.capacity, config.client_cache.ttl())
            .with_connect_timeout(config.connect_timeout());
        let metrics = Metrics::new(&MetricsConfig::default())
            .map_err(|e| GatewayError::internal(format!("failed to register metrics: {e}")))?;

        info!(
            providers = router.registry().len(),
            degraded = router.is_degraded(),
            cache_capacity = config.client_cache.capacity,
            "Application state initialized"
        );
        Ok(Self::new(config, router, clients, metrics))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("router", &self.router)
            .field("pipeline", &self.pipeline.stage_names())
            .finish_non_exhaustive()
    }
}
