//! Prometheus metrics.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Metrics configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Metric name prefix
    pub namespace: String,
    /// Backend latency buckets in seconds
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: "claude_router".to_string(),
            latency_buckets: vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0],
        }
    }
}

/// Gateway metrics, owning their registry
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    backend_latency: HistogramVec,
    stream_truncations: IntCounterVec,
    client_cache: IntCounterVec,
    active_streams: IntGauge,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create and register all metrics
    ///
    /// # Errors
    /// Returns error if a metric cannot be registered
    pub fn new(config: &MetricsConfig) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let ns = config.namespace.as_str();

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Requests by category, provider and outcome").namespace(ns),
            &["category", "provider", "outcome"],
        )?;
        let backend_latency = HistogramVec::new(
            HistogramOpts::new(
                "backend_latency_seconds",
                "Time until the backend answered or the stream opened",
            )
            .namespace(ns)
            .buckets(config.latency_buckets.clone()),
            &["provider", "stream"],
        )?;
        let stream_truncations = IntCounterVec::new(
            Opts::new(
                "stream_truncations_total",
                "Backend streams that ended without a terminal signal",
            )
            .namespace(ns),
            &["provider"],
        )?;
        let client_cache = IntCounterVec::new(
            Opts::new("client_cache_events_total", "Client cache hits, misses and evictions")
                .namespace(ns),
            &["event"],
        )?;
        let active_streams = IntGauge::with_opts(
            Opts::new("active_streams", "Streaming responses in flight").namespace(ns),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(backend_latency.clone()))?;
        registry.register(Box::new(stream_truncations.clone()))?;
        registry.register(Box::new(client_cache.clone()))?;
        registry.register(Box::new(active_streams.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            backend_latency,
            stream_truncations,
            client_cache,
            active_streams,
        })
    }

    /// Count a finished request; `outcome` is "success" or an error class
    pub fn record_request(&self, category: &str, provider: &str, outcome: &str) {
        self.requests_total
            .with_label_values(&[category, provider, outcome])
            .inc();
    }

    /// Observe backend latency
    pub fn observe_backend_latency(&self, provider: &str, stream: bool, seconds: f64) {
        let stream = if stream { "true" } else { "false" };
        self.backend_latency
            .with_label_values(&[provider, stream])
            .observe(seconds);
    }

    /// Count a truncated stream
    pub fn record_truncation(&self, provider: &str) {
        self.stream_truncations.with_label_values(&[provider]).inc();
    }

    /// Count a client cache event ("hit", "miss", "eviction")
    pub fn record_cache_event(&self, event: &str) {
        self.client_cache.with_label_values(&[event]).inc();
    }

    /// A streaming response started
    pub fn stream_started(&self) {
        self.active_streams.inc();
    }

    /// A streaming response finished
    pub fn stream_finished(&self) {
        self.active_streams.dec();
    }

    /// Render in the Prometheus text format
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
