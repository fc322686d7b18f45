//! Client cache integration tests
//!
//! Hit, miss and eviction behavior observed through the gateway's metrics,
//! plus concurrent lookups against the cache directly.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_config::{GatewayConfig, ProviderConfig};
use gateway_providers::{CacheOutcome, ClientCache, Provider};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn cache_count(metrics: &str, event: &str) -> u64 {
    let prefix = format!(r#"claude_router_client_cache_events_total{{event="{event}"}} "#);
    metrics
        .lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

async fn gateway_with_cache(cache: serde_json::Value) -> (MockBackend, TestGateway) {
    let backend = MockBackend::new().await;
    for prefix in [DEFAULT_PREFIX, FAST_PREFIX, BIG_PREFIX] {
        backend.mock_completion(prefix, "cached").await;
    }
    let mut config = config_json(&backend.url(), routing_rules());
    config["CLIENT_CACHE"] = cache;
    let config = GatewayConfig::from_json(&config.to_string()).expect("config");
    let gateway = TestGateway::start(config).await;
    (backend, gateway)
}

fn provider(name: &str) -> Provider {
    Provider::from_config(&ProviderConfig::new(
        name,
        format!("http://127.0.0.1:1/{name}/v1"),
        "sk-test",
        vec!["m".to_string()],
    ))
    .expect("provider")
}

#[tokio::test]
async fn test_client_reused_across_requests() {
    let (_backend, gateway) = gateway_with_cache(json!({})).await;

    for i in 0..3 {
        let response = gateway.messages(&messages_request(CLAUDE_MODEL, &format!("q{i}"))).await;
        assert_status(&response, 200);
    }

    let metrics = gateway.metrics();
    assert_eq!(cache_count(&metrics, "miss"), 1);
    assert_eq!(cache_count(&metrics, "hit"), 2);
    assert_eq!(gateway.state.clients.len(), 1);
}

#[tokio::test]
async fn test_one_client_per_provider() {
    let (_backend, gateway) = gateway_with_cache(json!({})).await;

    gateway.messages(&messages_request(CLAUDE_MODEL, "a")).await;
    gateway.messages(&messages_request(HAIKU_MODEL, "b")).await;
    gateway.messages(&long_context_request(CLAUDE_MODEL)).await;
    gateway.messages(&messages_request(HAIKU_MODEL, "c")).await;

    let metrics = gateway.metrics();
    assert_eq!(cache_count(&metrics, "miss"), 3);
    assert_eq!(cache_count(&metrics, "hit"), 1);
    assert_eq!(gateway.state.clients.len(), 3);
}

#[tokio::test]
async fn test_capacity_evicts_least_recently_used() {
    let (backend, gateway) = gateway_with_cache(json!({"capacity": 1})).await;

    for body in [
        messages_request(CLAUDE_MODEL, "default"),
        messages_request(HAIKU_MODEL, "fast"),
        messages_request(CLAUDE_MODEL, "default again"),
    ] {
        assert_status(&gateway.messages(&body).await, 200);
    }

    let metrics = gateway.metrics();
    assert_eq!(cache_count(&metrics, "miss"), 3);
    assert_eq!(cache_count(&metrics, "eviction"), 2);
    assert_eq!(cache_count(&metrics, "hit"), 0);
    assert_eq!(gateway.state.clients.len(), 1);
    // eviction never affects correctness
    assert_eq!(backend.calls(DEFAULT_PREFIX).await, 2);
    assert_eq!(backend.calls(FAST_PREFIX).await, 1);
}

#[tokio::test]
async fn test_expired_clients_are_rebuilt() {
    let (_backend, gateway) = gateway_with_cache(json!({"ttl_secs": 0})).await;

    for _ in 0..2 {
        assert_status(&gateway.messages(&messages_request(CLAUDE_MODEL, "hi")).await, 200);
    }

    let metrics = gateway.metrics();
    assert_eq!(cache_count(&metrics, "miss"), 2);
    assert_eq!(cache_count(&metrics, "hit"), 0);
}

#[tokio::test]
async fn test_invalidate_forces_rebuild() {
    let (_backend, gateway) = gateway_with_cache(json!({})).await;

    assert_status(&gateway.messages(&messages_request(CLAUDE_MODEL, "one")).await, 200);
    assert!(gateway.state.clients.invalidate("default"));
    assert_status(&gateway.messages(&messages_request(CLAUDE_MODEL, "two")).await, 200);

    assert_eq!(cache_count(&gateway.metrics(), "miss"), 2);
}

#[test]
fn test_concurrent_lookups_share_one_client() {
    let cache = Arc::new(ClientCache::new(4, Duration::from_secs(60)));
    let provider = Arc::new(provider("shared"));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let provider = Arc::clone(&provider);
            std::thread::spawn(move || cache.lookup(&provider).expect("lookup"))
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();

    let first = &results[0].0;
    assert!(results.iter().all(|(client, _)| Arc::ptr_eq(client, first)));
    let misses = results
        .iter()
        .filter(|(_, outcome)| *outcome != CacheOutcome::Hit)
        .count();
    assert_eq!(misses, 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_eviction_order_follows_use() {
    let cache = ClientCache::new(2, Duration::from_secs(60));
    let (a, b, c) = (provider("a"), provider("b"), provider("c"));

    cache.lookup(&a).expect("a");
    cache.lookup(&b).expect("b");
    // touching `a` makes `b` the eviction candidate
    assert_eq!(cache.lookup(&a).expect("a").1, CacheOutcome::Hit);
    assert_eq!(cache.lookup(&c).expect("c").1, CacheOutcome::MissWithEviction);

    assert_eq!(cache.lookup(&a).expect("a").1, CacheOutcome::Hit);
    assert_eq!(cache.lookup(&b).expect("b").1, CacheOutcome::MissWithEviction);
}
