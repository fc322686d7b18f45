//! LRU + TTL cache of provider clients.
//!
//! At most one live client per provider name. Entries expire a fixed time
//! after insertion regardless of use; when full, the least-recently-used
//! entry is evicted.

use crate::client::ProviderClient;
use crate::registry::Provider;
use gateway_core::GatewayResult;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default number of cached clients
pub const DEFAULT_CAPACITY: usize = 10;
/// Default client lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60 * 60);
/// Default backend connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How a lookup was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// A live entry was returned
    Hit,
    /// A new client was inserted
    Miss,
    /// A new client was inserted and the LRU entry evicted
    MissWithEviction,
}

struct CacheEntry {
    client: Arc<ProviderClient>,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() < ttl
    }
}

/// Thread-safe client cache
pub struct ClientCache {
    inner: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    connect_timeout: Duration,
}

impl std::fmt::Debug for ClientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl Default for ClientCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl ClientCache {
    /// Create a cache; a zero capacity is treated as one
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the connect timeout used for new clients
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Get the live client for `provider`, creating it on a miss
    ///
    /// # Errors
    /// Returns error if a new client cannot be constructed
    pub fn get_or_create(&self, provider: &Provider) -> GatewayResult<Arc<ProviderClient>> {
        self.lookup(provider).map(|(client, _)| client)
    }

    /// Like [`ClientCache::get_or_create`], also reporting how the lookup was
    /// served.
    ///
    /// Construction happens outside the lock. If a concurrent caller inserted
    /// a live client in the meantime, that client is returned and the local
    /// one is dropped.
    ///
    /// # Errors
    /// Returns error if a new client cannot be constructed
    pub fn lookup(&self, provider: &Provider) -> GatewayResult<(Arc<ProviderClient>, CacheOutcome)> {
        let name = provider.name.as_str();

        if let Some(client) = self.live(name) {
            debug!(provider = %name, "Client cache hit");
            return Ok((client, CacheOutcome::Hit));
        }

        let created = Arc::new(ProviderClient::new(provider, self.connect_timeout)?);

        let mut cache = self.inner.lock();
        if let Some(entry) = cache.get(name) {
            if entry.is_fresh(self.ttl) {
                debug!(provider = %name, "Client created concurrently, discarding local client");
                return Ok((Arc::clone(&entry.client), CacheOutcome::Hit));
            }
        }

        let entry = CacheEntry {
            client: Arc::clone(&created),
            inserted_at: Instant::now(),
        };
        let outcome = match cache.push(name.to_string(), entry) {
            Some((evicted, _)) if evicted != name => {
                debug!(provider = %name, evicted = %evicted, "Client cache miss, evicted LRU entry");
                CacheOutcome::MissWithEviction
            }
            _ => {
                debug!(provider = %name, "Client cache miss");
                CacheOutcome::Miss
            }
        };

        Ok((created, outcome))
    }

    /// Live client for `name`, dropping it if expired
    fn live(&self, name: &str) -> Option<Arc<ProviderClient>> {
        let mut cache = self.inner.lock();
        match cache.get(name) {
            Some(entry) if entry.is_fresh(self.ttl) => return Some(Arc::clone(&entry.client)),
            Some(_) => {}
            None => return None,
        }
        debug!(provider = %name, "Client cache entry expired");
        cache.pop(name);
        None
    }

    /// Drop the client for `name`; returns whether one was cached
    pub fn invalidate(&self, name: &str) -> bool {
        self.inner.lock().pop(name).is_some()
    }

    /// Drop every client
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Number of cached clients, expired ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry lifetime
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
