use crate::events::CacheEvent;
use crate::semantic::{NoopSemanticCache, SemanticCache};
use ai_orchestrator_core::{EventListeners, FnListener, KeyValueStore};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for [`crate::MultiTierCache`] (§4.6).
pub struct CacheConfig {
    pub(crate) max_size: usize,
    pub(crate) default_ttl: Duration,
    pub(crate) cleanup_interval: Duration,
    pub(crate) key_prefix: String,
    pub(crate) l2: Arc<dyn KeyValueStore>,
    pub(crate) l3: Arc<dyn SemanticCache>,
    pub(crate) event_listeners: EventListeners<CacheEvent>,
}

/// Builder for [`CacheConfig`].
pub struct CacheConfigBuilder {
    max_size: usize,
    default_ttl: Duration,
    cleanup_interval: Duration,
    key_prefix: String,
    l2: Option<Arc<dyn KeyValueStore>>,
    l3: Arc<dyn SemanticCache>,
    event_listeners: EventListeners<CacheEvent>,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        Self {
            max_size: 10_000,
            default_ttl: Duration::from_secs(24 * 60 * 60),
            cleanup_interval: Duration::from_secs(5 * 60),
            key_prefix: String::from("ai:cache"),
            l2: None,
            l3: Arc::new(NoopSemanticCache),
            event_listeners: EventListeners::new(),
        }
    }

    /// Maximum number of L1 entries. Default: 10,000.
    pub fn max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Default TTL for entries that don't specify their own. Default: 24h.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// How often the background sweeper removes expired L1 entries.
    /// Default: 5 minutes.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Redis-style key prefix for L2 entries and invalidation channels.
    /// Default: `"ai:cache"`.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// The shared L2 store. Required.
    pub fn l2<K: KeyValueStore + 'static>(mut self, store: Arc<K>) -> Self {
        self.l2 = Some(store);
        self
    }

    /// Optional L3 semantic cache. Default: [`NoopSemanticCache`].
    pub fn l3<S: SemanticCache + 'static>(mut self, semantic: Arc<S>) -> Self {
        self.l3 = semantic;
        self
    }

    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &CacheEvent| {
            if matches!(event, CacheEvent::Hit { .. }) {
                f();
            }
        }));
        self
    }

    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &CacheEvent| {
            if matches!(event, CacheEvent::Miss { .. }) {
                f();
            }
        }));
        self
    }

    pub fn on_invalidated<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &CacheEvent| {
            if let CacheEvent::Invalidated { target, .. } = event {
                f(target);
            }
        }));
        self
    }

    /// Builds the cache.
    ///
    /// # Panics
    /// Panics if an L2 store was not set — every deployment shares one KV
    /// backend across instances (§4.6 cross-instance invalidation depends
    /// on it existing).
    pub fn build(self) -> crate::MultiTierCache {
        let l2 = self.l2.expect("l2 key-value store must be set before building");
        let config = CacheConfig {
            max_size: self.max_size,
            default_ttl: self.default_ttl,
            cleanup_interval: self.cleanup_interval,
            key_prefix: self.key_prefix,
            l2,
            l3: self.l3,
            event_listeners: self.event_listeners,
        };
        crate::MultiTierCache::new(config)
    }
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
