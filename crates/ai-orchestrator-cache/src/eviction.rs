//! L1 in-process eviction backend.
//!
//! The teacher offers `Lru`/`Lfu`/`Fifo` behind a shared [`EvictionStore`]
//! trait. Nothing in this cache needs anything but LRU (§4.6), so only the
//! `Lru` arm survives here — the trait is kept anyway because it is the seam
//! a second backend would plug into, not because anything currently
//! implements it twice.

use std::hash::Hash;
use std::num::NonZeroUsize;

/// Trait for L1 cache storage implementations.
pub(crate) trait EvictionStore<K, V>: Send {
    fn get(&mut self, key: &K) -> Option<&V>;
    fn insert(&mut self, key: K, value: V) -> Option<(K, V)>;
    fn remove(&mut self, key: &K) -> Option<V>;
    fn len(&self) -> usize;
    fn clear(&mut self);
    /// Keys currently held, oldest-access-first is not guaranteed.
    fn keys(&self) -> Vec<K>;
}

/// LRU (Least Recently Used) cache storage, backed by the `lru` crate.
pub(crate) struct LruStore<K, V> {
    cache: lru::LruCache<K, V>,
}

impl<K: Hash + Eq, V> LruStore<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(10_000).unwrap());
        Self {
            cache: lru::LruCache::new(cap),
        }
    }
}

impl<K: Hash + Eq + Clone + Send, V: Send> EvictionStore<K, V> for LruStore<K, V> {
    fn get(&mut self, key: &K) -> Option<&V> {
        self.cache.get(key)
    }

    fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.cache.push(key, value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.cache.pop(key)
    }

    fn len(&self) -> usize {
        self.cache.len()
    }

    fn clear(&mut self) {
        self.cache.clear();
    }

    fn keys(&self) -> Vec<K> {
        self.cache.iter().map(|(k, _)| k.clone()).collect()
    }
}
