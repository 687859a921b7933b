//! L1 in-process cache store: `map[cacheKey] -> entry` plus an LRU access
//! list, per §4.6.

use crate::eviction::{EvictionStore, LruStore};
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct CacheEntry {
    value: String,
    ttl: Option<Duration>,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.inserted_at.elapsed() > ttl,
            None => false,
        }
    }
}

/// In-process L1 tier. One instance is shared (behind a `Mutex`) by every
/// call into [`crate::MultiTierCache`].
pub(crate) struct L1Store {
    store: Box<dyn EvictionStore<String, CacheEntry>>,
    max_size: usize,
}

impl L1Store {
    pub(crate) fn new(max_size: usize) -> Self {
        Self {
            store: Box::new(LruStore::new(max_size)),
            max_size,
        }
    }

    /// Looks up `key`. A TTL-expired hit is treated as a miss and removed.
    pub(crate) fn get(&mut self, key: &str) -> Option<String> {
        let expired = matches!(self.store.get(&key.to_string()), Some(entry) if entry.is_expired());
        if expired {
            self.store.remove(&key.to_string());
            return None;
        }
        self.store.get(&key.to_string()).map(|entry| entry.value.clone())
    }

    /// Inserts/overwrites `key`. Returns `true` if inserting this entry
    /// evicted another one (the cache was already at `max_size`).
    pub(crate) fn insert(&mut self, key: String, value: String, ttl: Option<Duration>) -> bool {
        let was_full = self.store.len() >= self.max_size && self.store.get(&key).is_none();
        let entry = CacheEntry {
            value,
            ttl,
            inserted_at: Instant::now(),
        };
        self.store.insert(key, entry);
        was_full
    }

    pub(crate) fn remove(&mut self, key: &str) {
        self.store.remove(&key.to_string());
    }

    /// Substring match against logical keys, per §4.6's `InvalidateByPattern`.
    pub(crate) fn remove_matching(&mut self, pattern: &str) -> usize {
        let matches: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|k| k.contains(pattern))
            .collect();
        for key in &matches {
            self.store.remove(key);
        }
        matches.len()
    }

    pub(crate) fn clear(&mut self) {
        self.store.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.store.len()
    }

    /// Drops every entry whose TTL has elapsed. Used by the background
    /// sweeper (§4.6, default every 5 minutes).
    pub(crate) fn sweep_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|k| matches!(self.store.get(k), Some(entry) if entry.is_expired()))
            .collect();
        for key in &expired {
            self.store.remove(key);
        }
        expired.len()
    }
}
