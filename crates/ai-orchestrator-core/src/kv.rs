//! The key-value abstraction every stateful component (quota, rate limit,
//! L2 cache) is built on top of.
//!
//! Real deployments point this at Redis or an equivalent; tests and examples
//! use [`FakeKeyValueStore`], an in-process stand-in good enough to drive
//! every other crate's test suite, in the same spirit as the teacher's
//! in-memory `EvictionStore` implementations.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::KvError;

/// A counter increment result: the new value after the increment.
pub type IncrResult = Result<i64, KvError>;

/// Minimal Redis-shaped key-value abstraction.
///
/// Object-safe via `async_trait` so it can be held as `Arc<dyn KeyValueStore>`
/// and shared across the quota, rate-limit, and cache crates without each one
/// depending on a concrete backend.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetches a raw value, or `None` if the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    /// Sets a raw value with an optional TTL.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), KvError>;

    /// Deletes a key. Not an error if the key was already absent.
    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Atomically increments a counter, creating it at 0 first if absent, and
    /// applies `ttl` only on creation (mirrors `INCR` + `EXPIRE NX`).
    async fn incr_by(&self, key: &str, delta: i64, ttl: Option<Duration>) -> IncrResult;

    /// Atomically increments a floating-point counter (mirrors
    /// `HINCRBYFLOAT`), creating it at `0.0` first if absent, and applies
    /// `ttl` only on creation. Used by the quota and rate-limit crates for
    /// the `cost` field of a bucket counter (§4.4/§4.5) — the real backend
    /// would carry this as one field of a Redis hash alongside `requests`/
    /// `tokens`; this abstraction flattens a logical bucket into one flat
    /// key per field instead of exposing `HSET`/`HGETALL`.
    async fn incr_by_f64(&self, key: &str, delta: f64, ttl: Option<Duration>) -> Result<f64, KvError>;

    /// Adds a member with a score to a sorted set (used for the burst-window
    /// rate limiter, §4.5).
    async fn zadd(&self, key: &str, member: String, score: f64) -> Result<(), KvError>;

    /// Counts sorted-set members with score in `[min, max]`.
    async fn zcount(&self, key: &str, min: f64, max: f64) -> Result<u64, KvError>;

    /// Removes sorted-set members with score below `min` (trims the window).
    async fn zremrangebyscore(&self, key: &str, min: f64) -> Result<(), KvError>;

    /// Publishes a message on a channel (used for cross-instance cache
    /// invalidation, §4.6).
    async fn publish(&self, channel: &str, message: Vec<u8>) -> Result<(), KvError>;

    /// Subscribes to a channel, returning a receiver of raw messages.
    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<Vec<u8>>, KvError>;

    /// Deletes every key matching a glob-style pattern (used for tag/pattern
    /// invalidation, §4.6). Backends without native pattern scanning may
    /// implement this by iterating known keys.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, KvError>;

    /// Adds `member` to the set at `key` (used for `cache:tag:{tag}`
    /// membership, §3/§6.4).
    async fn sadd(&self, key: &str, member: String) -> Result<(), KvError>;

    /// Returns every member of the set at `key`, or an empty `Vec` if the
    /// key is absent or expired.
    async fn smembers(&self, key: &str) -> Result<Vec<String>, KvError>;

    /// Sets (or refreshes) a TTL on whatever `key` currently holds, mirroring
    /// Redis `EXPIRE`. A no-op if `key` is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError>;
}

struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Option<std::time::Instant>,
}

struct ZsetEntry {
    member: String,
    score: f64,
}

struct ZsetRecord {
    entries: Vec<ZsetEntry>,
    expires_at: Option<std::time::Instant>,
}

struct SetRecord {
    members: std::collections::HashSet<String>,
    expires_at: Option<std::time::Instant>,
}

/// In-process [`KeyValueStore`] backed by a `Mutex<HashMap<..>>`.
///
/// Not a mock: it implements real TTL expiry, real counters, and a real
/// sorted set, so tests exercising quota/rate-limit/cache logic against it
/// observe the same semantics a Redis-backed deployment would.
pub struct FakeKeyValueStore {
    values: Mutex<HashMap<String, StoredValue>>,
    zsets: Mutex<HashMap<String, ZsetRecord>>,
    sets: Mutex<HashMap<String, SetRecord>>,
    channels: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
}

impl FakeKeyValueStore {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            zsets: Mutex::new(HashMap::new()),
            sets: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn is_live(entry: &StoredValue) -> bool {
        match entry.expires_at {
            Some(deadline) => std::time::Instant::now() < deadline,
            None => true,
        }
    }

    fn record_is_live(expires_at: Option<std::time::Instant>) -> bool {
        match expires_at {
            Some(deadline) => std::time::Instant::now() < deadline,
            None => true,
        }
    }
}

impl Default for FakeKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for FakeKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let values = self.values.lock().unwrap();
        Ok(values
            .get(key)
            .filter(|entry| Self::is_live(entry))
            .map(|entry| entry.bytes.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), KvError> {
        let mut values = self.values.lock().unwrap();
        values.insert(
            key.to_string(),
            StoredValue {
                bytes: value,
                expires_at: ttl.map(|d| std::time::Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64, ttl: Option<Duration>) -> IncrResult {
        let mut values = self.values.lock().unwrap();
        let entry = values.entry(key.to_string()).or_insert_with(|| StoredValue {
            bytes: 0i64.to_le_bytes().to_vec(),
            expires_at: ttl.map(|d| std::time::Instant::now() + d),
        });
        let current = i64::from_le_bytes(
            entry
                .bytes
                .clone()
                .try_into()
                .map_err(|_| KvError::Unavailable("corrupt counter bytes".to_string()))?,
        );
        let updated = current + delta;
        entry.bytes = updated.to_le_bytes().to_vec();
        Ok(updated)
    }

    async fn incr_by_f64(&self, key: &str, delta: f64, ttl: Option<Duration>) -> Result<f64, KvError> {
        let mut values = self.values.lock().unwrap();
        let entry = values.entry(key.to_string()).or_insert_with(|| StoredValue {
            bytes: 0f64.to_le_bytes().to_vec(),
            expires_at: ttl.map(|d| std::time::Instant::now() + d),
        });
        let current = f64::from_le_bytes(
            entry
                .bytes
                .clone()
                .try_into()
                .map_err(|_| KvError::Unavailable("corrupt float counter bytes".to_string()))?,
        );
        let updated = current + delta;
        entry.bytes = updated.to_le_bytes().to_vec();
        Ok(updated)
    }

    async fn zadd(&self, key: &str, member: String, score: f64) -> Result<(), KvError> {
        let mut zsets = self.zsets.lock().unwrap();
        let record = zsets.entry(key.to_string()).or_insert_with(|| ZsetRecord {
            entries: Vec::new(),
            expires_at: None,
        });
        if !Self::record_is_live(record.expires_at) {
            record.entries.clear();
            record.expires_at = None;
        }
        record.entries.retain(|entry| entry.member != member);
        record.entries.push(ZsetEntry { member, score });
        Ok(())
    }

    async fn zcount(&self, key: &str, min: f64, max: f64) -> Result<u64, KvError> {
        let zsets = self.zsets.lock().unwrap();
        let count = zsets
            .get(key)
            .filter(|record| Self::record_is_live(record.expires_at))
            .map(|record| {
                record
                    .entries
                    .iter()
                    .filter(|entry| entry.score >= min && entry.score <= max)
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn zremrangebyscore(&self, key: &str, min: f64) -> Result<(), KvError> {
        let mut zsets = self.zsets.lock().unwrap();
        if let Some(record) = zsets.get_mut(key) {
            record.entries.retain(|entry| entry.score >= min);
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, message: Vec<u8>) -> Result<(), KvError> {
        let channels = self.channels.lock().unwrap();
        if let Some(sender) = channels.get(channel) {
            let _ = sender.send(message);
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<Vec<u8>>, KvError> {
        let mut channels = self.channels.lock().unwrap();
        let sender = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(64).0);
        Ok(sender.subscribe())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, KvError> {
        let prefix = pattern.trim_end_matches('*');
        let mut values = self.values.lock().unwrap();
        let to_remove: Vec<String> = values
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        for key in &to_remove {
            values.remove(key);
        }
        Ok(to_remove.len() as u64)
    }

    async fn sadd(&self, key: &str, member: String) -> Result<(), KvError> {
        let mut sets = self.sets.lock().unwrap();
        let record = sets.entry(key.to_string()).or_insert_with(|| SetRecord {
            members: std::collections::HashSet::new(),
            expires_at: None,
        });
        if !Self::record_is_live(record.expires_at) {
            record.members.clear();
            record.expires_at = None;
        }
        record.members.insert(member);
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, KvError> {
        let sets = self.sets.lock().unwrap();
        Ok(sets
            .get(key)
            .filter(|record| Self::record_is_live(record.expires_at))
            .map(|record| record.members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let deadline = std::time::Instant::now() + ttl;
        if let Some(entry) = self.values.lock().unwrap().get_mut(key) {
            entry.expires_at = Some(deadline);
        }
        if let Some(record) = self.zsets.lock().unwrap().get_mut(key) {
            record.expires_at = Some(deadline);
        }
        if let Some(record) = self.sets.lock().unwrap().get_mut(key) {
            record.expires_at = Some(deadline);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_set_delete_round_trip() {
        let store = FakeKeyValueStore::new();
        store.set("a", b"hello".to_vec(), None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(b"hello".to_vec()));
        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn ttl_expires_values() {
        let store = FakeKeyValueStore::new();
        store
            .set("a", b"hello".to_vec(), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_by_accumulates() {
        let store = FakeKeyValueStore::new();
        assert_eq!(store.incr_by("c", 1, None).await.unwrap(), 1);
        assert_eq!(store.incr_by("c", 4, None).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn incr_by_f64_accumulates() {
        let store = FakeKeyValueStore::new();
        assert!((store.incr_by_f64("cost", 0.015, None).await.unwrap() - 0.015).abs() < f64::EPSILON);
        assert!((store.incr_by_f64("cost", 0.005, None).await.unwrap() - 0.02).abs() < 1e-9);
    }

    #[tokio::test]
    async fn zset_counts_within_score_range() {
        let store = FakeKeyValueStore::new();
        store.zadd("burst", "req-1".into(), 10.0).await.unwrap();
        store.zadd("burst", "req-2".into(), 20.0).await.unwrap();
        store.zadd("burst", "req-3".into(), 30.0).await.unwrap();
        assert_eq!(store.zcount("burst", 15.0, 30.0).await.unwrap(), 2);
        store.zremrangebyscore("burst", 20.0).await.unwrap();
        assert_eq!(store.zcount("burst", 0.0, 100.0).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn publish_subscribe_delivers_message() {
        let store = FakeKeyValueStore::new();
        let mut receiver = store.subscribe("invalidation").await.unwrap();
        store
            .publish("invalidation", b"cache-key-123".to_vec())
            .await
            .unwrap();
        let message = receiver.recv().await.unwrap();
        assert_eq!(message, b"cache-key-123");
    }

    #[tokio::test]
    async fn delete_pattern_removes_matching_keys() {
        let store = FakeKeyValueStore::new();
        store.set("cache:a:1", b"x".to_vec(), None).await.unwrap();
        store.set("cache:a:2", b"x".to_vec(), None).await.unwrap();
        store.set("cache:b:1", b"x".to_vec(), None).await.unwrap();
        let removed = store.delete_pattern("cache:a:*").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get("cache:b:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sadd_smembers_round_trip() {
        let store = FakeKeyValueStore::new();
        store.sadd("cache:tag:greeting", "k1".into()).await.unwrap();
        store.sadd("cache:tag:greeting", "k2".into()).await.unwrap();
        store.sadd("cache:tag:greeting", "k1".into()).await.unwrap();

        let mut members = store.smembers("cache:tag:greeting").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["k1".to_string(), "k2".to_string()]);
    }

    #[tokio::test]
    async fn expire_applies_ttl_to_a_set() {
        let store = FakeKeyValueStore::new();
        store.sadd("cache:tag:greeting", "k1".into()).await.unwrap();
        store.expire("cache:tag:greeting", Duration::from_millis(10)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.smembers("cache:tag:greeting").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expire_applies_ttl_to_a_zset() {
        let store = FakeKeyValueStore::new();
        store.zadd("burst", "req-1".into(), 10.0).await.unwrap();
        store.expire("burst", Duration::from_millis(10)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.zcount("burst", 0.0, 100.0).await.unwrap(), 0);
    }
}
