//! Multi-tier response cache for the AI request orchestrator (§4.6, C9).
//!
//! Three tiers are consulted in order on read:
//! 1. **L1** — in-process LRU map, checked and promoted-into synchronously.
//! 2. **L2** — a shared [`ai_orchestrator_core::KeyValueStore`]; a hit here
//!    is promoted back into L1.
//! 3. **L3** — an optional pluggable [`SemanticCache`]; the default
//!    [`NoopSemanticCache`] always misses.
//!
//! Writes go to L1 and L2 (and L3 if supplied). Invalidation fans out across
//! all three tiers and, if a pub/sub channel is available on the L2 store,
//! publishes to sibling cache instances so they invalidate their own L1.
//!
//! ## Feature Flags
//! - `metrics`: hit/miss/eviction counters via the `metrics` crate
//! - `tracing`: invalidation and sweep logging via the `tracing` crate

mod config;
mod error;
mod events;
mod eviction;
mod invalidation;
mod semantic;
mod store;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use error::CacheError;
pub use events::{CacheEvent, CacheTier, InvalidationKind};
pub use invalidation::InvalidationRule;
pub use semantic::{NoopSemanticCache, SemanticCache};

use ai_orchestrator_core::KeyValueStore;
use invalidation::{ScheduledInvalidation, MAX_CASCADE_DEPTH, RULES_KEY, SCHEDULE_KEY};
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use store::L1Store;

/// TTL applied to `cache:tag:{tag}` membership sets, so a tag outlives the
/// entries it was attached to at set-time without growing unbounded (§6.4).
const TAG_SET_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct InvalidationMessage {
    #[serde(rename = "type")]
    kind: MessageKind,
    target: String,
    source: String,
    reason: Option<String>,
    /// Cache keys carried by a [`MessageKind::Tag`] message — the tag's
    /// membership as read from `cache:tag:{tag}` at publish time, so
    /// siblings don't need their own round-trip to L2 to resolve it (§4.6).
    #[serde(default)]
    members: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
enum MessageKind {
    Key,
    Tag,
    Pattern,
    Clear,
}

/// The multi-tier cache (§4.6).
pub struct MultiTierCache {
    l1: Mutex<L1Store>,
    config: CacheConfig,
    instance_id: String,
}

impl MultiTierCache {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    pub(crate) fn new(config: CacheConfig) -> Self {
        Self {
            l1: Mutex::new(L1Store::new(config.max_size)),
            config,
            instance_id: ai_orchestrator_core::new_request_id(),
        }
    }

    /// `sha256(trim(lowercase(prompt))) || ":" || model`, per §4.6.
    pub fn cache_key(prompt: &str, model: &str) -> String {
        let normalized = prompt.trim().to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        let digest = hasher.finalize();
        format!("{:x}:{}", digest, model)
    }

    /// Maps a logical `cache_key` (`"{hash}:{model}"`) to its L2 storage key,
    /// `ai:cache:{model}:{hash}` per §6's key-space table — model-first so a
    /// per-model pattern invalidation is a plain prefix match.
    fn l2_key(&self, cache_key: &str) -> String {
        match cache_key.split_once(':') {
            Some((hash, model)) => format!("{}:{}:{}", self.config.key_prefix, model, hash),
            None => format!("{}:{}", self.config.key_prefix, cache_key),
        }
    }

    /// `cache:tag:{tag}` — the KV set holding every L2 key tagged with `tag`
    /// (§3, §6.4).
    fn tag_key(&self, tag: &str) -> String {
        format!("{}:tag:{}", self.config.key_prefix, tag)
    }

    /// Looks up `prompt`/`model`, trying L1, then L2 (promoting on hit),
    /// then L3.
    pub async fn get(&self, prompt: &str, model: &str) -> Result<Option<String>, CacheError> {
        let key = Self::cache_key(prompt, model);

        if let Some(value) = self.l1.lock().unwrap().get(&key) {
            self.emit_hit(&key, CacheTier::L1);
            return Ok(Some(value));
        }

        if let Some(bytes) = self.config.l2.get(&self.l2_key(&key)).await? {
            let value = String::from_utf8_lossy(&bytes).into_owned();
            self.l1.lock().unwrap().insert(key.clone(), value.clone(), Some(self.config.default_ttl));
            self.emit_hit(&key, CacheTier::L2);
            return Ok(Some(value));
        }

        if let Some(value) = self.config.l3.lookup(prompt, model, 0.92).await? {
            self.emit_hit(&key, CacheTier::L3);
            return Ok(Some(value));
        }

        self.config.event_listeners.emit(&CacheEvent::Miss {
            key,
            timestamp: Instant::now(),
        });
        Ok(None)
    }

    fn emit_hit(&self, key: &str, tier: CacheTier) {
        self.config.event_listeners.emit(&CacheEvent::Hit {
            key: key.to_string(),
            tier,
            timestamp: Instant::now(),
        });
        #[cfg(feature = "metrics")]
        metrics::counter!("cache_hits_total", "tier" => match tier {
            CacheTier::L1 => "l1",
            CacheTier::L2 => "l2",
            CacheTier::L3 => "l3",
        })
        .increment(1);
    }

    /// Writes `response` to L1, L2, and (if configured) L3, and records
    /// `key` as a member of each tag in `tags` (§3, §6.4).
    pub async fn set(
        &self,
        prompt: &str,
        model: &str,
        response: &str,
        ttl: Option<Duration>,
        tags: &[String],
    ) -> Result<(), CacheError> {
        let key = Self::cache_key(prompt, model);
        let ttl = ttl.unwrap_or(self.config.default_ttl);

        let evicted = self.l1.lock().unwrap().insert(key.clone(), response.to_string(), Some(ttl));
        self.config
            .l2
            .set(&self.l2_key(&key), response.as_bytes().to_vec(), Some(ttl))
            .await?;
        self.config.l3.store(prompt, response, model).await?;

        for tag in tags {
            let tag_key = self.tag_key(tag);
            self.config.l2.sadd(&tag_key, key.clone()).await?;
            self.config.l2.expire(&tag_key, TAG_SET_TTL).await?;
        }

        self.config.event_listeners.emit(&CacheEvent::Write {
            key: key.clone(),
            timestamp: Instant::now(),
        });
        if evicted {
            self.config.event_listeners.emit(&CacheEvent::Eviction {
                key,
                timestamp: Instant::now(),
            });
            #[cfg(feature = "metrics")]
            metrics::counter!("cache_evictions_total").increment(1);
        }
        Ok(())
    }

    /// Deletes `key` from L1 and L2, calls L3's invalidate (a no-op unless
    /// L3 tracks entries by key), then fans the invalidation out to sibling
    /// instances.
    pub async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.l1.lock().unwrap().remove(key);
        self.config.l2.delete(&self.l2_key(key)).await?;
        self.publish_invalidation(MessageKind::Key, key, None, Vec::new()).await?;
        self.emit_invalidated(key, InvalidationKind::Key);
        Ok(())
    }

    /// Deletes every key containing `pattern`, in both tiers.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let l1_removed = self.l1.lock().unwrap().remove_matching(pattern);
        let l2_pattern = format!("{}:*{}*", self.config.key_prefix, pattern);
        let l2_removed = self.config.l2.delete_pattern(&l2_pattern).await?;
        self.publish_invalidation(MessageKind::Pattern, pattern, None, Vec::new()).await?;
        self.emit_invalidated(pattern, InvalidationKind::Pattern);
        Ok(l1_removed as u64 + l2_removed)
    }

    /// Deletes every cache key that was tagged with `tag` at write time, by
    /// reading its membership from `cache:tag:{tag}` (§3, §4.6, §6.4).
    pub async fn invalidate_by_tag(&self, tag: &str) -> Result<u64, CacheError> {
        let tag_key = self.tag_key(tag);
        let members = self.config.l2.smembers(&tag_key).await?;
        for key in &members {
            self.l1.lock().unwrap().remove(key);
            self.config.l2.delete(&self.l2_key(key)).await?;
        }
        self.config.l2.delete(&tag_key).await?;
        self.publish_invalidation(MessageKind::Tag, tag, None, members.clone()).await?;
        self.emit_invalidated(tag, InvalidationKind::Tag);
        Ok(members.len() as u64)
    }

    /// Clears every entry this cache owns.
    pub async fn clear_all(&self) -> Result<(), CacheError> {
        self.l1.lock().unwrap().clear();
        let pattern = format!("{}:*", self.config.key_prefix);
        self.config.l2.delete_pattern(&pattern).await?;
        self.publish_invalidation(MessageKind::Clear, "*", None, Vec::new()).await?;
        self.emit_invalidated("*", InvalidationKind::Clear);
        Ok(())
    }

    fn emit_invalidated(&self, target: &str, kind: InvalidationKind) {
        self.config.event_listeners.emit(&CacheEvent::Invalidated {
            target: target.to_string(),
            kind,
            source: self.instance_id.clone(),
            timestamp: Instant::now(),
        });
    }

    async fn publish_invalidation(
        &self,
        kind: MessageKind,
        target: &str,
        reason: Option<String>,
        members: Vec<String>,
    ) -> Result<(), CacheError> {
        let message = InvalidationMessage {
            kind,
            target: target.to_string(),
            source: self.instance_id.clone(),
            reason,
            members,
        };
        let bytes = serde_json::to_vec(&message)?;
        self.config.l2.publish("cache:invalidation", bytes).await?;
        Ok(())
    }

    /// Subscribes to the `cache:invalidation` channel and applies every
    /// message from a different instance to this cache's local tiers.
    /// Messages whose `source` equals this instance are ignored (§4.6's
    /// self-source de-duplication).
    pub async fn listen_for_invalidations(&self) -> Result<(), CacheError> {
        let mut receiver = self.config.l2.subscribe("cache:invalidation").await?;
        loop {
            let raw = match receiver.recv().await {
                Ok(raw) => raw,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return Ok(()),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            };
            let Ok(message) = serde_json::from_slice::<InvalidationMessage>(&raw) else {
                continue;
            };
            if message.source == self.instance_id {
                continue;
            }
            match message.kind {
                MessageKind::Key => {
                    self.l1.lock().unwrap().remove(&message.target);
                }
                MessageKind::Tag => {
                    let mut l1 = self.l1.lock().unwrap();
                    for key in &message.members {
                        l1.remove(key);
                    }
                }
                MessageKind::Pattern => {
                    self.l1.lock().unwrap().remove_matching(&message.target);
                }
                MessageKind::Clear => {
                    self.l1.lock().unwrap().clear();
                }
            }
        }
    }

    /// Registers a tag-dependency rule under `cache:invalidation:rules`.
    pub async fn set_invalidation_rule(&self, source_key: &str, rule: InvalidationRule) -> Result<(), CacheError> {
        let mut rules = self.load_rules().await?;
        rules.insert(source_key.to_string(), rule);
        self.config.l2.set(RULES_KEY, serde_json::to_vec(&rules)?, None).await?;
        Ok(())
    }

    async fn load_rules(&self) -> Result<invalidation::RuleSet, CacheError> {
        match self.config.l2.get(RULES_KEY).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Default::default()),
        }
    }

    /// Walks the tag-dependency rule set and invalidates everything that
    /// depends on `source_key`, cascading up to [`MAX_CASCADE_DEPTH`] levels
    /// deep (§4.6).
    pub async fn invalidate_dependents(&self, source_key: &str) -> Result<(), CacheError> {
        let rules = self.load_rules().await?;
        self.invalidate_dependents_at_depth(source_key, &rules, 0).await
    }

    fn invalidate_dependents_at_depth<'a>(
        &'a self,
        source_key: &'a str,
        rules: &'a invalidation::RuleSet,
        depth: usize,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), CacheError>> + Send + 'a>> {
        Box::pin(async move {
            if depth >= MAX_CASCADE_DEPTH {
                return Ok(());
            }
            for rule in rules.values() {
                if !rule.dependencies.iter().any(|dep| dep == source_key) {
                    continue;
                }
                if rule.pattern.contains('*') {
                    self.invalidate_by_pattern(&rule.pattern.replace('*', "")).await?;
                } else {
                    self.invalidate(&rule.pattern).await?;
                }
                if rule.cascade {
                    self.invalidate_dependents_at_depth(&rule.pattern, rules, depth + 1).await?;
                }
            }
            Ok(())
        })
    }

    /// Schedules `key` for invalidation at `due_at` (Unix seconds).
    pub async fn schedule_invalidation(&self, key: &str, due_at: i64, reason: Option<String>) -> Result<(), CacheError> {
        let mut schedule = self.load_schedule().await?;
        schedule.push(ScheduledInvalidation {
            key: key.to_string(),
            reason,
            source: self.instance_id.clone(),
            due_at,
        });
        self.config.l2.set(SCHEDULE_KEY, serde_json::to_vec(&schedule)?, None).await?;
        Ok(())
    }

    async fn load_schedule(&self) -> Result<Vec<ScheduledInvalidation>, CacheError> {
        match self.config.l2.get(SCHEDULE_KEY).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Pops every due entry from the invalidation schedule and invalidates
    /// it. Intended to be called on a 60s tick (§4.6).
    pub async fn tick_scheduled_invalidation(&self) -> Result<usize, CacheError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
        let schedule = self.load_schedule().await?;
        let (due, remaining): (Vec<_>, Vec<_>) = schedule.into_iter().partition(|entry| entry.due_at <= now);

        for entry in &due {
            self.invalidate(&entry.key).await?;
        }
        self.config.l2.set(SCHEDULE_KEY, serde_json::to_vec(&remaining)?, None).await?;
        Ok(due.len())
    }

    /// Removes expired L1 entries. Intended to be called on a
    /// `cleanup_interval` tick (default 5 minutes).
    pub fn sweep_l1(&self) -> usize {
        self.l1.lock().unwrap().sweep_expired()
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.config.cleanup_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_orchestrator_core::FakeKeyValueStore;
    use std::sync::Arc;

    fn cache() -> MultiTierCache {
        MultiTierCache::builder().l2(Arc::new(FakeKeyValueStore::new())).build()
    }

    #[tokio::test]
    async fn miss_then_hit_after_set() {
        let cache = cache();
        assert_eq!(cache.get("Hello world", "gpt-4").await.unwrap(), None);
        cache.set("Hello world", "gpt-4", "hi there", None, &[]).await.unwrap();
        assert_eq!(cache.get("hello world", "gpt-4").await.unwrap(), Some("hi there".to_string()));
    }

    #[tokio::test]
    async fn l2_hit_promotes_into_l1() {
        let kv = Arc::new(FakeKeyValueStore::new());
        let cache = MultiTierCache::builder().l2(Arc::clone(&kv)).build();
        cache.set("prompt", "gpt-4", "answer", None, &[]).await.unwrap();

        let fresh = MultiTierCache::builder().l2(kv).build();
        assert_eq!(fresh.get("prompt", "gpt-4").await.unwrap(), Some("answer".to_string()));
    }

    #[tokio::test]
    async fn invalidate_removes_from_both_tiers() {
        let cache = cache();
        cache.set("prompt", "gpt-4", "answer", None, &[]).await.unwrap();
        let key = MultiTierCache::cache_key("prompt", "gpt-4");
        cache.invalidate(&key).await.unwrap();
        assert_eq!(cache.get("prompt", "gpt-4").await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalidate_by_pattern_matches_model_prefix() {
        let cache = cache();
        cache.set("a", "gpt-4", "1", None, &[]).await.unwrap();
        cache.set("b", "gpt-4", "2", None, &[]).await.unwrap();
        cache.set("c", "claude-3", "3", None, &[]).await.unwrap();

        let removed = cache.invalidate_by_pattern("gpt-4").await.unwrap();
        assert!(removed >= 2);
        assert_eq!(cache.get("a", "gpt-4").await.unwrap(), None);
        assert_eq!(cache.get("c", "claude-3").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn cascading_tag_dependency_invalidates_dependents() {
        let cache = cache();
        cache.set("listing", "gpt-4", "page1", None, &[]).await.unwrap();
        let listing_key = MultiTierCache::cache_key("listing", "gpt-4");

        cache.set("summary prompt", "gpt-4", "summary text", None, &[]).await.unwrap();
        let summary_key = MultiTierCache::cache_key("summary prompt", "gpt-4");

        // The rule's pattern is the dependent's real (hashed) cache key — a
        // human-readable label like "summary" can never match a sha256 key,
        // so a rule keyed that way would silently never fire.
        cache
            .set_invalidation_rule(
                &listing_key,
                InvalidationRule {
                    pattern: summary_key.clone(),
                    dependencies: vec![listing_key.clone()],
                    cascade: false,
                },
            )
            .await
            .unwrap();

        cache.invalidate_dependents(&listing_key).await.unwrap();
        assert_eq!(cache.get("summary prompt", "gpt-4").await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalidate_by_tag_removes_every_tagged_key_and_leaves_others() {
        let cache = cache();
        let tags = vec!["user:42".to_string()];
        cache.set("a", "gpt-4", "1", None, &tags).await.unwrap();
        cache.set("b", "gpt-4", "2", None, &tags).await.unwrap();
        cache.set("c", "gpt-4", "3", None, &[]).await.unwrap();

        let removed = cache.invalidate_by_tag("user:42").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.get("a", "gpt-4").await.unwrap(), None);
        assert_eq!(cache.get("b", "gpt-4").await.unwrap(), None);
        assert_eq!(cache.get("c", "gpt-4").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn invalidate_by_tag_publishes_a_tag_message_with_members() {
        let kv = Arc::new(FakeKeyValueStore::new());
        let cache = MultiTierCache::builder().l2(Arc::clone(&kv)).build();
        let mut receiver = kv.subscribe("cache:invalidation").await.unwrap();

        let tags = vec!["plan:pro".to_string()];
        cache.set("prompt", "gpt-4", "answer", None, &tags).await.unwrap();
        cache.invalidate_by_tag("plan:pro").await.unwrap();

        let raw = receiver.recv().await.unwrap();
        let message: InvalidationMessage = serde_json::from_slice(&raw).unwrap();
        assert_eq!(message.kind, MessageKind::Tag);
        assert_eq!(message.target, "plan:pro");
        assert_eq!(message.members, vec![MultiTierCache::cache_key("prompt", "gpt-4")]);
    }

    #[tokio::test]
    async fn scheduled_invalidation_fires_once_due() {
        let cache = cache();
        cache.set("prompt", "gpt-4", "answer", None, &[]).await.unwrap();
        let key = MultiTierCache::cache_key("prompt", "gpt-4");

        cache.schedule_invalidation(&key, 0, Some("ttl refresh".to_string())).await.unwrap();
        let fired = cache.tick_scheduled_invalidation().await.unwrap();
        assert_eq!(fired, 1);
        assert_eq!(cache.get("prompt", "gpt-4").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cache_key_is_stable_under_prompt_normalization() {
        let a = MultiTierCache::cache_key("  Hello World  ", "gpt-4");
        let b = MultiTierCache::cache_key("hello world", "gpt-4");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn sweep_l1_drops_expired_entries_only() {
        let cache = cache();
        cache.set("keep", "gpt-4", "v", None, &[]).await.unwrap();
        cache.set("drop", "gpt-4", "v", Some(Duration::from_millis(1)), &[]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let swept = cache.sweep_l1();
        assert_eq!(swept, 1);
    }
}
