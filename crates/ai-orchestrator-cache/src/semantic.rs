//! The L3 "semantic cache" tier (§4.6).
//!
//! The source this spec was distilled from declares a semantic cache but
//! never implements one. This crate keeps the seam as a plain trait plus a
//! no-op default so a real embedding-similarity backend can be dropped in
//! later without touching `MultiTierCache`.

use crate::error::CacheError;
use async_trait::async_trait;

/// Optional similarity-based cache tier, consulted after L1/L2 miss.
#[async_trait]
pub trait SemanticCache: Send + Sync {
    /// Returns a near-duplicate response for `prompt` if one scores above
    /// `threshold`, or `None`.
    async fn lookup(&self, prompt: &str, model: &str, threshold: f64) -> Result<Option<String>, CacheError>;

    /// Indexes `response` against `prompt` for future similarity lookups.
    async fn store(&self, prompt: &str, response: &str, model: &str) -> Result<(), CacheError>;
}

/// Default L3 implementation: always misses, writes are no-ops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSemanticCache;

#[async_trait]
impl SemanticCache for NoopSemanticCache {
    async fn lookup(&self, _prompt: &str, _model: &str, _threshold: f64) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn store(&self, _prompt: &str, _response: &str, _model: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_cache_always_misses() {
        let cache = NoopSemanticCache;
        assert_eq!(cache.lookup("hello", "gpt-4", 0.9).await.unwrap(), None);
        cache.store("hello", "world", "gpt-4").await.unwrap();
    }
}
