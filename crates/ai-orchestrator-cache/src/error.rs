//! Error types for the multi-tier cache.

/// Errors surfaced by [`crate::MultiTierCache`].
///
/// Per §7's `CacheFailure` classification, callers on the request path treat
/// this as a miss-on-read / drop-on-write and never propagate it to the
/// caller of `Generate` — see `ai-orchestrator`'s pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Kv(#[from] ai_orchestrator_core::KvError),

    #[error("failed to encode/decode a cached value: {0}")]
    Codec(#[from] serde_json::Error),
}
