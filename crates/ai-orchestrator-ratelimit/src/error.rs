//! Error types for the rate-limit service.

use crate::RateLimitDimension;

/// Errors surfaced by [`crate::RateLimiter`].
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// At least one configured dimension was exceeded (§4.5). Carries every
    /// violation found, not just the first — `check` aggregates across
    /// minute/hour/burst before returning.
    #[error("rate limit exceeded for user {user_id}: {violations:?}")]
    Exceeded {
        user_id: String,
        violations: Vec<RateLimitViolation>,
    },

    #[error("rate-limit backend unavailable: {0}")]
    Kv(#[from] ai_orchestrator_core::KvError),
}

impl RateLimitError {
    pub fn is_exceeded(&self) -> bool {
        matches!(self, RateLimitError::Exceeded { .. })
    }
}

/// One violated dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitViolation {
    pub dimension: RateLimitDimension,
    pub limit: f64,
    pub usage: f64,
}
