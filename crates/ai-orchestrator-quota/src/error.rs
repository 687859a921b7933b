//! Error types for the quota service.

use crate::{QuotaDimension, QuotaPeriod};

/// Errors surfaced by [`crate::QuotaService`].
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// A dimension of a user's (or session's) usage has reached its limit
    /// (§4.4, I5). Never retried — the orchestrator surfaces this to the
    /// caller as-is (§7).
    #[error("quota exceeded for user {user_id}: {period} {dimension} usage {usage} >= limit {limit}")]
    Exceeded {
        user_id: String,
        session_id: Option<String>,
        period: QuotaPeriod,
        dimension: QuotaDimension,
        limit: f64,
        usage: f64,
    },

    #[error("quota backend unavailable: {0}")]
    Kv(#[from] ai_orchestrator_core::KvError),
}

impl QuotaError {
    /// Whether this error represents a denial (as opposed to infrastructure
    /// failure) — used by the orchestrator to decide whether to fail open.
    pub fn is_exceeded(&self) -> bool {
        matches!(self, QuotaError::Exceeded { .. })
    }
}
