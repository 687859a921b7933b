//! Unified error taxonomy for the orchestrator (§7).
//!
//! Component crates each keep their own narrower `thiserror` enum
//! (`QuotaError`, `RateLimitError`, `CircuitBreakerError`, `ProviderError`);
//! this type is where they get unified, mirroring how the teacher's
//! `ResilienceError<E>` only composes per-pattern errors at the point where
//! multiple layers are stacked.

use ai_orchestrator_providers::ProviderError;
use ai_orchestrator_quota::QuotaError;
use ai_orchestrator_ratelimit::RateLimitError;

/// Every way a `Generate`/`GenerateWithFallback` call can fail (§7).
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("quota exceeded: {0}")]
    QuotaExceeded(#[from] QuotaError),

    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(#[from] RateLimitError),

    #[error("circuit open for provider {provider}")]
    CircuitOpen { provider: String },

    #[error("provider call timed out")]
    ProviderTimeout,

    #[error("transient provider error: {0}")]
    ProviderTransient(String),

    #[error("provider rate limited the request")]
    ProviderRateLimited,

    #[error("provider rejected the request: {0}")]
    ProviderClientError(String),

    #[error("no healthy provider available")]
    NoHealthyProvider,

    #[error("orchestrator misconfigured: {0}")]
    Configuration(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ProviderError> for OrchestratorError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout => OrchestratorError::ProviderTimeout,
            ProviderError::Transient(message) => OrchestratorError::ProviderTransient(message),
            ProviderError::RateLimited { .. } => OrchestratorError::ProviderRateLimited,
            ProviderError::Auth(message) | ProviderError::BadRequest(message) => OrchestratorError::ProviderClientError(message),
            ProviderError::Server(message) => OrchestratorError::ProviderTransient(message),
            ProviderError::Unknown(message) => OrchestratorError::ProviderClientError(message),
        }
    }
}

impl From<ai_orchestrator_circuitbreaker::CircuitBreakerError> for OrchestratorError {
    fn from(err: ai_orchestrator_circuitbreaker::CircuitBreakerError) -> Self {
        match err {
            ai_orchestrator_circuitbreaker::CircuitBreakerError::Open { circuit_id } => {
                OrchestratorError::CircuitOpen { provider: circuit_id }
            }
        }
    }
}
