//! Error types for the health monitor.

/// Errors surfaced by [`crate::HealthRegistry`] and [`crate::ProviderSelector`].
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    /// No registered provider was usable when a selection was requested
    /// (§4.3: "If no provider is healthy, the strategy fails"). The
    /// orchestrator surfaces this as `NoHealthyProvider`.
    #[error("no healthy provider available")]
    NoHealthyProvider,

    /// A single probe attempt failed or timed out. Not fatal on its own —
    /// [`crate::HealthRegistry`] only marks a provider unhealthy after
    /// `failure_threshold` consecutive probe failures.
    #[error("health probe failed for provider {provider}: {source}")]
    ProbeFailed {
        provider: String,
        #[source]
        source: anyhow::Error,
    },
}
