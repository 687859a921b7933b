use crate::HealthStatus;
use ai_orchestrator_core::OrchestratorEvent;
use std::time::Instant;

/// Events emitted by the health monitor.
#[derive(Debug, Clone)]
pub enum ProviderHealthEvent {
    /// A provider's health record changed (§6.5: `provider.health.updated`).
    /// Fired on every probe cycle that changes the provider's reported
    /// status or latency, not on every tick.
    Updated {
        provider: String,
        status: HealthStatus,
        latency_ms: u64,
        error_rate: f64,
        failure_reason: Option<String>,
        timestamp: Instant,
    },
}

impl OrchestratorEvent for ProviderHealthEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProviderHealthEvent::Updated { .. } => "provider.health.updated",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ProviderHealthEvent::Updated { timestamp, .. } => *timestamp,
        }
    }
}
