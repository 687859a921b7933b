use crate::{QuotaDimension, QuotaPeriod};
use ai_orchestrator_core::OrchestratorEvent;
use std::time::Instant;

/// Events emitted by the quota service.
#[derive(Debug, Clone)]
pub enum QuotaEvent {
    /// A quota check denied a request (§4.4: "emit `quota.exceeded` ...
    /// and fail with `QuotaExceeded`", P2: exactly one event per denial).
    Exceeded {
        user_id: String,
        session_id: Option<String>,
        period: QuotaPeriod,
        dimension: QuotaDimension,
        limit: f64,
        usage: f64,
        timestamp: Instant,
    },
}

impl OrchestratorEvent for QuotaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QuotaEvent::Exceeded { .. } => "quota.exceeded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            QuotaEvent::Exceeded { timestamp, .. } => *timestamp,
        }
    }
}
