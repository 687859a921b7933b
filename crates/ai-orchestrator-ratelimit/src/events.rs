use crate::RateLimitDimension;
use ai_orchestrator_core::OrchestratorEvent;
use std::time::Instant;

/// Events emitted by the rate-limit service.
#[derive(Debug, Clone)]
pub enum RateLimitEvent {
    /// A dimension was exceeded during `check` (§4.5: "Emits one
    /// `rate-limit.exceeded` event per violation").
    Exceeded {
        user_id: String,
        dimension: RateLimitDimension,
        limit: f64,
        usage: f64,
        timestamp: Instant,
    },
}

impl OrchestratorEvent for RateLimitEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimitEvent::Exceeded { .. } => "rate-limit.exceeded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimitEvent::Exceeded { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_is_rate_limit_exceeded() {
        let event = RateLimitEvent::Exceeded {
            user_id: "u1".into(),
            dimension: RateLimitDimension::RequestsPerMinute,
            limit: 60.0,
            usage: 60.0,
            timestamp: Instant::now(),
        };
        assert_eq!(event.event_type(), "rate-limit.exceeded");
    }
}
