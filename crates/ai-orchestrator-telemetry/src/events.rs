//! The orchestrator-level events telemetry subscribes to (§6.5: `ai.request.*`).
//!
//! These are emitted by the orchestrator crate (C10) itself — telemetry (C11)
//! owns the type only because it is the sole consumer, the same relationship
//! the teacher's metrics layer has to the events it counts.

use ai_orchestrator_core::OrchestratorEvent;
use std::time::Instant;

/// One outcome of an `Orchestrator::generate`/`generate_with_fallback` call.
#[derive(Debug, Clone)]
pub enum RequestEvent {
    Completed {
        provider: String,
        model: String,
        latency_ms: u64,
        timestamp: Instant,
    },
    Failed {
        provider: Option<String>,
        timestamp: Instant,
    },
    Fallback {
        from: String,
        to: String,
        timestamp: Instant,
    },
}

impl RequestEvent {
    pub fn completed(provider: impl Into<String>, latency_ms: u64) -> Self {
        RequestEvent::Completed {
            provider: provider.into(),
            model: String::new(),
            latency_ms,
            timestamp: Instant::now(),
        }
    }
}

impl OrchestratorEvent for RequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::Completed { .. } => "ai.request.completed",
            RequestEvent::Failed { .. } => "ai.request.failed",
            RequestEvent::Fallback { .. } => "ai.request.fallback",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RequestEvent::Completed { timestamp, .. }
            | RequestEvent::Failed { timestamp, .. }
            | RequestEvent::Fallback { timestamp, .. } => *timestamp,
        }
    }
}
