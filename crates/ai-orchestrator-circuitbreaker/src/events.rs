use crate::CircuitState;
use ai_orchestrator_core::OrchestratorEvent;
use std::time::Instant;

/// Events emitted by a provider's circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A call was permitted through the circuit breaker.
    CallPermitted {
        circuit_id: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected because the circuit is open.
    CallRejected {
        circuit_id: String,
        timestamp: Instant,
    },
    /// The circuit breaker transitioned between states.
    StateTransition {
        circuit_id: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
        /// Present when the transition was caused by a manual override
        /// (`force_open`) rather than the normal failure-counting state
        /// machine.
        reason: Option<String>,
    },
    /// A successful call was recorded.
    SuccessRecorded {
        circuit_id: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A failed call was recorded.
    FailureRecorded {
        circuit_id: String,
        timestamp: Instant,
        state: CircuitState,
    },
}

impl OrchestratorEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "circuit.call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "circuit.call_rejected",
            CircuitBreakerEvent::StateTransition { .. } => "circuit.state_transition",
            CircuitBreakerEvent::SuccessRecorded { .. } => "circuit.success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "circuit.failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }
}

impl CircuitBreakerEvent {
    pub fn circuit_id(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallPermitted { circuit_id, .. }
            | CircuitBreakerEvent::CallRejected { circuit_id, .. }
            | CircuitBreakerEvent::StateTransition { circuit_id, .. }
            | CircuitBreakerEvent::SuccessRecorded { circuit_id, .. }
            | CircuitBreakerEvent::FailureRecorded { circuit_id, .. } => circuit_id,
        }
    }
}
