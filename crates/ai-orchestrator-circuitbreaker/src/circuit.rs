use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

/// Represents the state of a provider's circuit (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls to the provider are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected without reaching the provider.
    Open = 1,
    /// The circuit is half-open and a limited number of calls are allowed through.
    HalfOpen = 2,
}

/// Snapshot of a circuit's metrics for observability (§4.2 "Metrics").
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub total_requests: usize,
    pub failed_requests: usize,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub time_since_state_change: std::time::Duration,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Per-provider circuit state machine (I3, I4, P3, P4).
///
/// One `Circuit` exists per entry in a [`crate::registry::CircuitRegistry`];
/// each is independently mutex-guarded so one provider's breaker never
/// contends with another's.
pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: std::sync::Arc<AtomicU8>,
    last_state_change: Instant,
    /// Consecutive failures observed while `Closed`; reset on success or on
    /// any state transition.
    failure_count: usize,
    /// Consecutive failures observed while `HalfOpen` (I4).
    half_open_failures: usize,
    next_attempt_time: Option<Instant>,
    total_requests: usize,
    failed_requests: usize,
}

impl Circuit {
    pub(crate) fn new_with_atomic(state_atomic: std::sync::Arc<AtomicU8>) -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic,
            last_state_change: Instant::now(),
            failure_count: 0,
            half_open_failures: 0,
            next_attempt_time: None,
            total_requests: 0,
            failed_requests: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self::new_with_atomic(std::sync::Arc::new(AtomicU8::new(CircuitState::Closed as u8)))
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn metrics(&self) -> CircuitMetrics {
        let success_rate = if self.total_requests > 0 {
            (self.total_requests - self.failed_requests) as f64 / self.total_requests as f64
        } else {
            1.0
        };
        let failure_rate = if self.total_requests > 0 {
            self.failed_requests as f64 / self.total_requests as f64
        } else {
            0.0
        };

        CircuitMetrics {
            state: self.state,
            total_requests: self.total_requests,
            failed_requests: self.failed_requests,
            success_rate,
            failure_rate,
            time_since_state_change: self.last_state_change.elapsed(),
        }
    }

    /// Decides whether a call is currently permitted (I3). Transitions
    /// `Open -> HalfOpen` when `now >= nextAttemptTime`.
    pub fn try_acquire(&mut self, config: &CircuitBreakerConfig) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => {
                self.emit_permitted(config);
                true
            }
            CircuitState::Open => {
                let now = Instant::now();
                let can_probe = self.next_attempt_time.map(|at| now >= at).unwrap_or(true);
                if can_probe {
                    self.transition_to(CircuitState::HalfOpen, config, None);
                    self.half_open_failures = 0;
                    self.emit_permitted(config);
                    true
                } else {
                    self.emit_rejected(config);
                    false
                }
            }
        }
    }

    /// Records a successful provider call (caller already decided it was a
    /// success — there is no generic `Result` classifier here, unlike the
    /// middleware this is grounded on).
    pub fn record_success(&mut self, config: &CircuitBreakerConfig) {
        self.total_requests += 1;

        config.event_listeners.emit(&CircuitBreakerEvent::SuccessRecorded {
            circuit_id: config.circuit_id.clone(),
            timestamp: Instant::now(),
            state: self.state,
        });
        #[cfg(feature = "metrics")]
        counter!("circuit_calls_total", "circuit" => config.circuit_id.clone(), "outcome" => "success").increment(1);

        match self.state {
            CircuitState::HalfOpen => {
                self.transition_to(CircuitState::Closed, config, None);
            }
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Records a failed provider call (timeout, 5xx, connection error, or
    /// any other outcome the caller classifies as a failure per §4.2).
    pub fn record_failure(&mut self, config: &CircuitBreakerConfig) {
        self.total_requests += 1;
        self.failed_requests += 1;

        config.event_listeners.emit(&CircuitBreakerEvent::FailureRecorded {
            circuit_id: config.circuit_id.clone(),
            timestamp: Instant::now(),
            state: self.state,
        });
        #[cfg(feature = "metrics")]
        counter!("circuit_calls_total", "circuit" => config.circuit_id.clone(), "outcome" => "failure").increment(1);

        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= config.failure_threshold {
                    let next_attempt = Instant::now() + config.reset_timeout;
                    self.transition_to(CircuitState::Open, config, Some(next_attempt));
                }
            }
            CircuitState::HalfOpen => {
                self.half_open_failures += 1;
                if self.half_open_failures >= config.half_open_max_attempts {
                    let next_attempt = Instant::now() + config.reset_timeout;
                    self.transition_to(CircuitState::Open, config, Some(next_attempt));
                }
            }
            CircuitState::Open => {}
        }
    }

    fn emit_permitted(&self, config: &CircuitBreakerConfig) {
        config.event_listeners.emit(&CircuitBreakerEvent::CallPermitted {
            circuit_id: config.circuit_id.clone(),
            timestamp: Instant::now(),
            state: self.state,
        });
    }

    fn emit_rejected(&self, config: &CircuitBreakerConfig) {
        config.event_listeners.emit(&CircuitBreakerEvent::CallRejected {
            circuit_id: config.circuit_id.clone(),
            timestamp: Instant::now(),
        });
        #[cfg(feature = "metrics")]
        counter!("circuit_calls_total", "circuit" => config.circuit_id.clone(), "outcome" => "rejected").increment(1);
    }

    /// Manual override: forces the circuit open with a fresh `nextAttemptTime`.
    pub fn force_open(&mut self, config: &CircuitBreakerConfig, reason: Option<String>) {
        let next_attempt = Instant::now() + config.reset_timeout;
        self.transition_to_with_reason(CircuitState::Open, config, Some(next_attempt), reason);
    }

    pub fn force_closed(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, config, None);
    }

    pub fn reset(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, config, None);
        self.total_requests = 0;
        self.failed_requests = 0;
    }

    fn transition_to(
        &mut self,
        state: CircuitState,
        config: &CircuitBreakerConfig,
        next_attempt_time: Option<Instant>,
    ) {
        self.transition_to_with_reason(state, config, next_attempt_time, None)
    }

    fn transition_to_with_reason(
        &mut self,
        state: CircuitState,
        config: &CircuitBreakerConfig,
        next_attempt_time: Option<Instant>,
        reason: Option<String>,
    ) {
        if self.state == state {
            self.next_attempt_time = next_attempt_time.or(self.next_attempt_time);
            return;
        }

        let from_state = self.state;

        config.event_listeners.emit(&CircuitBreakerEvent::StateTransition {
            circuit_id: config.circuit_id.clone(),
            timestamp: Instant::now(),
            from_state,
            to_state: state,
            reason: reason.clone(),
        });

        #[cfg(feature = "tracing")]
        tracing::info!(circuit = %config.circuit_id, from = ?from_state, to = ?state, reason = ?reason, "circuit state transition");

        #[cfg(feature = "metrics")]
        {
            let label = |s: CircuitState| match s {
                CircuitState::Closed => "closed",
                CircuitState::Open => "open",
                CircuitState::HalfOpen => "half_open",
            };
            counter!(
                "circuit_transitions_total",
                "circuit" => config.circuit_id.clone(),
                "from" => label(from_state),
                "to" => label(state)
            )
            .increment(1);
            gauge!("circuit_state", "circuit" => config.circuit_id.clone(), "state" => label(state)).set(1.0);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.next_attempt_time = next_attempt_time;
        self.failure_count = 0;
        self.half_open_failures = 0;
    }
}
