use crate::events::CircuitBreakerEvent;
use ai_orchestrator_core::EventListeners;
use std::time::Duration;

/// Configuration for one provider's circuit breaker (§3, §4.2).
pub struct CircuitBreakerConfig {
    pub(crate) circuit_id: String,
    pub(crate) failure_threshold: usize,
    pub(crate) timeout: Duration,
    pub(crate) reset_timeout: Duration,
    pub(crate) half_open_max_attempts: usize,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig {
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub fn circuit_id(&self) -> &str {
        &self.circuit_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Builder for a provider's circuit breaker configuration.
pub struct CircuitBreakerConfigBuilder {
    circuit_id: String,
    failure_threshold: usize,
    timeout: Duration,
    reset_timeout: Duration,
    half_open_max_attempts: usize,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self {
            circuit_id: String::from("<unnamed>"),
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            reset_timeout: Duration::from_secs(30),
            half_open_max_attempts: 1,
            event_listeners: EventListeners::new(),
        }
    }

    /// The provider identity this breaker guards (§4.2).
    pub fn circuit_id<N: Into<String>>(mut self, id: N) -> Self {
        self.circuit_id = id.into();
        self
    }

    /// Consecutive failures (while closed) that trip the breaker. Default: 5.
    pub fn failure_threshold(mut self, n: usize) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Deadline the caller applies to the wrapped call. Recorded here so a
    /// caller can read it back via `CircuitRegistry::timeout_for` instead of
    /// tracking it separately. Default: 30s.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Time the circuit stays open before a call is allowed through to probe
    /// it (half-open). Default: 30s.
    pub fn reset_timeout(mut self, duration: Duration) -> Self {
        self.reset_timeout = duration;
        self
    }

    /// Consecutive half-open failures tolerated before re-opening (I4).
    /// Default: 1.
    pub fn half_open_max_attempts(mut self, n: usize) -> Self {
        self.half_open_max_attempts = n;
        self
    }

    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(crate::CircuitState, crate::CircuitState) + Send + Sync + 'static,
    {
        use ai_orchestrator_core::FnListener;
        self.event_listeners.add(FnListener::new(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::StateTransition { from_state, to_state, .. } = event {
                f(*from_state, *to_state);
            }
        }));
        self
    }

    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        use ai_orchestrator_core::FnListener;
        self.event_listeners.add(FnListener::new(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::CallRejected { circuit_id, .. } = event {
                f(circuit_id);
            }
        }));
        self
    }

    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            circuit_id: self.circuit_id,
            failure_threshold: self.failure_threshold.max(1),
            timeout: self.timeout,
            reset_timeout: self.reset_timeout,
            half_open_max_attempts: self.half_open_max_attempts.max(1),
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = CircuitBreakerConfig::builder().build();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.half_open_max_attempts, 1);
        assert_eq!(config.reset_timeout, Duration::from_secs(30));
    }

    #[test]
    fn zero_threshold_clamps_to_one() {
        let config = CircuitBreakerConfig::builder().failure_threshold(0).build();
        assert_eq!(config.failure_threshold, 1);
    }
}
