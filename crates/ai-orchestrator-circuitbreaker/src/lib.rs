//! Per-provider circuit breakers (§4.2).
//!
//! A circuit breaker stops sending requests to a provider once its
//! consecutive-failure count crosses a threshold, and probes for recovery
//! after a cooldown.
//!
//! ## States
//! - **Closed**: normal operation, calls reach the provider
//! - **Open**: calls are rejected before they reach the provider
//! - **Half-Open**: a limited number of probe calls are allowed through
//!
//! Unlike the Tower middleware this crate is adapted from, there is no
//! wrapped `Service<Req>` — the orchestrator calls [`CircuitRegistry::try_acquire`]
//! before dispatching to a provider client, then reports the outcome with
//! [`CircuitRegistry::record_success`]/[`CircuitRegistry::record_failure`].
//! This lets one registry hold an independent breaker per provider.
//!
//! ## Feature Flags
//! - `metrics`: counters/histograms via the `metrics` crate
//! - `tracing`: state-transition logging via the `tracing` crate

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use registry::CircuitRegistry;

mod circuit;
mod config;
mod error;
mod events;
mod registry;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn breaker_recovers_after_wait_duration_elapses() {
        let registry = CircuitRegistry::with_uniform_config(|| {
            CircuitBreakerConfig::builder()
                .failure_threshold(5)
                .reset_timeout(Duration::from_millis(0))
        });

        for _ in 0..5 {
            registry.record_failure("azure");
        }
        assert_eq!(registry.state_sync("azure"), CircuitState::Open);

        assert!(registry.try_acquire("azure").is_ok());
        assert_eq!(registry.state_sync("azure"), CircuitState::HalfOpen);

        registry.record_success("azure");
        assert_eq!(registry.state_sync("azure"), CircuitState::Closed);
    }
}
