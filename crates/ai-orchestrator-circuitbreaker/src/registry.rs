use crate::circuit::Circuit;
use crate::config::CircuitBreakerConfig;
use crate::error::CircuitBreakerError;
use crate::CircuitState;
use std::collections::HashMap;
use std::sync::atomic::AtomicU8;
use std::sync::{Arc, Mutex};

struct Entry {
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
    config: CircuitBreakerConfig,
}

/// A breaker-per-provider registry (§4.2: "the circuit breaker is keyed by
/// provider/model identity, not global").
///
/// Generalized from the teacher's single `CircuitBreaker<S, ..>` Tower
/// middleware, which wrapped exactly one inner `Service`, into a map keyed by
/// circuit id since the orchestrator needs one independent breaker per
/// provider.
pub struct CircuitRegistry {
    entries: Mutex<HashMap<String, Arc<Entry>>>,
    default_config: Arc<dyn Fn(&str) -> CircuitBreakerConfig + Send + Sync>,
}

impl CircuitRegistry {
    /// Builds a registry that lazily creates a breaker for each new
    /// `circuit_id` using `config_factory` to produce its configuration.
    pub fn new<F>(config_factory: F) -> Self
    where
        F: Fn(&str) -> CircuitBreakerConfig + Send + Sync + 'static,
    {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_config: Arc::new(config_factory),
        }
    }

    /// Builds a registry where every circuit shares one configuration
    /// template, re-keyed per circuit id.
    pub fn with_uniform_config<F>(config_builder: F) -> Self
    where
        F: Fn() -> crate::config::CircuitBreakerConfigBuilder + Send + Sync + 'static,
    {
        Self::new(move |circuit_id| config_builder().circuit_id(circuit_id).build())
    }

    fn entry_for(&self, circuit_id: &str) -> Arc<Entry> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get(circuit_id) {
            return Arc::clone(entry);
        }

        let config = (self.default_config)(circuit_id);
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let entry = Arc::new(Entry {
            circuit: Mutex::new(Circuit::new_with_atomic(Arc::clone(&state_atomic))),
            state_atomic,
            config,
        });
        entries.insert(circuit_id.to_string(), Arc::clone(&entry));
        entry
    }

    /// Returns `Ok(())` if a call to this provider is currently permitted,
    /// or `Err` if the breaker is open.
    pub fn try_acquire(&self, circuit_id: &str) -> Result<(), CircuitBreakerError> {
        let entry = self.entry_for(circuit_id);
        let mut circuit = entry.circuit.lock().unwrap();
        if circuit.try_acquire(&entry.config) {
            Ok(())
        } else {
            Err(CircuitBreakerError::Open {
                circuit_id: circuit_id.to_string(),
            })
        }
    }

    pub fn record_success(&self, circuit_id: &str) {
        let entry = self.entry_for(circuit_id);
        entry.circuit.lock().unwrap().record_success(&entry.config);
    }

    pub fn record_failure(&self, circuit_id: &str) {
        let entry = self.entry_for(circuit_id);
        entry.circuit.lock().unwrap().record_failure(&entry.config);
    }

    /// Lock-free state read, safe for health/status endpoints (§6.4).
    pub fn state_sync(&self, circuit_id: &str) -> CircuitState {
        let entries = self.entries.lock().unwrap();
        match entries.get(circuit_id) {
            Some(entry) => {
                CircuitState::from_u8(entry.state_atomic.load(std::sync::atomic::Ordering::Acquire))
            }
            None => CircuitState::Closed,
        }
    }

    pub fn metrics(&self, circuit_id: &str) -> Option<crate::circuit::CircuitMetrics> {
        let entries = self.entries.lock().unwrap();
        entries.get(circuit_id).map(|entry| {
            let circuit = entry.circuit.lock().unwrap();
            circuit.metrics()
        })
    }

    /// The deadline configured for calls against this circuit, if it has
    /// been created yet (§4.2's per-provider call timeout).
    pub fn timeout_for(&self, circuit_id: &str) -> Option<std::time::Duration> {
        let entries = self.entries.lock().unwrap();
        entries.get(circuit_id).map(|entry| entry.config.timeout())
    }

    /// Manually trips the named circuit open, optionally recording why
    /// (operator intervention rather than the failure-counting machinery).
    pub fn force_open(&self, circuit_id: &str, reason: Option<String>) {
        let entry = self.entry_for(circuit_id);
        entry.circuit.lock().unwrap().force_open(&entry.config, reason);
    }

    pub fn force_closed(&self, circuit_id: &str) {
        let entry = self.entry_for(circuit_id);
        entry.circuit.lock().unwrap().force_closed(&entry.config);
    }

    pub fn reset(&self, circuit_id: &str) {
        let entry = self.entry_for(circuit_id);
        entry.circuit.lock().unwrap().reset(&entry.config);
    }

    /// All circuit ids currently tracked (created on first use).
    pub fn known_circuit_ids(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn registry() -> CircuitRegistry {
        CircuitRegistry::with_uniform_config(|| {
            CircuitBreakerConfig::builder()
                .failure_threshold(10)
                .reset_timeout(Duration::from_secs(30))
        })
    }

    #[test]
    fn independent_providers_have_independent_breakers() {
        let registry = registry();

        for _ in 0..10 {
            registry.record_failure("openai");
        }
        assert_eq!(registry.state_sync("openai"), CircuitState::Open);
        assert_eq!(registry.state_sync("anthropic"), CircuitState::Closed);
        assert!(registry.try_acquire("anthropic").is_ok());
        assert!(registry.try_acquire("openai").is_err());
    }

    #[test]
    fn unknown_circuit_defaults_to_closed() {
        let registry = registry();
        assert_eq!(registry.state_sync("never-touched"), CircuitState::Closed);
    }

    #[test]
    fn force_open_and_reset_affect_only_the_named_circuit() {
        let registry = registry();
        registry.force_open("openai", Some("maintenance".to_string()));
        assert_eq!(registry.state_sync("openai"), CircuitState::Open);
        assert_eq!(registry.state_sync("anthropic"), CircuitState::Closed);

        registry.reset("openai");
        assert_eq!(registry.state_sync("openai"), CircuitState::Closed);
    }

    #[test]
    fn known_circuit_ids_reflects_lazily_created_entries() {
        let registry = registry();
        assert!(registry.known_circuit_ids().is_empty());
        let _ = registry.try_acquire("openai");
        let _ = registry.try_acquire("anthropic");
        let mut ids = registry.known_circuit_ids();
        ids.sort();
        assert_eq!(ids, vec!["anthropic".to_string(), "openai".to_string()]);
    }
}
