use crate::events::ProviderHealthEvent;
use ai_orchestrator_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for [`crate::HealthRegistry`].
pub struct HealthConfig {
    pub(crate) interval: Duration,
    pub(crate) probe_timeout: Duration,
    pub(crate) failure_threshold: u32,
    pub(crate) success_threshold: u32,
    pub(crate) degraded_latency_ms: u64,
    pub(crate) event_listeners: EventListeners<ProviderHealthEvent>,
}

impl HealthConfig {
    pub fn builder() -> HealthConfigBuilder {
        HealthConfigBuilder::new()
    }
}

/// Builder for [`HealthConfig`].
pub struct HealthConfigBuilder {
    interval: Duration,
    probe_timeout: Duration,
    failure_threshold: u32,
    success_threshold: u32,
    degraded_latency_ms: u64,
    event_listeners: EventListeners<ProviderHealthEvent>,
}

impl HealthConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults (§4.3): probe every 30s, 5s probe deadline, 2 consecutive
    /// failures to mark unhealthy, 1 consecutive success to recover, 1000ms
    /// latency threshold for `degraded` (§3).
    pub fn new() -> Self {
        Self {
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            failure_threshold: 2,
            success_threshold: 1,
            degraded_latency_ms: 1000,
            event_listeners: EventListeners::new(),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Latency, in milliseconds, above which a successful probe still
    /// classifies a provider as `Degraded` rather than `Healthy` (§3).
    /// Default: 1000ms.
    pub fn degraded_latency_ms(mut self, ms: u64) -> Self {
        self.degraded_latency_ms = ms;
        self
    }

    pub fn on_health_updated<F>(mut self, f: F) -> Self
    where
        F: Fn(&ProviderHealthEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ProviderHealthEvent| f(event)));
        self
    }

    pub fn build(self) -> HealthConfig {
        HealthConfig {
            interval: self.interval,
            probe_timeout: self.probe_timeout,
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            degraded_latency_ms: self.degraded_latency_ms,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for HealthConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
