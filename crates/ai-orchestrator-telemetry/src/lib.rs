//! In-memory telemetry for the AI request orchestrator (§4.8, C11).
//!
//! Tracks cache hits/misses, request successes/failures/fallbacks, and
//! per-provider latency, all in a single bounded in-process structure —
//! deliberately not durable (§1 Non-goals: "persisting telemetry beyond a
//! bounded rolling window"). [`Telemetry`] is itself an
//! [`ai_orchestrator_core::EventListener`] for [`ai_orchestrator_cache::CacheEvent`]
//! and for [`RequestEvent`], registered at orchestrator construction time
//! the same way every other component wires its `on_*` callback into a
//! shared listener.
//!
//! ## Feature Flags
//! - `metrics`: mirrors every counter to the `metrics` crate
//! - `tracing`: logs request completion/failure/fallback

mod events;
mod stats;

pub use events::RequestEvent;
pub use stats::{ProviderStats, TelemetrySnapshot};

use ai_orchestrator_cache::CacheEvent;
use ai_orchestrator_core::EventListener;
use stats::Inner;
use std::sync::RwLock;

/// Maximum number of latency samples retained per provider (§4.8: "1000-sample
/// capped ring buffer").
pub const MAX_SAMPLES: usize = 1000;

/// Collects hits/misses/successes/failures/fallbacks and per-provider
/// latency for the lifetime of one orchestrator instance.
///
/// Cheap to construct (`Telemetry::new()`); share it as `Arc<Telemetry>`
/// across the orchestrator and every component's event callbacks.
pub struct Telemetry {
    inner: RwLock<Inner>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Point-in-time snapshot of every counter and per-provider stat.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.inner.read().unwrap().snapshot()
    }

    /// Records one completed request against `provider`, updating its
    /// incremental mean latency (§4.8: `avg ← avg + (x - avg)/n`) and
    /// pushing `latency_ms` onto its capped sample ring buffer.
    pub fn record_success(&self, provider: &str, latency_ms: u64) {
        self.inner.write().unwrap().record_success(provider, latency_ms);

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("orchestrator_requests_completed_total", "provider" => provider.to_string()).increment(1);
            metrics::histogram!("orchestrator_request_latency_ms", "provider" => provider.to_string()).record(latency_ms as f64);
        }
    }

    pub fn record_failure(&self, provider: Option<&str>) {
        self.inner.write().unwrap().record_failure();

        #[cfg(feature = "metrics")]
        {
            let provider_label = provider.unwrap_or("unknown").to_string();
            metrics::counter!("orchestrator_requests_failed_total", "provider" => provider_label).increment(1);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = provider;
    }

    pub fn record_fallback(&self) {
        self.inner.write().unwrap().record_fallback();

        #[cfg(feature = "metrics")]
        metrics::counter!("orchestrator_requests_fallback_total").increment(1);
    }

    pub fn record_cache_hit(&self) {
        self.inner.write().unwrap().record_cache_hit();

        #[cfg(feature = "metrics")]
        metrics::counter!("orchestrator_cache_hits_total").increment(1);
    }

    pub fn record_cache_miss(&self) {
        self.inner.write().unwrap().record_cache_miss();

        #[cfg(feature = "metrics")]
        metrics::counter!("orchestrator_cache_misses_total").increment(1);
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventListener<RequestEvent> for Telemetry {
    fn on_event(&self, event: &RequestEvent) {
        match event {
            RequestEvent::Completed { provider, latency_ms, .. } => {
                self.record_success(provider, *latency_ms);

                #[cfg(feature = "tracing")]
                tracing::info!(provider = %provider, latency_ms, "ai.request.completed");
            }
            RequestEvent::Failed { provider, .. } => {
                self.record_failure(provider.as_deref());

                #[cfg(feature = "tracing")]
                tracing::warn!(provider = ?provider, "ai.request.failed");
            }
            RequestEvent::Fallback { from, to, .. } => {
                self.record_fallback();

                #[cfg(feature = "tracing")]
                tracing::warn!(from = %from, to = %to, "ai.request.fallback");
            }
        }
    }
}

impl EventListener<CacheEvent> for Telemetry {
    fn on_event(&self, event: &CacheEvent) {
        match event {
            CacheEvent::Hit { .. } => {
                self.record_cache_hit();

                #[cfg(feature = "tracing")]
                tracing::debug!("ai.request.cache_hit");
            }
            CacheEvent::Miss { .. } => self.record_cache_miss(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_starts_empty() {
        let telemetry = Telemetry::new();
        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.hits, 0);
        assert_eq!(snapshot.misses, 0);
        assert_eq!(snapshot.successes, 0);
        assert_eq!(snapshot.failures, 0);
        assert_eq!(snapshot.fallbacks, 0);
        assert!(snapshot.per_provider.is_empty());
    }

    #[test]
    fn record_success_tracks_incremental_mean_latency() {
        let telemetry = Telemetry::new();
        telemetry.record_success("openai", 100);
        telemetry.record_success("openai", 200);

        let snapshot = telemetry.snapshot();
        let stats = snapshot.per_provider.get("openai").unwrap();
        assert_eq!(stats.count, 2);
        assert!((stats.avg_latency_ms - 150.0).abs() < 1e-9);
    }

    #[test]
    fn counters_increment_independently() {
        let telemetry = Telemetry::new();
        telemetry.record_cache_hit();
        telemetry.record_cache_hit();
        telemetry.record_cache_miss();
        telemetry.record_failure(Some("anthropic"));
        telemetry.record_fallback();

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.fallbacks, 1);
    }

    #[test]
    fn latency_samples_are_capped_at_max_samples() {
        let telemetry = Telemetry::new();
        for i in 0..(MAX_SAMPLES + 10) {
            telemetry.record_success("openai", i as u64);
        }
        let snapshot = telemetry.snapshot();
        let stats = snapshot.per_provider.get("openai").unwrap();
        assert_eq!(stats.recent_samples.len(), MAX_SAMPLES);
        assert_eq!(stats.count, (MAX_SAMPLES + 10) as u64);
    }

    #[test]
    fn on_event_dispatches_request_completed_into_success_counter() {
        let telemetry = Telemetry::new();
        let event = RequestEvent::completed("openai", 42);
        EventListener::<RequestEvent>::on_event(&telemetry, &event);

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.per_provider.get("openai").unwrap().count, 1);
    }
}
