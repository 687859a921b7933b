//! Counter storage behind [`crate::Telemetry`]'s lock (§4.8).

use crate::MAX_SAMPLES;
use std::collections::{HashMap, VecDeque};

/// Rolling stats for one provider: an incremental mean over every call this
/// process has made, plus a capped window of the most recent raw samples.
#[derive(Debug, Clone, Default)]
pub struct ProviderStats {
    pub count: u64,
    pub avg_latency_ms: f64,
    pub recent_samples: VecDeque<u64>,
}

impl ProviderStats {
    fn record(&mut self, latency_ms: u64) {
        self.count += 1;
        // Incremental mean (§4.8): avg ← avg + (x - avg)/n.
        self.avg_latency_ms += (latency_ms as f64 - self.avg_latency_ms) / self.count as f64;

        self.recent_samples.push_back(latency_ms);
        if self.recent_samples.len() > MAX_SAMPLES {
            self.recent_samples.pop_front();
        }
    }
}

/// Point-in-time copy of every counter, safe to hold after the lock is
/// released.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    pub hits: u64,
    pub misses: u64,
    pub successes: u64,
    pub failures: u64,
    pub fallbacks: u64,
    pub per_provider: HashMap<String, ProviderStats>,
}

#[derive(Default)]
pub(crate) struct Inner {
    hits: u64,
    misses: u64,
    successes: u64,
    failures: u64,
    fallbacks: u64,
    per_provider: HashMap<String, ProviderStats>,
}

impl Inner {
    pub(crate) fn record_success(&mut self, provider: &str, latency_ms: u64) {
        self.successes += 1;
        self.per_provider.entry(provider.to_string()).or_default().record(latency_ms);
    }

    pub(crate) fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub(crate) fn record_fallback(&mut self) {
        self.fallbacks += 1;
    }

    pub(crate) fn record_cache_hit(&mut self) {
        self.hits += 1;
    }

    pub(crate) fn record_cache_miss(&mut self) {
        self.misses += 1;
    }

    pub(crate) fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            hits: self.hits,
            misses: self.misses,
            successes: self.successes,
            failures: self.failures,
            fallbacks: self.fallbacks,
            per_provider: self.per_provider.clone(),
        }
    }
}
