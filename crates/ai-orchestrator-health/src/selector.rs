//! Provider selection strategies (§4.3, C6).

use crate::ProviderHealth;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A function computing the per-request cost of using a given provider,
/// supplied by the caller (the model→cost table lives with the provider
/// clients, not in this crate).
pub type CostLookupFn = Arc<dyn Fn(&str) -> Option<f64> + Send + Sync>;

/// Built-in provider-selection strategies (§4.3).
///
/// `Random` (present in the teacher's `SelectionStrategy`) has no
/// counterpart here and is dropped; `CostBiased` is added in its place.
/// Model-pinning (§4.3: "if `options.model` is set and mapped to a single
/// provider... bypass the strategy") is not a variant of this enum — it is
/// a parameter to [`ProviderSelector::select`], since it is a property of
/// the request rather than of the selection policy.
#[derive(Clone)]
pub enum SelectionStrategy {
    /// Among usable providers, pick the lowest `latency_ms`.
    LowestLatency,

    /// Round-robin through usable providers (process-local index).
    RoundRobin,

    /// Pick the usable provider with the lowest cost per
    /// [`CostLookupFn`]; ties broken by lowest latency.
    CostBiased(CostLookupFn),
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        SelectionStrategy::RoundRobin
    }
}

/// Applies a [`SelectionStrategy`] against a health snapshot.
pub struct ProviderSelector {
    strategy: SelectionStrategy,
    round_robin_counter: AtomicUsize,
}

impl ProviderSelector {
    pub fn new(strategy: SelectionStrategy) -> Self {
        Self {
            strategy,
            round_robin_counter: AtomicUsize::new(0),
        }
    }

    /// Selects a provider name from `healths`. If `model_pin` names a
    /// provider present and usable in `healths`, it is returned directly,
    /// bypassing the configured strategy (§4.3). Returns `None` if no
    /// provider is usable.
    pub fn select(&self, healths: &[ProviderHealth], model_pin: Option<&str>) -> Option<String> {
        let usable: Vec<&ProviderHealth> = healths.iter().filter(|h| h.status.is_usable()).collect();
        if usable.is_empty() {
            return None;
        }

        if let Some(pin) = model_pin {
            if let Some(pinned) = usable.iter().find(|h| h.name == pin) {
                return Some(pinned.name.clone());
            }
        }

        match &self.strategy {
            SelectionStrategy::LowestLatency => usable
                .iter()
                .min_by_key(|h| h.latency_ms)
                .map(|h| h.name.clone()),

            SelectionStrategy::RoundRobin => {
                let idx = self.round_robin_counter.fetch_add(1, Ordering::Relaxed);
                usable.get(idx % usable.len()).map(|h| h.name.clone())
            }

            SelectionStrategy::CostBiased(cost_fn) => usable
                .iter()
                .min_by(|a, b| {
                    let cost_a = cost_fn(&a.name).unwrap_or(f64::MAX);
                    let cost_b = cost_fn(&b.name).unwrap_or(f64::MAX);
                    cost_a
                        .partial_cmp(&cost_b)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.latency_ms.cmp(&b.latency_ms))
                })
                .map(|h| h.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HealthStatus;

    fn health(name: &str, status: HealthStatus, latency_ms: u64) -> ProviderHealth {
        ProviderHealth {
            name: name.to_string(),
            status,
            latency_ms,
            consecutive_failures: 0,
            consecutive_successes: 0,
            error_rate: 0.0,
            last_checked: std::time::Instant::now(),
            failure_reason: None,
        }
    }

    #[test]
    fn lowest_latency_picks_minimum_among_usable() {
        let healths = vec![
            health("a", HealthStatus::Healthy, 300),
            health("b", HealthStatus::Healthy, 100),
            health("c", HealthStatus::Unhealthy, 1),
        ];
        let selector = ProviderSelector::new(SelectionStrategy::LowestLatency);
        assert_eq!(selector.select(&healths, None), Some("b".to_string()));
    }

    #[test]
    fn round_robin_cycles_and_wraps() {
        let healths = vec![
            health("a", HealthStatus::Healthy, 0),
            health("b", HealthStatus::Healthy, 0),
            health("c", HealthStatus::Healthy, 0),
        ];
        let selector = ProviderSelector::new(SelectionStrategy::RoundRobin);
        assert_eq!(selector.select(&healths, None), Some("a".to_string()));
        assert_eq!(selector.select(&healths, None), Some("b".to_string()));
        assert_eq!(selector.select(&healths, None), Some("c".to_string()));
        assert_eq!(selector.select(&healths, None), Some("a".to_string()));
    }

    #[test]
    fn round_robin_skips_unusable_providers() {
        let healths = vec![
            health("a", HealthStatus::Healthy, 0),
            health("b", HealthStatus::Unhealthy, 0),
            health("c", HealthStatus::Healthy, 0),
        ];
        let selector = ProviderSelector::new(SelectionStrategy::RoundRobin);
        assert_eq!(selector.select(&healths, None), Some("a".to_string()));
        assert_eq!(selector.select(&healths, None), Some("c".to_string()));
    }

    #[test]
    fn cost_biased_ties_break_on_latency() {
        let healths = vec![
            health("cheap-slow", HealthStatus::Healthy, 500),
            health("cheap-fast", HealthStatus::Healthy, 50),
            health("pricey", HealthStatus::Healthy, 10),
        ];
        let costs: CostLookupFn = Arc::new(|name: &str| match name {
            "cheap-slow" | "cheap-fast" => Some(0.001),
            "pricey" => Some(0.01),
            _ => None,
        });
        let selector = ProviderSelector::new(SelectionStrategy::CostBiased(costs));
        assert_eq!(selector.select(&healths, None), Some("cheap-fast".to_string()));
    }

    #[test]
    fn model_pin_bypasses_strategy_when_usable() {
        let healths = vec![
            health("a", HealthStatus::Healthy, 10),
            health("b", HealthStatus::Healthy, 500),
        ];
        let selector = ProviderSelector::new(SelectionStrategy::LowestLatency);
        assert_eq!(selector.select(&healths, Some("b")), Some("b".to_string()));
    }

    #[test]
    fn model_pin_falls_back_to_strategy_when_unhealthy() {
        let healths = vec![
            health("a", HealthStatus::Healthy, 10),
            health("b", HealthStatus::Unhealthy, 500),
        ];
        let selector = ProviderSelector::new(SelectionStrategy::LowestLatency);
        assert_eq!(selector.select(&healths, Some("b")), Some("a".to_string()));
    }

    #[test]
    fn no_usable_providers_returns_none() {
        let healths = vec![health("a", HealthStatus::Unhealthy, 10)];
        let selector = ProviderSelector::new(SelectionStrategy::RoundRobin);
        assert_eq!(selector.select(&healths, None), None);
    }

    #[test]
    fn degraded_is_usable_once_no_healthy_candidate_remains() {
        let healths = vec![health("a", HealthStatus::Degraded, 10)];
        let selector = ProviderSelector::new(SelectionStrategy::LowestLatency);
        assert_eq!(selector.select(&healths, None), Some("a".to_string()));
    }
}
