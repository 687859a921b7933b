//! Explicit construction for [`crate::Orchestrator`] (§9: "Dynamic,
//! reflection-heavy dependency injection → explicit construction... a single
//! `Orchestrator` struct built from constructor args, with interfaces for
//! provider client, KV client, clock, and event sink. Tests inject fakes.").

use crate::error::OrchestratorError;
use crate::settings::OrchestratorSettings;
use crate::Orchestrator;
use ai_orchestrator_cache::MultiTierCache;
use ai_orchestrator_circuitbreaker::{CircuitBreakerConfig, CircuitRegistry};
use ai_orchestrator_core::{Clock, FakeKeyValueStore, KeyValueStore, SystemClock};
use ai_orchestrator_health::{HealthConfig, HealthProbe, HealthRegistry, ProviderSelector, SelectionStrategy};
use ai_orchestrator_providers::{ProbeStatus, ProviderClient};
use async_trait::async_trait;
use ai_orchestrator_quota::{QuotaConfig, QuotaLimits, QuotaService};
use ai_orchestrator_ratelimit::{RateLimitConfig, RateLimitLimits, RateLimiter};
use ai_orchestrator_telemetry::Telemetry;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an [`Orchestrator`] from explicit collaborators rather than a
/// container/registry (§9). Construction fails fast — via
/// [`OrchestratorError::Configuration`], never a panic — if no provider has
/// been registered.
pub struct OrchestratorBuilder {
    providers: Vec<Arc<dyn ProviderClient>>,
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    selection_strategy: SelectionStrategy,
    quota_limits: QuotaLimits,
    ratelimit_limits: RateLimitLimits,
    settings: OrchestratorSettings,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            kv: Arc::new(FakeKeyValueStore::new()),
            clock: Arc::new(SystemClock),
            selection_strategy: SelectionStrategy::default(),
            quota_limits: QuotaLimits::default(),
            ratelimit_limits: RateLimitLimits::default(),
            settings: OrchestratorSettings::default(),
        }
    }

    /// Registers a provider client. Order of registration is the order
    /// selection strategies (round-robin, health-snapshot iteration) see it.
    pub fn provider(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.providers.push(client);
        self
    }

    /// The shared KV backend behind quota, rate limiting, and L2 cache.
    /// Defaults to an in-memory [`FakeKeyValueStore`] — fine for tests,
    /// never for production (§4.1 AMBIENT).
    pub fn kv(mut self, kv: Arc<dyn KeyValueStore>) -> Self {
        self.kv = kv;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn selection_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.selection_strategy = strategy;
        self
    }

    pub fn quota_limits(mut self, limits: QuotaLimits) -> Self {
        self.quota_limits = limits;
        self
    }

    pub fn ratelimit_limits(mut self, limits: RateLimitLimits) -> Self {
        self.ratelimit_limits = limits;
        self
    }

    pub fn settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Validates and assembles every component (§9). Fails with
    /// [`OrchestratorError::Configuration`] if no provider was registered —
    /// never panics.
    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        if self.providers.is_empty() {
            return Err(OrchestratorError::Configuration(
                "at least one provider must be registered".to_string(),
            ));
        }

        let mut providers = HashMap::new();
        let mut provider_order = Vec::new();
        for client in &self.providers {
            let name = client.get_name().to_string();
            provider_order.push(name.clone());
            providers.insert(name, Arc::clone(client));
        }

        let circuit_failure_threshold = self.settings.circuit_failure_threshold;
        let circuit_timeout = self.settings.circuit_timeout();
        let circuit_reset_timeout = self.settings.circuit_reset_timeout();
        let circuit_half_open_max_attempts = self.settings.circuit_half_open_max_attempts;
        let circuits = Arc::new(CircuitRegistry::with_uniform_config(move || {
            CircuitBreakerConfig::builder()
                .failure_threshold(circuit_failure_threshold)
                .timeout(circuit_timeout)
                .reset_timeout(circuit_reset_timeout)
                .half_open_max_attempts(circuit_half_open_max_attempts)
        }));

        let health_config = HealthConfig::builder()
            .interval(self.settings.health_check_interval())
            .probe_timeout(self.settings.health_probe_timeout())
            .failure_threshold(self.settings.health_failure_threshold)
            .success_threshold(self.settings.health_success_threshold)
            .degraded_latency_ms(self.settings.health_degraded_latency_ms)
            .build();
        let mut health = HealthRegistry::new(health_config);
        for client in &self.providers {
            health.register(client.get_name(), Arc::new(ProviderHealthProbe(Arc::clone(client))));
        }
        let health = Arc::new(health);

        let quota = Arc::new(QuotaService::new(
            Arc::clone(&self.kv),
            Arc::clone(&self.clock),
            QuotaConfig::builder()
                .key_prefix(self.settings.quota_key_prefix.clone())
                .default_limits(self.quota_limits)
                .build(),
        ));

        let rate_limiter = Arc::new(RateLimiter::new(
            Arc::clone(&self.kv),
            Arc::clone(&self.clock),
            RateLimitConfig::builder()
                .key_prefix(self.settings.ratelimit_key_prefix.clone())
                .default_limits(self.ratelimit_limits)
                .build(),
        ));

        let telemetry = Arc::new(Telemetry::new());

        // `MultiTierCache` only exposes bare `Fn()` hit/miss callbacks, not a
        // way to register an `EventListener<CacheEvent>` trait object
        // directly, so telemetry's cache counters are wired through these
        // closures rather than through its own `EventListener<CacheEvent>`
        // impl (which exists for direct/test use instead).
        let telemetry_on_hit = Arc::clone(&telemetry);
        let telemetry_on_miss = Arc::clone(&telemetry);
        let cache = Arc::new(
            MultiTierCache::builder()
                .max_size(self.settings.cache_max_size)
                .default_ttl(self.settings.cache_default_ttl())
                .cleanup_interval(self.settings.cache_cleanup_interval())
                .key_prefix(self.settings.cache_key_prefix.clone())
                .l2(Arc::clone(&self.kv))
                .on_hit(move || telemetry_on_hit.record_cache_hit())
                .on_miss(move || telemetry_on_miss.record_cache_miss())
                .build(),
        );

        let selector = Arc::new(ProviderSelector::new(self.selection_strategy));

        Ok(Orchestrator::assemble(
            providers,
            provider_order,
            quota,
            rate_limiter,
            cache,
            circuits,
            health,
            selector,
            telemetry,
            self.clock,
            self.settings,
        ))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapts a [`ProviderClient`]'s async `health_check` to the sync-object-safe
/// [`HealthProbe`] contract the health monitor polls on each tick (§4.3).
struct ProviderHealthProbe(Arc<dyn ProviderClient>);

#[async_trait]
impl HealthProbe for ProviderHealthProbe {
    async fn probe(&self) -> anyhow::Result<()> {
        let status = self.0.health_check().await?;
        if status == ProbeStatus::Unhealthy {
            anyhow::bail!("provider '{}' reported unhealthy", self.0.get_name());
        }
        Ok(())
    }
}
