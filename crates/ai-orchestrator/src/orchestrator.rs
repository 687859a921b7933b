//! The orchestrator pipeline itself (§4.7, C10): `generate` and
//! `generate_with_fallback` over a fixed set of provider clients.

use crate::error::OrchestratorError;
use crate::settings::OrchestratorSettings;
use ai_orchestrator_cache::MultiTierCache;
use ai_orchestrator_circuitbreaker::CircuitRegistry;
use ai_orchestrator_core::{Clock, EventListener};
use ai_orchestrator_health::{HealthRegistry, ProviderSelector};
use ai_orchestrator_providers::{provider_for_model, Cost, GenerateOptions, GenerateResponse, ProviderClient, ProviderError, TokensUsed};
use ai_orchestrator_quota::QuotaService;
use ai_orchestrator_ratelimit::RateLimiter;
use ai_orchestrator_telemetry::{RequestEvent, Telemetry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// A fully assembled orchestrator (§9: built once via [`crate::OrchestratorBuilder`],
/// shared behind an `Arc` for the lifetime of the process).
pub struct Orchestrator {
    providers: HashMap<String, Arc<dyn ProviderClient>>,
    provider_order: Vec<String>,
    quota: Arc<QuotaService>,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<MultiTierCache>,
    circuits: Arc<CircuitRegistry>,
    health: Arc<HealthRegistry>,
    selector: Arc<ProviderSelector>,
    telemetry: Arc<Telemetry>,
    clock: Arc<dyn Clock>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        providers: HashMap<String, Arc<dyn ProviderClient>>,
        provider_order: Vec<String>,
        quota: Arc<QuotaService>,
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<MultiTierCache>,
        circuits: Arc<CircuitRegistry>,
        health: Arc<HealthRegistry>,
        selector: Arc<ProviderSelector>,
        telemetry: Arc<Telemetry>,
        clock: Arc<dyn Clock>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            providers,
            provider_order,
            quota,
            rate_limiter,
            cache,
            circuits,
            health,
            selector,
            telemetry,
            clock,
            settings,
        }
    }

    /// Starts the background health-probe loop (§4.3: "scheduler ticks every
    /// 30s"). Callers that never invoke this still work — every probe simply
    /// stays `Unknown`/unused, and `ProviderSelector` treats `Unknown` as
    /// unusable, so the first configured provider's health is never assumed.
    pub fn spawn_health_monitor(&self) -> tokio::task::JoinHandle<()> {
        Arc::clone(&self.health).spawn()
    }

    /// Runs one health-probe cycle immediately, rather than waiting for the
    /// first scheduler tick. Callers that need a provider to be selectable
    /// right after construction (including this crate's own tests) await
    /// this once before the first `generate` call.
    pub async fn warm_up(&self) {
        self.health.probe_all().await;
    }

    pub fn provider_names(&self) -> &[String] {
        &self.provider_order
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Runs the full pipeline once; surfaces the first error encountered
    /// (§4.7 steps 1-7).
    pub async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResponse, OrchestratorError> {
        self.generate_inner(prompt, options, false).await
    }

    /// Like [`Self::generate`], but on provider/breaker failure walks the
    /// remaining usable providers (in health-snapshot order) until one
    /// succeeds or all are exhausted — in which case a static degraded
    /// response is returned rather than an error (§4.7, §8 P9).
    pub async fn generate_with_fallback(&self, prompt: &str, options: &GenerateOptions) -> GenerateResponse {
        match self.generate_inner(prompt, options, true).await {
            Ok(response) => response,
            Err(_) => GenerateResponse {
                content: self.settings.fallback_message.clone(),
                model: options.model.clone().unwrap_or_default(),
                provider: String::new(),
                tokens_used: TokensUsed::default(),
                cost: Cost::default(),
                cached: false,
                request_id: options.request_id.clone().unwrap_or_default(),
                metadata: HashMap::new(),
            },
        }
    }

    async fn generate_inner(&self, prompt: &str, options: &GenerateOptions, fallback: bool) -> Result<GenerateResponse, OrchestratorError> {
        let model_key = options.model.as_deref().unwrap_or("default");

        if let Some(user_id) = options.user_id.as_deref() {
            self.enforce_quota(user_id, options.session_id.as_deref()).await?;
            self.enforce_rate_limit(user_id).await?;
        }

        if options.use_cache {
            if let Some(content) = self.cache.get(prompt, model_key).await.unwrap_or(None) {
                return Ok(GenerateResponse {
                    content,
                    model: model_key.to_string(),
                    provider: String::new(),
                    tokens_used: TokensUsed::default(),
                    cost: Cost::default(),
                    cached: true,
                    request_id: options.request_id.clone().unwrap_or_default(),
                    metadata: HashMap::new(),
                });
            }
        }

        let health_snapshot = self.health.snapshot().await;
        let model_pin = options.model.as_deref().and_then(provider_for_model);
        let primary = self
            .selector
            .select(&health_snapshot, model_pin)
            .ok_or(OrchestratorError::NoHealthyProvider)?;

        let mut candidates = vec![primary.clone()];
        if fallback {
            for health in &health_snapshot {
                if health.status.is_usable() && health.name != primary {
                    candidates.push(health.name.clone());
                }
            }
        }

        let mut last_err = OrchestratorError::NoHealthyProvider;
        for (attempt_index, name) in candidates.iter().enumerate() {
            let Some(client) = self.providers.get(name) else { continue };

            if attempt_index > 0 {
                self.telemetry.on_event(&RequestEvent::Fallback {
                    from: candidates[0].clone(),
                    to: name.clone(),
                    timestamp: Instant::now(),
                });
            }

            match self.call_provider(Arc::clone(client), name, prompt, options).await {
                Ok(response) => {
                    self.on_success(prompt, model_key, options, &response).await;
                    return Ok(response);
                }
                Err(err) => {
                    self.telemetry.on_event(&RequestEvent::Failed {
                        provider: Some(name.clone()),
                        timestamp: Instant::now(),
                    });
                    last_err = err;
                    if !fallback {
                        break;
                    }
                }
            }
        }

        Err(last_err)
    }

    async fn enforce_quota(&self, user_id: &str, session_id: Option<&str>) -> Result<(), OrchestratorError> {
        match self.quota.enforce(user_id, session_id, None).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_exceeded() => Err(err.into()),
            // KV infrastructure failure: fail open rather than block every
            // request on a backend outage (§7).
            Err(_) => Ok(()),
        }
    }

    async fn enforce_rate_limit(&self, user_id: &str) -> Result<(), OrchestratorError> {
        match self.rate_limiter.enforce(user_id, 0, 0.0, None).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_exceeded() => Err(err.into()),
            Err(_) => Ok(()),
        }
    }

    async fn on_success(&self, prompt: &str, model_key: &str, options: &GenerateOptions, response: &GenerateResponse) {
        if options.use_cache {
            // Cache write failures never surface (§7): a cache is an
            // optimization, not a correctness dependency.
            let _ = self.cache.set(prompt, model_key, &response.content, options.cache_ttl, &[]).await;
        }

        if options.record_quota {
            if let Some(user_id) = options.user_id.as_deref() {
                let _ = self
                    .quota
                    .record(user_id, options.session_id.as_deref(), response.tokens_used.total as u64, response.cost.total)
                    .await;
                let _ = self
                    .rate_limiter
                    .record_request(user_id, response.tokens_used.total as u64, response.cost.total)
                    .await;
            }
        }
    }

    /// Wraps one provider call in its circuit breaker, a deadline of
    /// `min(provider.timeoutMs, breaker.timeoutMs)`, and exponential-backoff
    /// retry for retryable errors (§4.7 step 5, §5, §6.1).
    async fn call_provider(
        &self,
        client: Arc<dyn ProviderClient>,
        name: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<GenerateResponse, OrchestratorError> {
        self.circuits.try_acquire(name)?;

        let config = client.get_config().clone();
        let deadline = config.timeout.min(self.circuits.timeout_for(name).unwrap_or(config.timeout));

        let mut attempt: u32 = 0;
        loop {
            let started_at = Instant::now();
            let outcome = tokio::time::timeout(deadline, client.generate(prompt, options)).await;

            match outcome {
                Ok(Ok(response)) => {
                    self.circuits.record_success(name);
                    let latency_ms = started_at.elapsed().as_millis() as u64;
                    self.telemetry.on_event(&RequestEvent::Completed {
                        provider: name.to_string(),
                        model: response.model.clone(),
                        latency_ms,
                        timestamp: Instant::now(),
                    });
                    return Ok(response);
                }
                Ok(Err(provider_err)) => {
                    if provider_err.counts_against_breaker() {
                        self.circuits.record_failure(name);
                    }
                    if provider_err.is_retryable() && attempt < config.max_retries {
                        self.sleep_before_retry(&provider_err, config.retry_delay, attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(provider_err.into());
                }
                Err(_elapsed) => {
                    self.circuits.record_failure(name);
                    if attempt < config.max_retries {
                        self.sleep_before_retry(&ProviderError::Timeout, config.retry_delay, attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(OrchestratorError::ProviderTimeout);
                }
            }
        }
    }

    async fn sleep_before_retry(&self, err: &ProviderError, retry_delay: std::time::Duration, attempt: u32) {
        let backoff = retry_delay.saturating_mul(2u32.saturating_pow(attempt));
        let delay = match err {
            ProviderError::RateLimited { retry_after: Some(retry_after) } => *retry_after,
            _ => backoff,
        };
        tokio::time::sleep(delay).await;
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
