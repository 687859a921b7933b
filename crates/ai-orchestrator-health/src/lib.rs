//! Periodic provider health probing and selection strategies for the AI
//! request orchestrator (§4.3, C5/C6).
//!
//! - **Circuit breaker** (reactive, `ai-orchestrator-circuitbreaker`):
//!   responds to failures after they happen.
//! - **Health monitor** (proactive, this crate): continuously probes every
//!   registered provider so the orchestrator can steer new requests away
//!   from a provider before it starts failing.
//!
//! These patterns complement each other: the health monitor picks the
//! first candidate, the circuit breaker protects the call itself.
//!
//! ## Feature Flags
//! - `metrics`: probe latency via the `metrics` crate
//! - `tracing`: health transition logging via the `tracing` crate

mod config;
mod error;
mod events;
mod selector;

pub use config::{HealthConfig, HealthConfigBuilder};
pub use error::HealthError;
pub use events::ProviderHealthEvent;
pub use selector::{CostLookupFn, ProviderSelector, SelectionStrategy};

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::RwLock;

#[cfg(feature = "metrics")]
use metrics::gauge;

/// Health status of a monitored provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Provider is healthy and ready to use.
    Healthy,
    /// Provider is degraded but still functional (e.g. slow but working).
    Degraded,
    /// Provider is unhealthy and should not be used.
    Unhealthy,
    /// Not yet probed.
    Unknown,
}

impl HealthStatus {
    /// Usable for selection: healthy or degraded (§4.3 AMBIENT note).
    pub fn is_usable(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

impl From<HealthStatus> for u8 {
    fn from(status: HealthStatus) -> u8 {
        match status {
            HealthStatus::Healthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 2,
            HealthStatus::Unknown => 3,
        }
    }
}

impl From<u8> for HealthStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => HealthStatus::Healthy,
            1 => HealthStatus::Degraded,
            2 => HealthStatus::Unhealthy,
            _ => HealthStatus::Unknown,
        }
    }
}

/// The current health record for one provider (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHealth {
    pub name: String,
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// Fraction of the last [`ERROR_RATE_WINDOW`] probes that failed.
    pub error_rate: f64,
    pub last_checked: Instant,
    /// Set from the probe's error when the most recent probe failed;
    /// cleared on the next success.
    pub failure_reason: Option<String>,
}

impl ProviderHealth {
    fn unknown(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Unknown,
            latency_ms: 0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            error_rate: 0.0,
            last_checked: Instant::now(),
            failure_reason: None,
        }
    }
}

/// Number of recent probes kept per provider for [`ProviderHealth::error_rate`].
const ERROR_RATE_WINDOW: usize = 20;

/// A lightweight health probe against one provider — a `listModels`-shaped
/// GET in the real deployment (§4.3). Object-safe via `async_trait` so each
/// provider client can be registered as `Arc<dyn HealthProbe>` without this
/// crate depending on `ai-orchestrator-providers`.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> anyhow::Result<()>;
}

struct RegisteredProbe {
    name: String,
    probe: Arc<dyn HealthProbe>,
}

/// Periodically probes every registered provider and keeps an atomically
/// replaced health record per provider (§4.3, C5).
pub struct HealthRegistry {
    probes: Vec<RegisteredProbe>,
    healths: RwLock<HashMap<String, ProviderHealth>>,
    windows: Mutex<HashMap<String, VecDeque<bool>>>,
    config: HealthConfig,
}

impl HealthRegistry {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            probes: Vec::new(),
            healths: RwLock::new(HashMap::new()),
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Registers a provider to be probed on every tick. Must be called
    /// before [`Self::spawn`]/[`Self::probe_all`] to take effect.
    pub fn register(&mut self, name: impl Into<String>, probe: Arc<dyn HealthProbe>) {
        let name = name.into();
        self.probes.push(RegisteredProbe { name, probe });
    }

    /// Names of every registered provider, in registration order.
    pub fn provider_names(&self) -> Vec<String> {
        self.probes.iter().map(|p| p.name.clone()).collect()
    }

    /// Current health snapshot for every registered provider. Providers
    /// never probed report [`HealthStatus::Unknown`].
    pub async fn snapshot(&self) -> Vec<ProviderHealth> {
        let healths = self.healths.read().await;
        self.probes
            .iter()
            .map(|p| healths.get(&p.name).cloned().unwrap_or_else(|| ProviderHealth::unknown(&p.name)))
            .collect()
    }

    /// Runs one probe cycle against every registered provider in parallel,
    /// replacing each provider's health record atomically (§4.3: "per-
    /// provider health record is replaced atomically").
    pub async fn probe_all(&self) {
        let results = futures::future::join_all(self.probes.iter().map(|registered| async move {
            let start = Instant::now();
            let outcome = tokio::time::timeout(self.config.probe_timeout, registered.probe.probe()).await;
            let latency_ms = start.elapsed().as_millis() as u64;
            (registered.name.clone(), outcome, latency_ms)
        }))
        .await;

        let mut healths = self.healths.write().await;
        let mut windows = self.windows.lock().unwrap();
        for (name, outcome, latency_ms) in results {
            let previous = healths
                .get(&name)
                .cloned()
                .unwrap_or_else(|| ProviderHealth::unknown(&name));

            let failure_reason = match &outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.to_string()),
                Err(_elapsed) => Some("probe timed out".to_string()),
            };
            let succeeded = failure_reason.is_none();

            let window = windows.entry(name.clone()).or_default();
            window.push_back(succeeded);
            if window.len() > ERROR_RATE_WINDOW {
                window.pop_front();
            }
            let error_rate = window.iter().filter(|ok| !**ok).count() as f64 / window.len() as f64;

            let (consecutive_failures, consecutive_successes) = if succeeded {
                (0, previous.consecutive_successes + 1)
            } else {
                (previous.consecutive_failures + 1, 0)
            };

            // §3: "degraded iff healthy but latencyMs > 1000; unhealthy on
            // probe failure" — a successful probe is never `Unhealthy`, and
            // an unsuccessful one is never `Degraded`.
            let status = if succeeded {
                if latency_ms > self.config.degraded_latency_ms {
                    HealthStatus::Degraded
                } else if consecutive_successes >= self.config.success_threshold {
                    HealthStatus::Healthy
                } else {
                    previous.status
                }
            } else if consecutive_failures >= self.config.failure_threshold {
                HealthStatus::Unhealthy
            } else {
                previous.status
            };

            let updated = ProviderHealth {
                name: name.clone(),
                status,
                latency_ms: if succeeded { latency_ms } else { previous.latency_ms },
                consecutive_failures,
                consecutive_successes,
                error_rate,
                last_checked: Instant::now(),
                failure_reason,
            };

            if updated.status != previous.status || updated.latency_ms != previous.latency_ms {
                let event = ProviderHealthEvent::Updated {
                    provider: name.clone(),
                    status: updated.status,
                    latency_ms: updated.latency_ms,
                    error_rate: updated.error_rate,
                    failure_reason: updated.failure_reason.clone(),
                    timestamp: Instant::now(),
                };
                self.config.event_listeners.emit(&event);

                #[cfg(feature = "tracing")]
                tracing::info!(provider = %name, ?status, latency_ms = updated.latency_ms, error_rate, "provider health updated");
            }

            #[cfg(feature = "metrics")]
            gauge!("provider_health_latency_ms", "provider" => name.clone()).set(updated.latency_ms as f64);

            healths.insert(name, updated);
        }
    }

    /// Spawns the periodic probe loop (§4.3: "Scheduler ticks every 30s").
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.config.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.probe_all().await;
            }
        })
    }
}

struct FnProbe<F>(F);

#[async_trait]
impl<F> HealthProbe for FnProbe<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    async fn probe(&self) -> anyhow::Result<()> {
        (self.0)()
    }
}

/// Wraps a plain closure as a [`HealthProbe`], for tests and simple
/// synchronous checks.
pub fn fn_probe<F>(f: F) -> Arc<dyn HealthProbe>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(FnProbe(f))
}
