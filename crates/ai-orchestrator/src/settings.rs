//! Externalized configuration for the orchestrator (§3 AMBIENT
//! "Configuration surface", §10 AMBIENT "Configuration").
//!
//! Every tunable named throughout the spec (TTLs, thresholds, intervals,
//! default sizes) is a field here rather than a literal buried in component
//! construction, so a deployment can override it via a TOML file or
//! environment variables without recompiling. [`OrchestratorBuilder`] applies
//! these as defaults; explicit builder calls still take precedence.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The message returned by `generate_with_fallback` once every provider has
/// been exhausted (§8, P9: "`content == FALLBACK_MESSAGE`").
pub const FALLBACK_MESSAGE: &str = "I'm unable to process your request right now. Please try again shortly.";

/// Deployment-wide tunables, loadable from defaults, an optional file, and
/// environment variables (prefix `AI_ORCHESTRATOR`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub health_check_interval_secs: u64,
    pub health_probe_timeout_secs: u64,
    pub health_failure_threshold: u32,
    pub health_success_threshold: u32,
    pub health_degraded_latency_ms: u64,

    pub circuit_failure_threshold: usize,
    pub circuit_timeout_secs: u64,
    pub circuit_reset_timeout_secs: u64,
    pub circuit_half_open_max_attempts: usize,

    pub cache_max_size: usize,
    pub cache_default_ttl_secs: u64,
    pub cache_cleanup_interval_secs: u64,
    pub cache_key_prefix: String,

    pub quota_key_prefix: String,
    pub ratelimit_key_prefix: String,

    pub fallback_message: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            health_check_interval_secs: 30,
            health_probe_timeout_secs: 5,
            health_failure_threshold: 2,
            health_success_threshold: 1,
            health_degraded_latency_ms: 1000,

            circuit_failure_threshold: 5,
            circuit_timeout_secs: 30,
            circuit_reset_timeout_secs: 30,
            circuit_half_open_max_attempts: 1,

            cache_max_size: 10_000,
            cache_default_ttl_secs: 24 * 60 * 60,
            cache_cleanup_interval_secs: 5 * 60,
            cache_key_prefix: String::from("ai:cache"),

            quota_key_prefix: String::from("ai:quota"),
            ratelimit_key_prefix: String::from("ai:ratelimit"),

            fallback_message: FALLBACK_MESSAGE.to_string(),
        }
    }
}

impl OrchestratorSettings {
    /// Layers defaults, an optional `config/orchestrator.{toml,json}` file,
    /// and `AI_ORCHESTRATOR__*` environment variables, in that order of
    /// increasing precedence (§10 AMBIENT "Configuration").
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&defaults)?)
            .add_source(config::File::with_name("config/orchestrator").required(false))
            .add_source(config::Environment::with_prefix("AI_ORCHESTRATOR").separator("__"));
        builder.build()?.try_deserialize()
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn health_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.health_probe_timeout_secs)
    }

    pub fn circuit_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_timeout_secs)
    }

    pub fn circuit_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_reset_timeout_secs)
    }

    pub fn cache_default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_default_ttl_secs)
    }

    pub fn cache_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cache_cleanup_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let settings = OrchestratorSettings::default();
        assert_eq!(settings.health_check_interval_secs, 30);
        assert_eq!(settings.circuit_failure_threshold, 5);
        assert_eq!(settings.cache_max_size, 10_000);
        assert_eq!(settings.fallback_message, FALLBACK_MESSAGE);
    }
}
