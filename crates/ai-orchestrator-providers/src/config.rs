//! Provider and model configuration (§3 "Provider config").

use std::collections::HashMap;
use std::time::Duration;

/// Per-model cost/capability data, keyed by model name on [`ProviderConfig`].
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub max_tokens: u32,
    pub context_window: u32,
    pub input_cost_per_token: f64,
    pub output_cost_per_token: f64,
    pub supports_streaming: bool,
    pub supports_functions: bool,
}

/// Immutable per-run configuration for a single provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub models: HashMap<String, ModelConfig>,
}

impl ProviderConfig {
    pub fn builder(name: impl Into<String>) -> ProviderConfigBuilder {
        ProviderConfigBuilder::new(name)
    }
}

/// Builder for [`ProviderConfig`].
pub struct ProviderConfigBuilder {
    name: String,
    api_key: String,
    base_url: String,
    default_model: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    models: HashMap<String, ModelConfig>,
}

impl ProviderConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: String::new(),
            base_url: String::new(),
            default_model: String::new(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_delay: Duration::from_millis(200),
            models: HashMap::new(),
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn model(mut self, name: impl Into<String>, config: ModelConfig) -> Self {
        self.models.insert(name.into(), config);
        self
    }

    pub fn build(self) -> ProviderConfig {
        ProviderConfig {
            name: self.name,
            api_key: self.api_key,
            base_url: self.base_url,
            default_model: self.default_model,
            timeout: self.timeout,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            models: self.models,
        }
    }
}
