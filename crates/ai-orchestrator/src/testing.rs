//! A scriptable in-memory [`ProviderClient`] (§8 AMBIENT: "a scriptable
//! `FakeProviderClient`... configurable to return success / specific error
//! kinds / latencies on each call"), mirroring `ai-orchestrator-core`'s
//! unconditionally-public `FakeKeyValueStore`.

use ai_orchestrator_providers::{GenerateOptions, GenerateResponse, ModelConfig, ProbeStatus, ProviderClient, ProviderConfig, ProviderError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted outcome for [`FakeProviderClient::generate`].
pub enum ScriptedCall {
    Success(GenerateResponse),
    Failure(ProviderError),
    /// Succeeds, but only after sleeping `delay` first — for exercising
    /// timeout/circuit-breaker behavior deterministically.
    Delayed(Duration, Box<ScriptedCall>),
}

/// A [`ProviderClient`] whose [`generate`](ProviderClient::generate) calls
/// are scripted in advance, one [`ScriptedCall`] per invocation. Once the
/// script is exhausted, further calls return [`ProviderError::Unknown`].
pub struct FakeProviderClient {
    config: ProviderConfig,
    script: Mutex<VecDeque<ScriptedCall>>,
    healthy: Mutex<bool>,
}

impl FakeProviderClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            script: Mutex::new(VecDeque::new()),
            healthy: Mutex::new(true),
        }
    }

    pub fn push(&self, call: ScriptedCall) {
        self.script.lock().unwrap().push_back(call);
    }

    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock().unwrap() = healthy;
    }

    fn success_response(&self, content: impl Into<String>) -> GenerateResponse {
        GenerateResponse {
            content: content.into(),
            model: self.config.default_model.clone(),
            provider: self.config.name.clone(),
            tokens_used: Default::default(),
            cost: Default::default(),
            cached: false,
            request_id: String::new(),
            metadata: Default::default(),
        }
    }

    /// Convenience for the common case of scripting a plain success.
    pub fn push_success(&self, content: impl Into<String>) {
        self.push(ScriptedCall::Success(self.success_response(content)));
    }

    pub fn push_failure(&self, err: ProviderError) {
        self.push(ScriptedCall::Failure(err));
    }
}

#[async_trait]
impl ProviderClient for FakeProviderClient {
    async fn initialize(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<GenerateResponse, ProviderError> {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(ScriptedCall::Success(response)) => Ok(response),
            Some(ScriptedCall::Failure(err)) => Err(err),
            Some(ScriptedCall::Delayed(delay, inner)) => {
                tokio::time::sleep(delay).await;
                match *inner {
                    ScriptedCall::Success(response) => Ok(response),
                    ScriptedCall::Failure(err) => Err(err),
                    ScriptedCall::Delayed(..) => Err(ProviderError::Unknown("nested delay not supported".into())),
                }
            }
            None => Err(ProviderError::Unknown("fake provider script exhausted".into())),
        }
    }

    async fn health_check(&self) -> Result<ProbeStatus, ProviderError> {
        if *self.healthy.lock().unwrap() {
            Ok(ProbeStatus::Healthy)
        } else {
            Ok(ProbeStatus::Unhealthy)
        }
    }

    fn get_model_config(&self, name: &str) -> Option<ModelConfig> {
        self.config.models.get(name).cloned()
    }

    fn get_name(&self) -> &str {
        &self.config.name
    }

    fn get_default_model(&self) -> &str {
        &self.config.default_model
    }

    fn get_config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_calls_are_consumed_in_order() {
        let client = FakeProviderClient::new(ProviderConfig::builder("fake").build());
        client.push_success("first");
        client.push_failure(ProviderError::Timeout);

        let options = GenerateOptions::default();
        let first = client.generate("hi", &options).await.unwrap();
        assert_eq!(first.content, "first");

        let second = client.generate("hi", &options).await;
        assert!(matches!(second, Err(ProviderError::Timeout)));
    }

    #[tokio::test]
    async fn exhausted_script_returns_unknown_error() {
        let client = FakeProviderClient::new(ProviderConfig::builder("fake").build());
        let result = client.generate("hi", &GenerateOptions::default()).await;
        assert!(matches!(result, Err(ProviderError::Unknown(_))));
    }
}
