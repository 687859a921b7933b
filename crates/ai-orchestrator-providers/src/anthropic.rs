//! Anthropic-style wire client (§6.2 "Anthropic-style").

use crate::config::{ModelConfig, ProviderConfig};
use crate::error::{classify_status, parse_retry_after, ProviderError};
use crate::types::{estimate_tokens, Cost, GenerateOptions, GenerateResponse, ProbeStatus, TokensUsed};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Provider client for Anthropic's `/messages` endpoint (§6.2).
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Client::builder().timeout(config.timeout).build().unwrap_or_default(),
            config,
        }
    }

    fn request_body(model: &str, prompt: &str, options: &GenerateOptions) -> Value {
        let mut body = json!({
            "model": model,
            "max_tokens": options.max_tokens.unwrap_or(1024),
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = options.top_p {
            body["top_p"] = json!(top_p);
        }
        if !options.stop_sequences.is_empty() {
            body["stop_sequences"] = json!(options.stop_sequences);
        }
        body
    }

    fn parse_response(&self, model: &str, request_id: &str, body: Value) -> Result<GenerateResponse, ProviderError> {
        let content = body["content"][0]["text"]
            .as_str()
            .ok_or_else(|| ProviderError::Unknown("missing content[0].text".into()))?
            .to_string();

        let input_tokens = body["usage"]["input_tokens"].as_u64().map(|v| v as u32);
        let output_tokens = body["usage"]["output_tokens"].as_u64().map(|v| v as u32);
        let tokens_used = match (input_tokens, output_tokens) {
            (Some(prompt), Some(completion)) => TokensUsed {
                prompt,
                completion,
                total: prompt + completion,
            },
            _ => {
                let completion = estimate_tokens(&content);
                TokensUsed {
                    prompt: 0,
                    completion,
                    total: completion,
                }
            }
        };

        let model_config = self.config.models.get(model);
        let cost = model_config
            .map(|m| Cost::compute(tokens_used, m.input_cost_per_token, m.output_cost_per_token))
            .unwrap_or_default();

        let mut metadata = HashMap::new();
        if let Some(reason) = body["stop_reason"].as_str() {
            metadata.insert("stop_reason".to_string(), reason.to_string());
        }

        Ok(GenerateResponse {
            content,
            model: model.to_string(),
            provider: self.config.name.clone(),
            tokens_used,
            cost,
            cached: false,
            request_id: request_id.to_string(),
            metadata,
        })
    }
}

#[async_trait]
impl crate::client::ProviderClient for AnthropicProvider {
    async fn initialize(&self) -> Result<(), ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::Auth("missing API key".into()));
        }
        Ok(())
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResponse, ProviderError> {
        let model = options.model.as_deref().unwrap_or(&self.config.default_model);
        let request_id = options.request_id.as_deref().unwrap_or("unknown");
        let body = Self::request_body(model, prompt, options);

        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), text, retry_after));
        }

        let parsed: Value = response.json().await?;
        self.parse_response(model, request_id, parsed)
    }

    async fn health_check(&self) -> Result<ProbeStatus, ProviderError> {
        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": self.config.default_model,
                "max_tokens": 1,
                "messages": [{"role": "user", "content": "ping"}],
            }))
            .send()
            .await?;
        if response.status().is_success() {
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

    #[test]
    fn request_body_defaults_max_tokens_when_unset() {
        let options = GenerateOptions::default();
        let body = AnthropicProvider::request_body("claude-3-opus-20240229", "hi", &options);
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn parse_response_reads_input_and_output_tokens() {
        let provider = AnthropicProvider::new(ProviderConfig::builder("anthropic").build());
        let body = json!({
            "content": [{"text": "hello"}],
            "usage": {"input_tokens": 10, "output_tokens": 5},
            "stop_reason": "end_turn",
        });
        let result = provider.parse_response("claude-3-opus-20240229", "req-1", body).unwrap();
        assert_eq!(result.tokens_used.prompt, 10);
        assert_eq!(result.tokens_used.completion, 5);
        assert_eq!(result.tokens_used.total, 15);
    }
}
