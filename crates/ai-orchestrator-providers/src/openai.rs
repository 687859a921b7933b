//! OpenAI-compatible wire client (§6.2 "OpenAI-compatible").
//!
//! Shared by any vendor that speaks the `/chat/completions` dialect; Azure
//! reuses [`crate::azure::AzureOpenAiProvider`] instead since its URL shape
//! and auth header differ (§6.2 "Azure-OpenAI").

use crate::config::{ModelConfig, ProviderConfig};
use crate::error::{classify_status, parse_retry_after, ProviderError};
use crate::types::{estimate_tokens, Cost, GenerateOptions, GenerateResponse, ProbeStatus, TokensUsed};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Provider client for OpenAI's `/chat/completions` endpoint (§6.2).
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Client::builder().timeout(config.timeout).build().unwrap_or_default(),
            config,
        }
    }

    fn request_body(model: &str, prompt: &str, options: &GenerateOptions) -> Value {
        let mut body = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = options.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(frequency_penalty) = options.frequency_penalty {
            body["frequency_penalty"] = json!(frequency_penalty);
        }
        if let Some(presence_penalty) = options.presence_penalty {
            body["presence_penalty"] = json!(presence_penalty);
        }
        if !options.stop_sequences.is_empty() {
            body["stop"] = json!(options.stop_sequences);
        }
        body
    }

    fn parse_response(&self, model: &str, request_id: &str, body: Value) -> Result<GenerateResponse, ProviderError> {
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::Unknown("missing choices[0].message.content".into()))?
            .to_string();

        let prompt_tokens = body["usage"]["prompt_tokens"].as_u64().map(|v| v as u32);
        let completion_tokens = body["usage"]["completion_tokens"].as_u64().map(|v| v as u32);
        let tokens_used = match (prompt_tokens, completion_tokens) {
            (Some(prompt), Some(completion)) => TokensUsed {
                prompt,
                completion,
                total: body["usage"]["total_tokens"].as_u64().map(|v| v as u32).unwrap_or(prompt + completion),
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
        if let Some(reason) = body["choices"][0]["finish_reason"].as_str() {
            metadata.insert("finish_reason".to_string(), reason.to_string());
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
impl crate::client::ProviderClient for OpenAiProvider {
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
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
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
            .get(format!("{}/models", self.config.base_url))
            .bearer_auth(&self.config.api_key)
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
    fn request_body_includes_optional_fields_when_set() {
        let options = GenerateOptions {
            temperature: Some(0.7),
            max_tokens: Some(256),
            stop_sequences: vec!["STOP".to_string()],
            ..Default::default()
        };
        let body = OpenAiProvider::request_body("gpt-4o", "hello", &options);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["stop"][0], "STOP");
    }

    #[test]
    fn parse_response_falls_back_to_estimated_tokens_when_usage_missing() {
        let provider = OpenAiProvider::new(ProviderConfig::builder("openai").build());
        let body = json!({
            "choices": [{"message": {"content": "hello world"}, "finish_reason": "stop"}],
        });
        let result = provider.parse_response("gpt-4o", "req-1", body).unwrap();
        assert_eq!(result.content, "hello world");
        assert_eq!(result.tokens_used.prompt, 0);
        assert!(result.tokens_used.completion > 0);
        assert_eq!(result.metadata.get("finish_reason"), Some(&"stop".to_string()));
    }
}
