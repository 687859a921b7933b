//! Google-style wire client (§6.2 "Google-style").

use crate::config::{ModelConfig, ProviderConfig};
use crate::error::{classify_status, parse_retry_after, ProviderError};
use crate::types::{estimate_tokens, Cost, GenerateOptions, GenerateResponse, ProbeStatus, TokensUsed};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Provider client for Google's `generateContent` endpoint (§6.2).
pub struct GoogleProvider {
    client: Client,
    config: ProviderConfig,
}

impl GoogleProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Client::builder().timeout(config.timeout).build().unwrap_or_default(),
            config,
        }
    }

    fn request_body(prompt: &str, options: &GenerateOptions) -> Value {
        let mut generation_config = json!({});
        if let Some(temperature) = options.temperature {
            generation_config["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }
        if let Some(top_p) = options.top_p {
            generation_config["topP"] = json!(top_p);
        }
        if !options.stop_sequences.is_empty() {
            generation_config["stopSequences"] = json!(options.stop_sequences);
        }

        json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": generation_config,
            "safetySettings": [],
        })
    }

    fn parse_response(&self, model: &str, request_id: &str, body: Value) -> Result<GenerateResponse, ProviderError> {
        let content = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| ProviderError::Unknown("missing candidates[0].content.parts[0].text".into()))?
            .to_string();

        let prompt_tokens = body["usageMetadata"]["promptTokenCount"].as_u64().map(|v| v as u32);
        let completion_tokens = body["usageMetadata"]["candidatesTokenCount"].as_u64().map(|v| v as u32);
        let tokens_used = match (prompt_tokens, completion_tokens) {
            (Some(prompt), Some(completion)) => TokensUsed {
                prompt,
                completion,
                total: body["usageMetadata"]["totalTokenCount"]
                    .as_u64()
                    .map(|v| v as u32)
                    .unwrap_or(prompt + completion),
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

        Ok(GenerateResponse {
            content,
            model: model.to_string(),
            provider: self.config.name.clone(),
            tokens_used,
            cost,
            cached: false,
            request_id: request_id.to_string(),
            metadata: HashMap::new(),
        })
    }
}

#[async_trait]
impl crate::client::ProviderClient for GoogleProvider {
    async fn initialize(&self) -> Result<(), ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::Auth("missing API key".into()));
        }
        Ok(())
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResponse, ProviderError> {
        let model = options.model.as_deref().unwrap_or(&self.config.default_model);
        let request_id = options.request_id.as_deref().unwrap_or("unknown");
        let body = Self::request_body(prompt, options);

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.config.base_url, model))
            .query(&[("key", &self.config.api_key)])
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
            .query(&[("key", &self.config.api_key)])
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
    fn request_body_maps_generation_config_field_names() {
        let options = GenerateOptions {
            temperature: Some(0.5),
            max_tokens: Some(128),
            top_p: Some(0.9),
            ..Default::default()
        };
        let body = GoogleProvider::request_body("hi", &options);
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 128);
        assert_eq!(body["generationConfig"]["topP"], 0.9);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn parse_response_reads_usage_metadata() {
        let provider = GoogleProvider::new(ProviderConfig::builder("google").build());
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "hi there"}]}}],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5},
        });
        let result = provider.parse_response("gemini-1.5-pro", "req-1", body).unwrap();
        assert_eq!(result.tokens_used.total, 5);
        assert_eq!(result.content, "hi there");
    }
}
