//! Per-vendor HTTP clients for the AI request orchestrator (§3 "Provider
//! clients", C3, §6.1-§6.3).
//!
//! Each vendor module implements the same [`ProviderClient`] contract over
//! its own wire protocol (§6.2). The orchestrator never branches on vendor;
//! it only ever holds `Arc<dyn ProviderClient>`.
//!
//! ## Feature Flags
//! - `metrics`: per-provider request/latency counters via the `metrics` crate
//! - `tracing`: request/response logging via the `tracing` crate

mod anthropic;
mod azure;
mod client;
mod config;
mod error;
mod google;
mod openai;
mod types;

pub use anthropic::AnthropicProvider;
pub use azure::AzureOpenAiProvider;
pub use client::ProviderClient;
pub use config::{ModelConfig, ProviderConfig, ProviderConfigBuilder};
pub use error::ProviderError;
pub use google::GoogleProvider;
pub use openai::OpenAiProvider;
pub use types::{estimate_tokens, Cost, GenerateOptions, GenerateResponse, ProbeStatus, TokensUsed};

/// Static model→provider mapping (§6.3, canonical). Returns the vendor name
/// (`"openai"`, `"anthropic"`, `"google"`) a model should be pinned to, or
/// `None` for an unknown model, in which case no pinning occurs and normal
/// selection (§4.4) applies.
pub fn provider_for_model(model: &str) -> Option<&'static str> {
    match model {
        "gpt-3.5-turbo" | "gpt-3.5-turbo-16k" | "gpt-4" | "gpt-4-turbo" | "gpt-4o" => Some("openai"),
        "claude-3-haiku-20240307" | "claude-3-sonnet-20240229" | "claude-3-opus-20240229" | "claude-2.1" => {
            Some("anthropic")
        }
        "gemini-pro" | "gemini-1.5-pro" | "gemini-1.5-flash" | "gemini-ultra" => Some("google"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_models_map_to_their_vendor() {
        assert_eq!(provider_for_model("gpt-4o"), Some("openai"));
        assert_eq!(provider_for_model("claude-3-opus-20240229"), Some("anthropic"));
        assert_eq!(provider_for_model("gemini-1.5-flash"), Some("google"));
    }

    #[test]
    fn unknown_model_has_no_pinning() {
        assert_eq!(provider_for_model("llama-3-70b"), None);
    }
}
