//! The `ProviderClient` contract every vendor adapter implements (§6.1).

use crate::{GenerateOptions, GenerateResponse, ModelConfig, ProbeStatus, ProviderConfig, ProviderError};
use async_trait::async_trait;

/// Object-safe per-vendor client, held as `Arc<dyn ProviderClient>` by the
/// orchestrator and the health monitor alike.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// One-time setup (e.g. validating credentials). Called once at
    /// orchestrator construction.
    async fn initialize(&self) -> Result<(), ProviderError>;

    /// Issues the completion call and normalizes the response (§6.2).
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResponse, ProviderError>;

    /// Lightweight probe used by the health monitor (§4.3); a `listModels`
    /// shaped GET in the real deployment.
    async fn health_check(&self) -> Result<ProbeStatus, ProviderError>;

    fn get_model_config(&self, name: &str) -> Option<ModelConfig>;

    fn get_name(&self) -> &str;

    fn get_default_model(&self) -> &str;

    fn get_config(&self) -> &ProviderConfig;
}
