//! AI request orchestrator: provider routing, quota, rate limiting, a
//! multi-tier cache, and circuit breaking over multiple AI providers.
//!
//! Every cross-cutting concern lives in its own crate — `ai-orchestrator-quota`,
//! `-ratelimit`, `-cache`, `-circuitbreaker`, `-health`, `-providers`,
//! `-telemetry` — and this crate composes them into a single [`Orchestrator`]
//! via [`OrchestratorBuilder`] (§9: explicit construction, never a DI
//! container). Construction fails fast with [`OrchestratorError::Configuration`]
//! if no provider was registered.
//!
//! # Quick Start
//!
//! ```ignore
//! use ai_orchestrator::OrchestratorBuilder;
//! use std::sync::Arc;
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .provider(Arc::new(my_openai_provider))
//!     .build()?;
//!
//! orchestrator.warm_up().await;
//! let response = orchestrator.generate("hello", &Default::default()).await?;
//! ```
//!
//! # Feature Flags
//! - `tracing`: structured logging across every sub-component
//! - `metrics`: Prometheus-style counters across every sub-component
//! - `full`: both of the above

mod builder;
mod error;
mod orchestrator;
mod settings;
pub mod testing;

pub use builder::OrchestratorBuilder;
pub use error::OrchestratorError;
pub use orchestrator::Orchestrator;
pub use settings::{OrchestratorSettings, FALLBACK_MESSAGE};

// Re-exported so callers can configure providers, selection, and limits
// without depending on every sibling crate directly.
pub use ai_orchestrator_cache::CacheError;
pub use ai_orchestrator_circuitbreaker::CircuitBreakerError;
pub use ai_orchestrator_health::SelectionStrategy;
pub use ai_orchestrator_providers::{GenerateOptions, GenerateResponse, ProviderClient, ProviderConfig, ProviderError};
pub use ai_orchestrator_quota::{QuotaError, QuotaLimits};
pub use ai_orchestrator_ratelimit::{RateLimitError, RateLimitLimits};
pub use ai_orchestrator_telemetry::{Telemetry, TelemetrySnapshot};
