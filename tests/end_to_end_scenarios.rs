//! End-to-end scenarios against the assembled `Orchestrator`, one test per
//! numbered scenario in the orchestration spec's "Testable Properties"
//! section. Each test drives the public `OrchestratorBuilder`/`Orchestrator`
//! API exactly as an application embedding this crate would, with a scripted
//! `FakeProviderClient` standing in for the network.

use ai_orchestrator::testing::FakeProviderClient;
use ai_orchestrator::{
    GenerateOptions, OrchestratorBuilder, OrchestratorError, OrchestratorSettings, ProviderError, QuotaLimits,
    RateLimitLimits, SelectionStrategy, FALLBACK_MESSAGE,
};
use ai_orchestrator_providers::ProviderConfig;
use std::sync::Arc;
use std::time::Duration;

/// `max_retries(0)` keeps one `generate()` call equal to exactly one
/// provider invocation and one breaker outcome, so the scenarios below can
/// reason about "the Nth call" the way the spec states them rather than
/// accounting for the orchestrator's own retry-with-backoff layer.
fn provider(name: &str) -> Arc<FakeProviderClient> {
    Arc::new(FakeProviderClient::new(
        ProviderConfig::builder(name).default_model("test-model").max_retries(0).build(),
    ))
}

/// Scenario 1: a second call with the same prompt/model is served from
/// cache, with identical content and `cached` flipped to `true`.
#[tokio::test]
async fn cache_hit_on_second_call() {
    let client = provider("primary");
    client.push_success("TypeScript is a typed superset of JavaScript.");

    let orchestrator = OrchestratorBuilder::new().provider(client).build().unwrap();
    orchestrator.warm_up().await;

    let mut options = GenerateOptions::default();
    options.use_cache = true;

    let first = orchestrator.generate("What is TS?", &options).await.unwrap();
    assert!(!first.cached);

    let second = orchestrator.generate("What is TS?", &options).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.content, first.content);
}

/// Scenario 2: a user who has already exhausted their monthly request quota
/// is denied before any provider is invoked.
#[tokio::test]
async fn quota_exceeded_blocks_the_call() {
    let client = provider("primary");
    client.push_success("should never be reached");

    let limits = QuotaLimits::builder().monthly_requests(1000).build();
    let orchestrator = OrchestratorBuilder::new().provider(client.clone()).quota_limits(limits).build().unwrap();
    orchestrator.warm_up().await;

    let mut options = GenerateOptions::default();
    options.user_id = Some("u1".to_string());
    options.record_quota = true;

    // Exhaust the monthly limit via 1000 recorded requests, the way real
    // traffic would accumulate it, rather than poking the KV store directly.
    for _ in 0..1000 {
        client.push_success("counts toward quota");
        let _ = orchestrator.generate("filler", &options).await.unwrap();
    }

    let result = orchestrator.generate("one too many", &options).await;
    assert!(matches!(result, Err(OrchestratorError::QuotaExceeded(_))));
}

/// Scenarios 3 & 4: a provider that fails five times in a row trips its
/// breaker; a sixth call is rejected without ever reaching the provider;
/// after the reset timeout elapses the breaker half-opens, and a subsequent
/// success closes it again.
#[tokio::test]
async fn circuit_opens_then_half_opens_then_closes() {
    let client = provider("openai");
    for _ in 0..5 {
        client.push_failure(ProviderError::Transient("upstream 500".into()));
    }

    let mut settings = OrchestratorSettings::default();
    settings.circuit_failure_threshold = 5;
    // Settings only carry second-granularity reset timeouts; one second is
    // the shortest interval that still leaves room to assert the breaker is
    // open *before* it elapses, below.
    settings.circuit_reset_timeout_secs = 1;

    let orchestrator = OrchestratorBuilder::new().provider(client.clone()).settings(settings).build().unwrap();
    orchestrator.warm_up().await;

    let mut options = GenerateOptions::default();
    options.model = Some("gpt-4".to_string()); // pins to "openai" per the model->provider table

    for _ in 0..5 {
        let result = orchestrator.generate("hi", &options).await;
        assert!(result.is_err(), "each of the first five calls should surface the provider's own error");
    }

    // The breaker should now be open; a sixth call must fail with
    // `CircuitOpen` without touching the (script-exhausted) provider.
    let sixth = orchestrator.generate("hi", &options).await;
    assert!(matches!(sixth, Err(OrchestratorError::CircuitOpen { .. })), "got {sixth:?}");

    // Wait out the reset timeout, then the circuit should half-open and let
    // a successful call through, closing it.
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    client.push_success("recovered");
    let seventh = orchestrator.generate("hi", &options).await.unwrap();
    assert_eq!(seventh.content, "recovered");

    // With the breaker closed again, a further failure doesn't immediately
    // reopen it (failure_count was reset on close).
    client.push_failure(ProviderError::Transient("blip".into()));
    let eighth = orchestrator.generate("hi", &options).await;
    assert!(eighth.is_err());
}

/// Scenario 5: with the primary provider unhealthy, `generate_with_fallback`
/// serves the response from the next usable provider and never throws.
#[tokio::test]
async fn fallback_serves_from_the_next_usable_provider() {
    let openai = provider("openai");
    openai.set_healthy(false);
    let anthropic = provider("anthropic");
    anthropic.push_success("hello from anthropic");

    let orchestrator = OrchestratorBuilder::new()
        .provider(openai)
        .provider(anthropic)
        .selection_strategy(SelectionStrategy::RoundRobin)
        .build()
        .unwrap();
    orchestrator.warm_up().await;

    let response = orchestrator.generate_with_fallback("hi", &GenerateOptions::default()).await;
    assert_eq!(response.content, "hello from anthropic");
    assert!(!response.cached);
}

/// `generate_with_fallback` never throws: once every provider is exhausted
/// it degrades to the static fallback message instead (P9).
#[tokio::test]
async fn fallback_degrades_to_static_message_when_all_providers_fail() {
    let a = provider("a");
    a.push_failure(ProviderError::Transient("down".into()));
    let b = provider("b");
    b.push_failure(ProviderError::Transient("also down".into()));

    let orchestrator = OrchestratorBuilder::new().provider(a).provider(b).build().unwrap();
    orchestrator.warm_up().await;

    let response = orchestrator.generate_with_fallback("hi", &GenerateOptions::default()).await;
    assert_eq!(response.content, FALLBACK_MESSAGE);
    assert!(!response.cached);
}

/// Scenario 6: six calls within the burst window exceed a `burst_limit` of
/// five; after the window elapses, the next call is allowed again.
#[tokio::test]
async fn rate_limit_burst_then_recovers_after_the_window() {
    let client = provider("primary");
    for _ in 0..5 {
        client.push_success("ok");
    }

    let limits = RateLimitLimits::builder().burst_limit(5).burst_window(Duration::from_millis(50)).build();
    let orchestrator = OrchestratorBuilder::new().provider(client.clone()).ratelimit_limits(limits).build().unwrap();
    orchestrator.warm_up().await;

    let mut options = GenerateOptions::default();
    options.user_id = Some("burst-user".to_string());
    options.record_quota = true;

    for _ in 0..5 {
        orchestrator.generate("hi", &options).await.unwrap();
    }

    let sixth = orchestrator.generate("hi", &options).await;
    assert!(matches!(sixth, Err(OrchestratorError::RateLimitExceeded(_))), "got {sixth:?}");

    tokio::time::sleep(Duration::from_millis(60)).await;
    client.push_success("ok again");
    let after_window = orchestrator.generate("hi", &options).await;
    assert!(after_window.is_ok(), "got {after_window:?}");
}
