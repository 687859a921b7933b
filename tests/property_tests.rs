//! Property-based tests against the quantified invariants named in the
//! orchestration spec's "Testable Properties" section (P1, P8, P10). Each
//! test drives only the public API of the relevant component crate with
//! randomly generated sequences via `proptest`.

use ai_orchestrator_core::{BucketGranularity, Clock, FakeClock, FakeKeyValueStore, KeyValueStore};
use ai_orchestrator_health::{HealthStatus, ProviderHealth, ProviderSelector, SelectionStrategy};
use ai_orchestrator_quota::{QuotaConfig, QuotaService};
use ai_orchestrator_ratelimit::{RateLimitConfig, RateLimitDimension, RateLimitLimits, RateLimiter};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FakeClock::new(Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// P1: after any sequence of `record(u, tokens_i, cost_i)` calls within
    /// one bucket, `requests == #records`, `tokens == sum(tokens_i)`, and
    /// `cost == sum(cost_i)` within float epsilon.
    #[test]
    fn quota_usage_matches_the_sum_of_every_record(
        records in prop::collection::vec((0u64..5_000, 0.0f64..50.0), 1..40)
    ) {
        let runtime = Runtime::new().unwrap();
        runtime.block_on(async {
            let kv: Arc<dyn KeyValueStore> = Arc::new(FakeKeyValueStore::new());
            let service = QuotaService::new(kv, fixed_clock(), QuotaConfig::builder().build());

            let mut expected_tokens = 0u64;
            let mut expected_cost = 0.0f64;
            for &(tokens, cost) in &records {
                service.record("u1", None, tokens, cost).await.unwrap();
                expected_tokens += tokens;
                expected_cost += cost;
            }

            let snapshot = service.enforce("u1", None, None).await.unwrap();
            prop_assert_eq!(snapshot.monthly.requests, records.len() as u64);
            prop_assert_eq!(snapshot.monthly.tokens, expected_tokens);
            prop_assert!((snapshot.monthly.cost - expected_cost).abs() < 1e-6);
            Ok(())
        })?;
    }

    /// P10: round-robin over a fixed set of N healthy providers visits them
    /// in registration order and wraps around, for any number of calls.
    #[test]
    fn round_robin_cycles_through_healthy_providers_in_order(
        provider_count in 1usize..8,
        call_count in 0usize..40,
    ) {
        let names: Vec<String> = (0..provider_count).map(|i| format!("p{i}")).collect();
        let healths: Vec<ProviderHealth> = names
            .iter()
            .map(|name| ProviderHealth {
                name: name.clone(),
                status: HealthStatus::Healthy,
                latency_ms: 0,
                consecutive_failures: 0,
                consecutive_successes: 0,
                error_rate: 0.0,
                last_checked: std::time::Instant::now(),
                failure_reason: None,
            })
            .collect();

        let selector = ProviderSelector::new(SelectionStrategy::RoundRobin);
        for i in 0..call_count {
            let selected = selector.select(&healths, None).unwrap();
            prop_assert_eq!(selected, names[i % provider_count].clone());
        }
    }

    /// P8: the burst dimension is in violation exactly when the number of
    /// requests recorded within `[now - burst_window, now]` has reached
    /// `burst_limit`, for any sequence of record timings.
    #[test]
    fn burst_violation_matches_a_manual_window_count(
        deltas_ms in prop::collection::vec(0u64..500, 1..20),
        burst_window_ms in 50u64..500,
        burst_limit in 1u64..10,
    ) {
        let runtime = Runtime::new().unwrap();
        runtime.block_on(async {
            let kv: Arc<dyn KeyValueStore> = Arc::new(FakeKeyValueStore::new());
            let clock = Arc::new(FakeClock::new(Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap()));
            let limits = RateLimitLimits::builder()
                .burst_limit(burst_limit)
                .burst_window(Duration::from_millis(burst_window_ms))
                .build();
            let clock_dyn: Arc<dyn Clock> = Arc::clone(&clock);
            let limiter = RateLimiter::new(kv, clock_dyn, RateLimitConfig::builder().default_limits(limits).build());

            let mut timestamps_ms = Vec::new();
            for &delta in &deltas_ms {
                clock.advance(chrono::Duration::milliseconds(delta as i64));
                limiter.record_request("u1", 0, 0.0).await.unwrap();
                timestamps_ms.push(clock.now().timestamp_millis());
            }

            let now_ms = clock.now().timestamp_millis();
            let window_start = now_ms - burst_window_ms as i64;
            let manual_count = timestamps_ms.iter().filter(|&&t| t >= window_start && t <= now_ms).count() as u64;

            let decision = limiter.check("u1", 0, 0.0, None).await.unwrap();
            let has_violation = decision.violations.iter().any(|v| v.dimension == RateLimitDimension::Burst);
            prop_assert_eq!(has_violation, manual_count >= burst_limit);
            Ok(())
        })?;
    }

    /// Bucket keys are derived purely from the UTC date components of
    /// `Clock::now()`, so two distinct timestamps that fall in the same
    /// granularity window always derive the same key, and the TTL computed
    /// from either always lands before the granularity's *next* boundary.
    #[test]
    fn seconds_until_next_bucket_is_always_positive_and_bounded(
        hour in 0u32..24,
        minute in 0u32..60,
        second in 0u32..60,
    ) {
        let t = Utc.with_ymd_and_hms(2026, 7, 28, hour, minute, second).unwrap();
        let remaining = ai_orchestrator_core::seconds_until_next_bucket(t, BucketGranularity::Hour);
        prop_assert!(remaining > 0);
        prop_assert!(remaining <= 3600);
    }
}
