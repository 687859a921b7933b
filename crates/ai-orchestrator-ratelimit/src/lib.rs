//! Sliding-window rate limiting with burst detection for the AI request
//! orchestrator (§4.5, C8).
//!
//! Distinct from `ai-orchestrator-quota`'s long-horizon ceilings: this crate
//! enforces short-horizon (minute/hour) request/token/cost rates plus a
//! burst window tracked in a sorted set, mirroring the KV layout in §6.4.
//! Grounded on the minute/hour bucketed-counter shape shared with
//! `ai-orchestrator-quota`, generalized with a `ZAdd`/`ZRemRangeByScore`
//! burst window in place of quota's plain hash counters.
//!
//! ## Feature Flags
//! - `metrics`: denial counters via the `metrics` crate
//! - `tracing`: denial logging via the `tracing` crate

mod config;
mod error;
mod events;

pub use config::{RateLimitConfig, RateLimitConfigBuilder, RateLimitLimits, RateLimitLimitsBuilder};
pub use error::{RateLimitError, RateLimitViolation};
pub use events::RateLimitEvent;

use ai_orchestrator_core::{bucket_key, BucketGranularity, Clock, KeyValueStore};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::counter;

/// Which counter/window a rate limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDimension {
    RequestsPerMinute,
    RequestsPerHour,
    TokensPerMinute,
    TokensPerHour,
    CostPerMinute,
    CostPerHour,
    Burst,
}

impl fmt::Display for RateLimitDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RateLimitDimension::RequestsPerMinute => "requests_per_minute",
            RateLimitDimension::RequestsPerHour => "requests_per_hour",
            RateLimitDimension::TokensPerMinute => "tokens_per_minute",
            RateLimitDimension::TokensPerHour => "tokens_per_hour",
            RateLimitDimension::CostPerMinute => "cost_per_minute",
            RateLimitDimension::CostPerHour => "cost_per_hour",
            RateLimitDimension::Burst => "burst",
        };
        write!(f, "{label}")
    }
}

const MINUTE_TTL: Duration = Duration::from_secs(60 * 60);
const HOUR_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const BURST_KEY_TTL: Duration = Duration::from_secs(60);

/// Result of [`RateLimiter::check`]: whether the request may proceed, and
/// every dimension that was found in violation (§4.5: "aggregates all
/// violations before returning").
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub can_make_request: bool,
    pub violations: Vec<RateLimitViolation>,
}

/// Per-user sliding-window rate limiting backed by a [`KeyValueStore`]
/// (§4.5, C8).
pub struct RateLimiter {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        Self { kv, clock, config }
    }

    fn minute_prefix(&self, user_id: &str) -> String {
        format!(
            "{}:{}:minute:{}",
            self.config.key_prefix,
            user_id,
            bucket_key(self.clock.now(), BucketGranularity::Minute)
        )
    }

    fn hour_prefix(&self, user_id: &str) -> String {
        format!(
            "{}:{}:hour:{}",
            self.config.key_prefix,
            user_id,
            bucket_key(self.clock.now(), BucketGranularity::Hour)
        )
    }

    fn burst_key(&self, user_id: &str) -> String {
        format!("{}:burst:{}", self.config.key_prefix, user_id)
    }

    async fn read_counter(&self, key: &str) -> Result<i64, RateLimitError> {
        match self.kv.get(key).await? {
            None => Ok(0),
            Some(bytes) => {
                let array: [u8; 8] = bytes.try_into().unwrap_or([0; 8]);
                Ok(i64::from_le_bytes(array))
            }
        }
    }

    async fn read_float_counter(&self, key: &str) -> Result<f64, RateLimitError> {
        match self.kv.get(key).await? {
            None => Ok(0.0),
            Some(bytes) => {
                let array: [u8; 8] = bytes.try_into().unwrap_or([0; 8]);
                Ok(f64::from_le_bytes(array))
            }
        }
    }

    fn maybe_violate(
        &self,
        user_id: &str,
        dimension: RateLimitDimension,
        usage: f64,
        limit: Option<f64>,
        violations: &mut Vec<RateLimitViolation>,
    ) {
        let Some(limit) = limit else { return };
        if usage >= limit {
            violations.push(RateLimitViolation { dimension, limit, usage });

            let event = RateLimitEvent::Exceeded {
                user_id: user_id.to_string(),
                dimension,
                limit,
                usage,
                timestamp: Instant::now(),
            };
            self.config.event_listeners.emit(&event);

            #[cfg(feature = "tracing")]
            tracing::warn!(user_id, %dimension, limit, usage, "rate limit exceeded");
            #[cfg(feature = "metrics")]
            counter!("rate_limit_denials_total", "dimension" => dimension.to_string()).increment(1);
        }
    }

    /// Computes usage across every configured dimension and returns every
    /// violation found, without mutating state (§4.5). `tokens`/`cost` of
    /// `0` check only request-count and burst dimensions.
    pub async fn check(
        &self,
        user_id: &str,
        tokens: u64,
        cost: f64,
        limits: Option<&RateLimitLimits>,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let limits = limits.unwrap_or(&self.config.default_limits);
        let mut violations = Vec::new();

        let minute_prefix = self.minute_prefix(user_id);
        let hour_prefix = self.hour_prefix(user_id);

        let minute_requests = self.read_counter(&format!("{minute_prefix}:requests")).await?;
        let minute_tokens = self.read_counter(&format!("{minute_prefix}:tokens")).await?;
        let minute_cost = self.read_float_counter(&format!("{minute_prefix}:cost")).await?;
        let hour_requests = self.read_counter(&format!("{hour_prefix}:requests")).await?;
        let hour_tokens = self.read_counter(&format!("{hour_prefix}:tokens")).await?;
        let hour_cost = self.read_float_counter(&format!("{hour_prefix}:cost")).await?;

        self.maybe_violate(
            user_id,
            RateLimitDimension::RequestsPerMinute,
            minute_requests as f64,
            limits.requests_per_minute.map(|n| n as f64),
            &mut violations,
        );
        self.maybe_violate(
            user_id,
            RateLimitDimension::RequestsPerHour,
            hour_requests as f64,
            limits.requests_per_hour.map(|n| n as f64),
            &mut violations,
        );
        if tokens > 0 {
            self.maybe_violate(
                user_id,
                RateLimitDimension::TokensPerMinute,
                minute_tokens as f64,
                limits.tokens_per_minute.map(|n| n as f64),
                &mut violations,
            );
            self.maybe_violate(
                user_id,
                RateLimitDimension::TokensPerHour,
                hour_tokens as f64,
                limits.tokens_per_hour.map(|n| n as f64),
                &mut violations,
            );
        }
        if cost > 0.0 {
            self.maybe_violate(
                user_id,
                RateLimitDimension::CostPerMinute,
                minute_cost,
                limits.cost_per_minute,
                &mut violations,
            );
            self.maybe_violate(
                user_id,
                RateLimitDimension::CostPerHour,
                hour_cost,
                limits.cost_per_hour,
                &mut violations,
            );
        }

        if let Some(burst_limit) = limits.burst_limit {
            let now_ms = self.clock.now().timestamp_millis() as f64;
            let window_ms = limits.burst_window.as_millis() as f64;
            let burst_count = self
                .kv
                .zcount(&self.burst_key(user_id), now_ms - window_ms, now_ms)
                .await?;
            self.maybe_violate(
                user_id,
                RateLimitDimension::Burst,
                burst_count as f64,
                Some(burst_limit as f64),
                &mut violations,
            );
        }

        Ok(RateLimitDecision {
            can_make_request: violations.is_empty(),
            violations,
        })
    }

    /// Convenience wrapper over [`Self::check`] that turns any violation
    /// into a [`RateLimitError::Exceeded`] (§4.7 step 1: "refuse if either
    /// denies").
    pub async fn enforce(
        &self,
        user_id: &str,
        tokens: u64,
        cost: f64,
        limits: Option<&RateLimitLimits>,
    ) -> Result<(), RateLimitError> {
        let decision = self.check(user_id, tokens, cost, limits).await?;
        if decision.can_make_request {
            Ok(())
        } else {
            Err(RateLimitError::Exceeded {
                user_id: user_id.to_string(),
                violations: decision.violations,
            })
        }
    }

    /// Records one request's usage: pipelined minute/hour increments, then
    /// a burst-window `ZAdd` + trim (§4.5).
    pub async fn record_request(&self, user_id: &str, tokens: u64, cost: f64) -> Result<(), RateLimitError> {
        let minute_prefix = self.minute_prefix(user_id);
        let hour_prefix = self.hour_prefix(user_id);

        self.kv
            .incr_by(&format!("{minute_prefix}:requests"), 1, Some(MINUTE_TTL))
            .await?;
        self.kv
            .incr_by(&format!("{minute_prefix}:tokens"), tokens as i64, Some(MINUTE_TTL))
            .await?;
        self.kv
            .incr_by_f64(&format!("{minute_prefix}:cost"), cost, Some(MINUTE_TTL))
            .await?;

        self.kv
            .incr_by(&format!("{hour_prefix}:requests"), 1, Some(HOUR_TTL))
            .await?;
        self.kv
            .incr_by(&format!("{hour_prefix}:tokens"), tokens as i64, Some(HOUR_TTL))
            .await?;
        self.kv
            .incr_by_f64(&format!("{hour_prefix}:cost"), cost, Some(HOUR_TTL))
            .await?;

        let burst_key = self.burst_key(user_id);
        let now_ms = self.clock.now().timestamp_millis() as f64;
        let burst_window = self.config.default_limits.burst_window;
        self.kv
            .zadd(&burst_key, format!("{user_id}:{now_ms}"), now_ms)
            .await?;
        self.kv
            .zremrangebyscore(&burst_key, now_ms - burst_window.as_millis() as f64)
            .await?;
        self.kv.expire(&burst_key, BURST_KEY_TTL).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_orchestrator_core::{FakeClock, FakeKeyValueStore};
    use chrono::{TimeZone, Utc};

    fn service(limits: RateLimitLimits) -> RateLimiter {
        let kv: Arc<dyn KeyValueStore> = Arc::new(FakeKeyValueStore::new());
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()));
        let config = RateLimitConfig::builder().default_limits(limits).build();
        RateLimiter::new(kv, clock, config)
    }

    #[tokio::test]
    async fn check_allows_when_under_limit() {
        let limiter = service(RateLimitLimits::builder().requests_per_minute(5).build());
        limiter.record_request("u1", 10, 0.01).await.unwrap();
        let decision = limiter.check("u1", 0, 0.0, None).await.unwrap();
        assert!(decision.can_make_request);
        assert!(decision.violations.is_empty());
    }

    #[tokio::test]
    async fn check_denies_and_reports_every_violated_dimension() {
        let limits = RateLimitLimits::builder()
            .requests_per_minute(1)
            .tokens_per_minute(10)
            .build();
        let limiter = service(limits);
        limiter.record_request("u1", 10, 0.0).await.unwrap();

        let decision = limiter.check("u1", 5, 0.0, None).await.unwrap();
        assert!(!decision.can_make_request);
        assert_eq!(decision.violations.len(), 2);
        assert!(decision
            .violations
            .iter()
            .any(|v| v.dimension == RateLimitDimension::RequestsPerMinute));
        assert!(decision
            .violations
            .iter()
            .any(|v| v.dimension == RateLimitDimension::TokensPerMinute));
    }

    #[tokio::test]
    async fn enforce_returns_exceeded_error() {
        let limiter = service(RateLimitLimits::builder().requests_per_minute(1).build());
        limiter.record_request("u1", 0, 0.0).await.unwrap();

        let err = limiter.enforce("u1", 0, 0.0, None).await.unwrap_err();
        assert!(err.is_exceeded());
    }

    #[tokio::test]
    async fn burst_window_counts_recent_requests_only() {
        let limits = RateLimitLimits::builder().burst_limit(2).build();
        let limiter = service(limits);

        limiter.record_request("u1", 0, 0.0).await.unwrap();
        limiter.record_request("u1", 0, 0.0).await.unwrap();

        let decision = limiter.check("u1", 0, 0.0, None).await.unwrap();
        assert!(!decision.can_make_request);
        assert!(decision
            .violations
            .iter()
            .any(|v| v.dimension == RateLimitDimension::Burst));
    }

    #[tokio::test]
    async fn minute_and_hour_buckets_are_independent_of_quota_crate() {
        let limiter = service(RateLimitLimits::default());
        for _ in 0..3 {
            limiter.record_request("u1", 100, 0.02).await.unwrap();
        }
        let decision = limiter.check("u1", 0, 0.0, None).await.unwrap();
        assert!(decision.can_make_request);
    }
}
