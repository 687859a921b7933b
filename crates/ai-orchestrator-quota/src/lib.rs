//! Per-user usage quotas for the AI request orchestrator (§4.4, C7).
//!
//! A quota is a long-horizon (monthly/daily/session) ceiling on requests,
//! tokens, and cost — distinct from the short-horizon rate limits in
//! `ai-orchestrator-ratelimit`. [`QuotaService`] has no teacher counterpart
//! (the repo this workspace is transformed from has no long-horizon usage
//! accounting); it is grounded on `ai-orchestrator-ratelimit`'s bucketed
//! counter shape and on `ai-orchestrator-core::kv`'s first-write-TTL
//! convention, since both share the "hash of counters per time bucket"
//! storage pattern described in §4.4/§4.5.
//!
//! ## Feature Flags
//! - `metrics`: denial counters via the `metrics` crate
//! - `tracing`: denial logging via the `tracing` crate

mod config;
mod error;
mod events;

pub use config::{QuotaConfig, QuotaConfigBuilder, QuotaLimits, QuotaLimitsBuilder};
pub use error::QuotaError;
pub use events::QuotaEvent;

use ai_orchestrator_core::{bucket_key, BucketGranularity, Clock, KeyValueStore};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::counter;

/// The long-horizon window a quota dimension is measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaPeriod {
    Monthly,
    Daily,
    Session,
}

impl fmt::Display for QuotaPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaPeriod::Monthly => write!(f, "monthly"),
            QuotaPeriod::Daily => write!(f, "daily"),
            QuotaPeriod::Session => write!(f, "session"),
        }
    }
}

/// Which counter field a limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDimension {
    Requests,
    Tokens,
    Cost,
}

impl fmt::Display for QuotaDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaDimension::Requests => write!(f, "requests"),
            QuotaDimension::Tokens => write!(f, "tokens"),
            QuotaDimension::Cost => write!(f, "cost"),
        }
    }
}

/// The three counters tracked per bucket (§3).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuotaUsage {
    pub requests: u64,
    pub tokens: u64,
    pub cost: f64,
}

/// Snapshot returned by [`QuotaService::enforce`] — the counters that were
/// checked, as of the call.
#[derive(Debug, Clone, Default)]
pub struct QuotaSnapshot {
    pub monthly: QuotaUsage,
    pub daily: QuotaUsage,
    pub session: Option<QuotaUsage>,
}

const MONTH_TTL: Duration = Duration::from_secs(35 * 24 * 60 * 60);
const DAY_TTL: Duration = Duration::from_secs(2 * 24 * 60 * 60);
const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-user/per-session usage accounting backed by a [`KeyValueStore`]
/// (§4.4, C7).
pub struct QuotaService {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: QuotaConfig,
}

impl QuotaService {
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: QuotaConfig) -> Self {
        Self { kv, clock, config }
    }

    fn month_prefix(&self, user_id: &str) -> String {
        format!(
            "{}:{}:month:{}",
            self.config.key_prefix,
            user_id,
            bucket_key(self.clock.now(), BucketGranularity::Month)
        )
    }

    fn day_prefix(&self, user_id: &str) -> String {
        format!(
            "{}:{}:day:{}",
            self.config.key_prefix,
            user_id,
            bucket_key(self.clock.now(), BucketGranularity::Day)
        )
    }

    fn session_prefix(&self, session_id: &str) -> String {
        format!("{}:session:{}", self.config.key_prefix, session_id)
    }

    async fn read_counter(&self, key: &str) -> Result<i64, QuotaError> {
        match self.kv.get(key).await? {
            None => Ok(0),
            Some(bytes) => {
                let array: [u8; 8] = bytes.try_into().unwrap_or([0; 8]);
                Ok(i64::from_le_bytes(array))
            }
        }
    }

    async fn read_float_counter(&self, key: &str) -> Result<f64, QuotaError> {
        match self.kv.get(key).await? {
            None => Ok(0.0),
            Some(bytes) => {
                let array: [u8; 8] = bytes.try_into().unwrap_or([0; 8]);
                Ok(f64::from_le_bytes(array))
            }
        }
    }

    async fn read_usage(&self, prefix: &str) -> Result<QuotaUsage, QuotaError> {
        let requests = self.read_counter(&format!("{prefix}:requests")).await?;
        let tokens = self.read_counter(&format!("{prefix}:tokens")).await?;
        let cost = self.read_float_counter(&format!("{prefix}:cost")).await?;
        Ok(QuotaUsage {
            requests: requests.max(0) as u64,
            tokens: tokens.max(0) as u64,
            cost: cost.max(0.0),
        })
    }

    fn check(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        period: QuotaPeriod,
        dimension: QuotaDimension,
        usage: f64,
        limit: Option<f64>,
    ) -> Result<(), QuotaError> {
        let Some(limit) = limit else { return Ok(()) };
        if usage >= limit {
            let event = QuotaEvent::Exceeded {
                user_id: user_id.to_string(),
                session_id: session_id.map(str::to_string),
                period,
                dimension,
                limit,
                usage,
                timestamp: Instant::now(),
            };
            self.config.event_listeners.emit(&event);

            #[cfg(feature = "tracing")]
            tracing::warn!(user_id, ?period, ?dimension, limit, usage, "quota exceeded");
            #[cfg(feature = "metrics")]
            counter!(
                "quota_denials_total",
                "period" => period.to_string(),
                "dimension" => dimension.to_string()
            )
            .increment(1);

            return Err(QuotaError::Exceeded {
                user_id: user_id.to_string(),
                session_id: session_id.map(str::to_string),
                period,
                dimension,
                limit,
                usage,
            });
        }
        Ok(())
    }

    /// Checks every configured dimension for `user_id` (and `session_id`,
    /// if present) and fails on the first denial (§4.4, P2).
    pub async fn enforce(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        limits: Option<&QuotaLimits>,
    ) -> Result<QuotaSnapshot, QuotaError> {
        let limits = limits.unwrap_or(&self.config.default_limits);

        let monthly = self.read_usage(&self.month_prefix(user_id)).await?;
        let daily = self.read_usage(&self.day_prefix(user_id)).await?;
        let session = match session_id {
            Some(sid) => Some(self.read_usage(&self.session_prefix(sid)).await?),
            None => None,
        };

        self.check(
            user_id,
            session_id,
            QuotaPeriod::Monthly,
            QuotaDimension::Requests,
            monthly.requests as f64,
            limits.monthly_requests.map(|n| n as f64),
        )?;
        self.check(
            user_id,
            session_id,
            QuotaPeriod::Monthly,
            QuotaDimension::Tokens,
            monthly.tokens as f64,
            limits.monthly_tokens.map(|n| n as f64),
        )?;
        self.check(
            user_id,
            session_id,
            QuotaPeriod::Monthly,
            QuotaDimension::Cost,
            monthly.cost,
            limits.monthly_cost,
        )?;

        self.check(
            user_id,
            session_id,
            QuotaPeriod::Daily,
            QuotaDimension::Requests,
            daily.requests as f64,
            limits.daily_requests.map(|n| n as f64),
        )?;
        self.check(
            user_id,
            session_id,
            QuotaPeriod::Daily,
            QuotaDimension::Tokens,
            daily.tokens as f64,
            limits.daily_tokens.map(|n| n as f64),
        )?;
        self.check(
            user_id,
            session_id,
            QuotaPeriod::Daily,
            QuotaDimension::Cost,
            daily.cost,
            limits.daily_cost,
        )?;

        if let (Some(session_usage), Some(sid)) = (session, session_id) {
            self.check(
                user_id,
                Some(sid),
                QuotaPeriod::Session,
                QuotaDimension::Requests,
                session_usage.requests as f64,
                limits.session_requests.map(|n| n as f64),
            )?;
            self.check(
                user_id,
                Some(sid),
                QuotaPeriod::Session,
                QuotaDimension::Tokens,
                session_usage.tokens as f64,
                limits.session_tokens.map(|n| n as f64),
            )?;
            self.check(
                user_id,
                Some(sid),
                QuotaPeriod::Session,
                QuotaDimension::Cost,
                session_usage.cost,
                limits.session_cost,
            )?;
        }

        Ok(QuotaSnapshot { monthly, daily, session })
    }

    async fn increment_bucket(&self, prefix: &str, ttl: Duration, tokens: u64, cost: f64) -> Result<(), QuotaError> {
        self.kv
            .incr_by(&format!("{prefix}:requests"), 1, Some(ttl))
            .await?;
        self.kv
            .incr_by(&format!("{prefix}:tokens"), tokens as i64, Some(ttl))
            .await?;
        self.kv
            .incr_by_f64(&format!("{prefix}:cost"), cost, Some(ttl))
            .await?;
        Ok(())
    }

    /// Records one request's usage against the monthly, daily, and (if
    /// present) session buckets. First write on a bucket establishes its
    /// TTL (§4.4, §9 open question: "first-write semantics").
    pub async fn record(&self, user_id: &str, session_id: Option<&str>, tokens: u64, cost: f64) -> Result<(), QuotaError> {
        self.increment_bucket(&self.month_prefix(user_id), MONTH_TTL, tokens, cost).await?;
        self.increment_bucket(&self.day_prefix(user_id), DAY_TTL, tokens, cost).await?;
        if let Some(sid) = session_id {
            self.increment_bucket(&self.session_prefix(sid), SESSION_TTL, tokens, cost).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_orchestrator_core::{FakeClock, FakeKeyValueStore};
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service(limits: QuotaLimits) -> (QuotaService, Arc<dyn KeyValueStore>) {
        let kv: Arc<dyn KeyValueStore> = Arc::new(FakeKeyValueStore::new());
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap()));
        let config = QuotaConfig::builder().default_limits(limits).build();
        (QuotaService::new(Arc::clone(&kv), clock, config), kv)
    }

    #[tokio::test]
    async fn record_then_enforce_reflects_usage() {
        let (service, _kv) = service(QuotaLimits::default());
        service.record("u1", Some("s1"), 100, 0.01).await.unwrap();
        service.record("u1", Some("s1"), 50, 0.02).await.unwrap();

        let snapshot = service.enforce("u1", Some("s1"), None).await.unwrap();
        assert_eq!(snapshot.monthly.requests, 2);
        assert_eq!(snapshot.monthly.tokens, 150);
        assert!((snapshot.monthly.cost - 0.03).abs() < 1e-9);
        assert_eq!(snapshot.daily.requests, 2);
        assert_eq!(snapshot.session.unwrap().requests, 2);
    }

    #[tokio::test]
    async fn enforce_denies_when_usage_reaches_limit() {
        let limits = QuotaLimits::builder().monthly_requests(2).build();
        let (service, _kv) = service(limits);
        service.record("u1", None, 10, 0.0).await.unwrap();
        service.record("u1", None, 10, 0.0).await.unwrap();

        let err = service.enforce("u1", None, None).await.unwrap_err();
        match err {
            QuotaError::Exceeded { dimension, period, limit, usage, .. } => {
                assert_eq!(dimension, QuotaDimension::Requests);
                assert_eq!(period, QuotaPeriod::Monthly);
                assert_eq!(limit, 2.0);
                assert_eq!(usage, 2.0);
            }
            other => panic!("expected Exceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn denial_emits_exactly_one_event() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let limits = QuotaLimits::builder().monthly_requests(1).build();

        let kv: Arc<dyn KeyValueStore> = Arc::new(FakeKeyValueStore::new());
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap()));
        let config = QuotaConfig::builder()
            .default_limits(limits)
            .on_exceeded(move |_event| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        let service = QuotaService::new(kv, clock, config);

        service.record("u1", None, 0, 0.0).await.unwrap();
        let _ = service.enforce("u1", None, None).await.unwrap_err();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_limits_never_denies() {
        let (service, _kv) = service(QuotaLimits::default());
        for _ in 0..100 {
            service.record("u1", None, 1000, 1.0).await.unwrap();
        }
        assert!(service.enforce("u1", None, None).await.is_ok());
    }

    #[tokio::test]
    async fn separate_users_have_independent_counters() {
        let (service, _kv) = service(QuotaLimits::builder().monthly_requests(1).build());
        service.record("u1", None, 0, 0.0).await.unwrap();
        assert!(service.enforce("u1", None, None).await.is_err());
        assert!(service.enforce("u2", None, None).await.is_ok());
    }
}
