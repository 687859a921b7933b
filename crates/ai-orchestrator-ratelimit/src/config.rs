use crate::events::RateLimitEvent;
use ai_orchestrator_core::{EventListeners, FnListener};
use std::time::Duration;

/// Per-dimension ceilings enforced by [`crate::RateLimiter::check`].
///
/// `None` means unlimited for that dimension. Mirrors the `ai:ratelimit:
/// config:{userId}` JSON document named in §6.4.
#[derive(Debug, Clone)]
pub struct RateLimitLimits {
    pub requests_per_minute: Option<u64>,
    pub requests_per_hour: Option<u64>,
    pub tokens_per_minute: Option<u64>,
    pub tokens_per_hour: Option<u64>,
    pub cost_per_minute: Option<f64>,
    pub cost_per_hour: Option<f64>,
    pub burst_limit: Option<u64>,
    pub burst_window: Duration,
}

impl Default for RateLimitLimits {
    fn default() -> Self {
        Self {
            requests_per_minute: None,
            requests_per_hour: None,
            tokens_per_minute: None,
            tokens_per_hour: None,
            cost_per_minute: None,
            cost_per_hour: None,
            burst_limit: None,
            burst_window: Duration::from_secs(60),
        }
    }
}

impl RateLimitLimits {
    pub fn builder() -> RateLimitLimitsBuilder {
        RateLimitLimitsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RateLimitLimitsBuilder {
    limits: RateLimitLimits,
}

impl RateLimitLimitsBuilder {
    pub fn requests_per_minute(mut self, n: u64) -> Self {
        self.limits.requests_per_minute = Some(n);
        self
    }

    pub fn requests_per_hour(mut self, n: u64) -> Self {
        self.limits.requests_per_hour = Some(n);
        self
    }

    pub fn tokens_per_minute(mut self, n: u64) -> Self {
        self.limits.tokens_per_minute = Some(n);
        self
    }

    pub fn tokens_per_hour(mut self, n: u64) -> Self {
        self.limits.tokens_per_hour = Some(n);
        self
    }

    pub fn cost_per_minute(mut self, n: f64) -> Self {
        self.limits.cost_per_minute = Some(n);
        self
    }

    pub fn cost_per_hour(mut self, n: f64) -> Self {
        self.limits.cost_per_hour = Some(n);
        self
    }

    /// Maximum requests allowed within `burst_window` (default 60s), tracked
    /// via a sorted set keyed on epoch-millisecond membership (§4.5).
    pub fn burst_limit(mut self, n: u64) -> Self {
        self.limits.burst_limit = Some(n);
        self
    }

    pub fn burst_window(mut self, window: Duration) -> Self {
        self.limits.burst_window = window;
        self
    }

    pub fn build(self) -> RateLimitLimits {
        self.limits
    }
}

/// Configuration for [`crate::RateLimiter`].
pub struct RateLimitConfig {
    pub(crate) key_prefix: String,
    pub(crate) default_limits: RateLimitLimits,
    pub(crate) event_listeners: EventListeners<RateLimitEvent>,
}

impl RateLimitConfig {
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }
}

pub struct RateLimitConfigBuilder {
    key_prefix: String,
    default_limits: RateLimitLimits,
    event_listeners: EventListeners<RateLimitEvent>,
}

impl RateLimitConfigBuilder {
    pub fn new() -> Self {
        Self {
            key_prefix: String::from("ai:ratelimit"),
            default_limits: RateLimitLimits::default(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Redis-style key prefix (§6.4). Default: `"ai:ratelimit"`.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn default_limits(mut self, limits: RateLimitLimits) -> Self {
        self.default_limits = limits;
        self
    }

    pub fn on_exceeded<F>(mut self, f: F) -> Self
    where
        F: Fn(&RateLimitEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RateLimitEvent| f(event)));
        self
    }

    pub fn build(self) -> RateLimitConfig {
        RateLimitConfig {
            key_prefix: self.key_prefix,
            default_limits: self.default_limits,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
