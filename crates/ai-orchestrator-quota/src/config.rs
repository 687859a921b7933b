use crate::events::QuotaEvent;
use ai_orchestrator_core::{EventListeners, FnListener};

/// Per-dimension ceilings enforced by [`crate::QuotaService::enforce`].
///
/// `None` means unlimited for that dimension. Mirrors the `ai:quota:config:
/// {userId}` JSON document named in §6.4 — callers load that document
/// (out of scope for this crate, which only enforces against whatever
/// [`QuotaLimits`] it is handed) and pass it to `enforce`/use it as the
/// service default.
#[derive(Debug, Clone, Default)]
pub struct QuotaLimits {
    pub monthly_requests: Option<u64>,
    pub monthly_tokens: Option<u64>,
    pub monthly_cost: Option<f64>,
    pub daily_requests: Option<u64>,
    pub daily_tokens: Option<u64>,
    pub daily_cost: Option<f64>,
    pub session_requests: Option<u64>,
    pub session_tokens: Option<u64>,
    pub session_cost: Option<f64>,
}

impl QuotaLimits {
    pub fn builder() -> QuotaLimitsBuilder {
        QuotaLimitsBuilder::default()
    }
}

/// Builder for [`QuotaLimits`].
#[derive(Debug, Clone, Default)]
pub struct QuotaLimitsBuilder {
    limits: QuotaLimits,
}

impl QuotaLimitsBuilder {
    pub fn monthly_requests(mut self, n: u64) -> Self {
        self.limits.monthly_requests = Some(n);
        self
    }

    pub fn monthly_tokens(mut self, n: u64) -> Self {
        self.limits.monthly_tokens = Some(n);
        self
    }

    pub fn monthly_cost(mut self, n: f64) -> Self {
        self.limits.monthly_cost = Some(n);
        self
    }

    pub fn daily_requests(mut self, n: u64) -> Self {
        self.limits.daily_requests = Some(n);
        self
    }

    pub fn daily_tokens(mut self, n: u64) -> Self {
        self.limits.daily_tokens = Some(n);
        self
    }

    pub fn daily_cost(mut self, n: f64) -> Self {
        self.limits.daily_cost = Some(n);
        self
    }

    pub fn session_requests(mut self, n: u64) -> Self {
        self.limits.session_requests = Some(n);
        self
    }

    pub fn session_tokens(mut self, n: u64) -> Self {
        self.limits.session_tokens = Some(n);
        self
    }

    pub fn session_cost(mut self, n: f64) -> Self {
        self.limits.session_cost = Some(n);
        self
    }

    pub fn build(self) -> QuotaLimits {
        self.limits
    }
}

/// Configuration for [`crate::QuotaService`].
pub struct QuotaConfig {
    pub(crate) key_prefix: String,
    pub(crate) default_limits: QuotaLimits,
    pub(crate) event_listeners: EventListeners<QuotaEvent>,
}

impl QuotaConfig {
    pub fn builder() -> QuotaConfigBuilder {
        QuotaConfigBuilder::new()
    }
}

/// Builder for [`QuotaConfig`].
pub struct QuotaConfigBuilder {
    key_prefix: String,
    default_limits: QuotaLimits,
    event_listeners: EventListeners<QuotaEvent>,
}

impl QuotaConfigBuilder {
    pub fn new() -> Self {
        Self {
            key_prefix: String::from("ai:quota"),
            default_limits: QuotaLimits::default(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Redis-style key prefix (§6.4). Default: `"ai:quota"`.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Limits applied when `enforce` is called without an explicit
    /// per-call override.
    pub fn default_limits(mut self, limits: QuotaLimits) -> Self {
        self.default_limits = limits;
        self
    }

    pub fn on_exceeded<F>(mut self, f: F) -> Self
    where
        F: Fn(&QuotaEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &QuotaEvent| f(event)));
        self
    }

    pub fn build(self) -> QuotaConfig {
        QuotaConfig {
            key_prefix: self.key_prefix,
            default_limits: self.default_limits,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for QuotaConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
