//! Error classification for provider calls (§6.1).

use std::time::Duration;

/// Errors surfaced by a [`crate::ProviderClient`].
///
/// Only `Timeout`, `Transient`, and `RateLimited` trigger retry (§6.1).
/// `BadRequest` and `Auth` are client errors — surfaced immediately,
/// never counted as circuit-breaker failures.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider call timed out")]
    Timeout,

    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("provider rate limited the request")]
    RateLimited { retry_after: Option<Duration> },

    #[error("provider rejected credentials: {0}")]
    Auth(String),

    #[error("request rejected as malformed: {0}")]
    BadRequest(String),

    #[error("provider server error: {0}")]
    Server(String),

    #[error("unclassified provider error: {0}")]
    Unknown(String),
}

impl ProviderError {
    /// Whether the orchestrator should retry the call (§6.1).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout | ProviderError::Transient(_) | ProviderError::RateLimited { .. }
        )
    }

    /// Whether a failure of this kind should poison the circuit breaker.
    /// `BadRequest`/`Auth` are the caller's fault, not the provider's, so
    /// they don't count against the breaker (§6.1).
    pub fn counts_against_breaker(&self) -> bool {
        !matches!(self, ProviderError::BadRequest(_) | ProviderError::Auth(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if let Some(status) = err.status() {
            classify_status(status.as_u16(), err.to_string(), None)
        } else if err.is_connect() {
            ProviderError::Transient(err.to_string())
        } else {
            ProviderError::Unknown(err.to_string())
        }
    }
}

/// Classifies an HTTP status into a [`ProviderError`]. `retry_after` is the
/// caller's already-parsed `Retry-After` header value, carried through onto
/// `RateLimited` (§6.1/§7: "honor Retry-After").
pub(crate) fn classify_status(status: u16, message: String, retry_after: Option<Duration>) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(message),
        400 | 404 | 422 => ProviderError::BadRequest(message),
        429 => ProviderError::RateLimited { retry_after },
        500..=599 => ProviderError::Server(message),
        _ => ProviderError::Unknown(message),
    }
}

/// Parses a `Retry-After` header value, which per RFC 9110 §10.2.3 is either
/// an integer number of seconds or an HTTP-date. Only the delay-seconds form
/// is supported; an HTTP-date would need a wall-clock to resolve into a
/// duration and providers observed in practice only send delay-seconds.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_status_429_carries_through_parsed_retry_after() {
        let err = classify_status(429, "rate limited".into(), Some(Duration::from_secs(30)));
        match err {
            ProviderError::RateLimited { retry_after } => assert_eq!(retry_after, Some(Duration::from_secs(30))),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn parse_retry_after_reads_delay_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("  5  "), Some(Duration::from_secs(5)));
    }

    #[test]
    fn parse_retry_after_rejects_http_date_form() {
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }
}
