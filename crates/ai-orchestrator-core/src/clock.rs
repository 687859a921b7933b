//! Time source and bucket-key derivation shared by the quota and rate-limit
//! crates, plus request-ID generation.
//!
//! Grounded on SPEC_FULL §9's "explicit construction, inject fakes" note: the
//! same shape as the teacher's `Circuit::new_with_atomic` constructors that
//! take every collaborator explicitly rather than reaching for a global.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// A source of wall-clock time, injectable for deterministic tests.
///
/// Components that need "now" for bucket-key derivation or TTL calculation
/// take `Arc<dyn Clock>` rather than calling `Utc::now()` directly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock, backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed/steppable clock for tests, mirroring the teacher's use of
/// `tokio::time::pause`/`advance` but for wall-clock bucket boundaries rather
/// than tokio's virtual timer.
pub struct FakeClock {
    current: std::sync::Mutex<DateTime<Utc>>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut current = self.current.lock().unwrap();
        *current += duration;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.current.lock().unwrap() = to;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}

/// Generates the bucket key used by the quota and rate-limit services to
/// key a hash counter, e.g. `"2026-07-28T14"` for an hourly bucket.
///
/// Shared so quota (monthly/daily/session) and rate limiting (minute/hour)
/// derive keys identically rather than each crate growing its own
/// `strftime` format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketGranularity {
    Minute,
    Hour,
    Day,
    Month,
}

pub fn bucket_key(timestamp: DateTime<Utc>, granularity: BucketGranularity) -> String {
    match granularity {
        BucketGranularity::Minute => timestamp.format("%Y-%m-%dT%H:%M").to_string(),
        BucketGranularity::Hour => timestamp.format("%Y-%m-%dT%H").to_string(),
        BucketGranularity::Day => timestamp.format("%Y-%m-%d").to_string(),
        BucketGranularity::Month => timestamp.format("%Y-%m").to_string(),
    }
}

/// Seconds remaining until `timestamp` crosses into the next bucket boundary
/// of `granularity`, used to set a TTL on bucket counters so they self-clean.
pub fn seconds_until_next_bucket(timestamp: DateTime<Utc>, granularity: BucketGranularity) -> i64 {
    let next_boundary = match granularity {
        BucketGranularity::Minute => {
            let start_of_minute = timestamp
                .with_second(0)
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(timestamp);
            start_of_minute + chrono::Duration::minutes(1)
        }
        BucketGranularity::Hour => {
            let start_of_hour = timestamp
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(timestamp);
            start_of_hour + chrono::Duration::hours(1)
        }
        BucketGranularity::Day => {
            let start_of_day = timestamp
                .with_hour(0)
                .and_then(|t| t.with_minute(0))
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(timestamp);
            start_of_day + chrono::Duration::days(1)
        }
        BucketGranularity::Month => {
            let (year, month) = if timestamp.month() == 12 {
                (timestamp.year() + 1, 1)
            } else {
                (timestamp.year(), timestamp.month() + 1)
            };
            timestamp
                .with_day(1)
                .and_then(|t| t.with_year(year))
                .and_then(|t| t.with_month(month))
                .and_then(|t| t.with_hour(0))
                .and_then(|t| t.with_minute(0))
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(timestamp)
        }
    };
    (next_boundary - timestamp).num_seconds().max(1)
}

/// Generates a new request ID (SPEC_FULL §4.1/§6.1).
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
