//! UTC time utilities and the injectable-`now` design.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Injectable clock so relative-time parsing and ingest timestamps are
/// deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Computes the canonical `(start, end, event_time)` triple for a daily
/// bar: the host encodes the trading day by the close-plus-one-day
/// timestamp, so `end = floor(ts, day)`, `start = end - 1 day`,
/// `event_time = end`.
pub fn utc_day_boundaries(unix_seconds: i64) -> (DateTime<Utc>, DateTime<Utc>, DateTime<Utc>) {
    let ts = Utc.timestamp_opt(unix_seconds, 0).single().unwrap_or_else(|| {
        Utc.timestamp_opt(0, 0).single().expect("epoch is always valid")
    });
    let end = ts.date_naive().and_hms_opt(0, 0, 0).expect("midnight is always valid");
    let end = Utc.from_utc_datetime(&end);
    let start = end - Duration::days(1);
    (start, end, end)
}
