//! Rate limiter: per-host and per-session token buckets with burst.
//!
//! Hand-rolled under `parking_lot::Mutex` as a plain state-machine
//! struct, rather than reaching for a limiter crate like `governor`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::error::{ErrorKind, FetchError};

/// A single token bucket: capacity = burst, refill = qps tokens/second.
struct Bucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(qps: f64, burst: u32) -> Self {
        Self {
            capacity: burst as f64,
            tokens: burst as f64,
            refill_per_sec: qps,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Attempts to take one token. Returns `Ok(())` if a token was
    /// available, or `Err(wait_duration)` with how long until one will be.
    fn try_take(&mut self) -> Result<(), Duration> {
        let now = Instant::now();
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            let wait_secs = deficit / self.refill_per_sec;
            Err(Duration::from_secs_f64(wait_secs.max(0.0)))
        }
    }
}

/// Per-host and per-session token-bucket rate limiter.
pub struct RateLimiter {
    host_buckets: Mutex<HashMap<String, Bucket>>,
    session_buckets: Mutex<HashMap<String, Bucket>>,
    host_qps: f64,
    host_burst: u32,
    session_qps: f64,
    session_burst: u32,
}

impl RateLimiter {
    pub fn new(
        host_qps: f64,
        host_burst: u32,
        session_qps: f64,
        session_burst: u32,
    ) -> Result<Self, FetchError> {
        if host_qps <= 0.0 || host_burst == 0 {
            return Err(FetchError::new(
                ErrorKind::ConfigError,
                "host qps and burst must be > 0",
            ));
        }
        if session_qps <= 0.0 || session_burst == 0 {
            return Err(FetchError::new(
                ErrorKind::ConfigError,
                "session qps and burst must be > 0",
            ));
        }
        Ok(Self {
            host_buckets: Mutex::new(HashMap::new()),
            session_buckets: Mutex::new(HashMap::new()),
            host_qps,
            host_burst,
            session_qps,
            session_burst,
        })
    }

    /// Acquires one token from the host bucket and, if `session_id` is
    /// given, one token from that session's bucket too. Waits (bounded by
    /// `deadline`) until tokens are available, else fails with a
    /// cancellation-flavored error.
    pub async fn acquire(
        &self,
        host: &str,
        session_id: Option<&str>,
        deadline: Instant,
    ) -> Result<(), FetchError> {
        self.acquire_one(&self.host_buckets, host, self.host_qps, self.host_burst, deadline)
            .await?;
        if let Some(sid) = session_id {
            self.acquire_one(
                &self.session_buckets,
                sid,
                self.session_qps,
                self.session_burst,
                deadline,
            )
            .await?;
        }
        Ok(())
    }

    async fn acquire_one(
        &self,
        buckets: &Mutex<HashMap<String, Bucket>>,
        key: &str,
        qps: f64,
        burst: u32,
        deadline: Instant,
    ) -> Result<(), FetchError> {
        loop {
            let wait = {
                let mut guard = buckets.lock();
                let bucket = guard
                    .entry(key.to_string())
                    .or_insert_with(|| Bucket::new(qps, burst));
                bucket.try_take()
            };
            match wait {
                Ok(()) => return Ok(()),
                Err(wait_for) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(FetchError::new(
                            ErrorKind::Timeout,
                            "rate limiter acquire deadline exceeded",
                        ));
                    }
                    let remaining = deadline.saturating_duration_since(now);
                    let sleep_for = wait_for.min(remaining);
                    if sleep_for.is_zero() {
                        return Err(FetchError::new(
                            ErrorKind::Timeout,
                            "rate limiter acquire deadline exceeded",
                        ));
                    }
                    sleep(sleep_for).await;
                }
            }
        }
    }
}
