//! Retry policy: bounded attempts, exponential backoff with jitter,
//! Retry-After honoring, retryable-error classification.
//!
//! Grounded on `scrapers/binance_session.rs`'s `BackoffCalculator`
//! (`base * multiplier^attempt` capped, plus jitter), extended with
//! Retry-After preference and a status-code classification table.

use crate::error::{ErrorKind, FetchError};
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_ms: u64, max_delay_ms: u64) -> Result<Self, FetchError> {
        if max_attempts == 0 {
            return Err(FetchError::new(
                ErrorKind::ConfigError,
                "max_attempts must be >= 1",
            ));
        }
        Ok(Self {
            max_attempts,
            base_ms,
            max_delay_ms,
            jitter_factor: 0.25,
        })
    }

    /// Whether another attempt is permitted after `attempt` (0-indexed)
    /// has failed.
    pub fn should_retry(&self, attempt: u32, kind: ErrorKind) -> bool {
        kind.is_retryable() && attempt + 1 < self.max_attempts
    }

    /// Computes the backoff delay for `attempt` (0-indexed), honoring a
    /// server-supplied `Retry-After` when present and within the safety
    /// cap of `2 * max_delay_ms`. The Retry-After case only ever adds
    /// jitter on top of the server-specified floor; it never sleeps less
    /// than `retry_after`.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let mut rng = rand::thread_rng();
        if let Some(ra) = retry_after {
            let cap = Duration::from_millis(self.max_delay_ms * 2);
            let base = ra.min(cap);
            return with_add_only_jitter(base, self.jitter_factor, &mut rng);
        }
        let exp = self.base_ms.saturating_mul(1u64 << attempt.min(31));
        let capped = exp.min(self.max_delay_ms);
        with_jitter(Duration::from_millis(capped), self.jitter_factor, &mut rng)
    }
}

fn with_jitter(base: Duration, factor: f64, rng: &mut impl Rng) -> Duration {
    let base_ms = base.as_secs_f64() * 1000.0;
    let jitter = rng.gen_range(-factor..=factor);
    let jittered = (base_ms * (1.0 + jitter)).max(0.0);
    Duration::from_secs_f64(jittered / 1000.0)
}

/// Like [`with_jitter`], but only ever adds on top of `base` so the
/// result never drops below a server-specified floor such as
/// `Retry-After`.
fn with_add_only_jitter(base: Duration, factor: f64, rng: &mut impl Rng) -> Duration {
    let base_ms = base.as_secs_f64() * 1000.0;
    let jitter = rng.gen_range(0.0..=factor);
    Duration::from_secs_f64((base_ms * (1.0 + jitter)) / 1000.0)
}
