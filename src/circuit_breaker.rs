//! Circuit breaker: sliding window of the last `W` outcomes per host.
//!
//! Generalized from `route_quality/mitigation.rs::CircuitBreaker` (which
//! tracks a single running failure/success counter per endpoint) to the
//! spec's windowed failure-ratio breaker with a bounded half-open probe
//! budget.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct HostBreaker {
    window: VecDeque<bool>, // true = success, false = failure
    window_size: usize,
    failure_threshold: f64,
    state: BreakerState,
    opened_at: Option<Instant>,
    reset_timeout: Duration,
    half_open_probes_budget: u32,
    half_open_probes_remaining: u32,
    half_open_probes_total: u32,
}

impl HostBreaker {
    fn new(window_size: usize, failure_threshold: f64, reset_timeout: Duration, probes: u32) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            failure_threshold,
            state: BreakerState::Closed,
            opened_at: None,
            reset_timeout,
            half_open_probes_budget: probes,
            half_open_probes_remaining: probes,
            half_open_probes_total: probes,
        }
    }

    fn record(&mut self, success: bool) {
        match self.state {
            BreakerState::Closed => {
                self.window.push_back(success);
                if self.window.len() > self.window_size {
                    self.window.pop_front();
                }
                if self.window.len() == self.window_size {
                    let failures = self.window.iter().filter(|s| !**s).count();
                    let ratio = failures as f64 / self.window_size as f64;
                    if ratio >= self.failure_threshold {
                        self.trip();
                    }
                }
            }
            BreakerState::HalfOpen => {
                if success {
                    self.half_open_probes_remaining = self.half_open_probes_remaining.saturating_sub(1);
                    if self.half_open_probes_remaining == 0 {
                        self.close();
                    }
                } else {
                    self.trip();
                }
            }
            BreakerState::Open => {
                // Results arriving while open (shouldn't happen through the
                // normal gate) are ignored.
            }
        }
    }

    fn trip(&mut self) {
        self.state = BreakerState::Open;
        self.opened_at = Some(Instant::now());
        self.half_open_probes_remaining = self.half_open_probes_budget;
    }

    fn close(&mut self) {
        self.state = BreakerState::Closed;
        self.opened_at = None;
        self.window.clear();
        self.half_open_probes_remaining = self.half_open_probes_budget;
    }

    /// Checks whether a request may proceed, transitioning `Open` ->
    /// `HalfOpen` once `reset_timeout` has elapsed.
    fn try_admit(&mut self) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => self.half_open_probes_remaining > 0,
            BreakerState::Open => {
                if let Some(opened_at) = self.opened_at {
                    if opened_at.elapsed() >= self.reset_timeout {
                        self.state = BreakerState::HalfOpen;
                        self.half_open_probes_remaining = self.half_open_probes_total;
                        return true;
                    }
                }
                false
            }
        }
    }

    fn state(&self) -> BreakerState {
        self.state
    }
}

/// Windowed circuit breaker keyed by host.
pub struct CircuitBreaker {
    hosts: Mutex<HashMap<String, HostBreaker>>,
    window_size: usize,
    failure_threshold: f64,
    reset_timeout: Duration,
    half_open_probes: u32,
}

impl CircuitBreaker {
    pub fn new(window_size: usize, failure_threshold: f64, reset_timeout: Duration, half_open_probes: u32) -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            window_size,
            failure_threshold,
            reset_timeout,
            half_open_probes,
        }
    }

    /// Returns `true` if a request against `host` may proceed right now.
    pub fn try_admit(&self, host: &str) -> bool {
        let mut guard = self.hosts.lock();
        let breaker = guard.entry(host.to_string()).or_insert_with(|| {
            HostBreaker::new(self.window_size, self.failure_threshold, self.reset_timeout, self.half_open_probes)
        });
        breaker.try_admit()
    }

    /// Records an outcome for `host`: network errors, timeouts, and
    /// status >= 500 / 429 count as failures; 2xx counts as success; other
    /// 4xx count as neither (callers should not call this for them).
    pub fn record(&self, host: &str, success: bool) {
        let mut guard = self.hosts.lock();
        let breaker = guard.entry(host.to_string()).or_insert_with(|| {
            HostBreaker::new(self.window_size, self.failure_threshold, self.reset_timeout, self.half_open_probes)
        });
        breaker.record(success);
    }

    pub fn state(&self, host: &str) -> BreakerState {
        let mut guard = self.hosts.lock();
        guard
            .entry(host.to_string())
            .or_insert_with(|| {
                HostBreaker::new(self.window_size, self.failure_threshold, self.reset_timeout, self.half_open_probes)
            })
            .state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_open_when_window_full_and_ratio_exceeded() {
        let cb = CircuitBreaker::new(3, 0.5, Duration::from_millis(50), 1);
        assert_eq!(cb.state("h"), BreakerState::Closed);
        cb.record("h", false);
        cb.record("h", false);
        assert_eq!(cb.state("h"), BreakerState::Closed);
        cb.record("h", false);
        assert_eq!(cb.state("h"), BreakerState::Open);
        assert!(!cb.try_admit("h"));
    }

    #[test]
    fn half_open_admits_probe_after_timeout_and_recloses_on_success() {
        let cb = CircuitBreaker::new(3, 0.5, Duration::from_millis(10), 1);
        cb.record("h", false);
        cb.record("h", false);
        cb.record("h", false);
        assert_eq!(cb.state("h"), BreakerState::Open);
        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.try_admit("h"));
        assert_eq!(cb.state("h"), BreakerState::HalfOpen);
        cb.record("h", true);
        assert_eq!(cb.state("h"), BreakerState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens_and_restarts_timer() {
        let cb = CircuitBreaker::new(3, 0.5, Duration::from_millis(10), 2);
        cb.record("h", false);
        cb.record("h", false);
        cb.record("h", false);
        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.try_admit("h"));
        cb.record("h", false);
        assert_eq!(cb.state("h"), BreakerState::Open);
        assert!(!cb.try_admit("h"));
    }

    #[test]
    fn hosts_are_independent() {
        let cb = CircuitBreaker::new(3, 0.5, Duration::from_millis(50), 1);
        cb.record("a", false);
        cb.record("a", false);
        cb.record("a", false);
        assert_eq!(cb.state("a"), BreakerState::Open);
        assert_eq!(cb.state("b"), BreakerState::Closed);
    }
}
