//! Session pool: rotating pool of independent HTTP sessions with
//! ejection/cooldown.
//!
//! Grounded on `scrapers/binance_session.rs`'s `EndpointRotator` /
//! `SessionManager` (consecutive-failure ejection, cooldown, fresh
//! reinstantiation), retargeted from WebSocket endpoints onto pooled
//! `reqwest::Client` instances with distinct cookie jars and user agents.

use parking_lot::Mutex;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::error::{ErrorKind, FetchError};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36",
];

struct SessionSlot {
    id: String,
    client: Client,
    user_agent: String,
    consecutive_failures: u32,
    ejected_until: Option<Instant>,
}

impl SessionSlot {
    fn new(index: usize, timeout: Duration) -> Result<Self, FetchError> {
        let user_agent = USER_AGENTS[index % USER_AGENTS.len()].to_string();
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .user_agent(&user_agent)
            .build()
            .map_err(|e| {
                FetchError::new(ErrorKind::ConfigError, format!("failed to build session client: {e}"))
            })?;
        Ok(Self {
            id: format!("session-{index}"),
            client,
            user_agent,
            consecutive_failures: 0,
            ejected_until: None,
        })
    }

    fn is_available(&self) -> bool {
        match self.ejected_until {
            Some(until) => Instant::now() >= until,
            None => true,
        }
    }
}

/// A rotating pool of isolated HTTP sessions.
pub struct SessionPool {
    slots: Mutex<Vec<SessionSlot>>,
    next: AtomicUsize,
    eject_after: u32,
    cooldown: Duration,
    timeout: Duration,
}

/// A handle identifying which session served (or should serve) a request.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: String,
    pub client: Client,
}

impl SessionPool {
    pub fn new(n: usize, eject_after: u32, cooldown: Duration, timeout: Duration) -> Result<Self, FetchError> {
        if n == 0 {
            return Err(FetchError::new(ErrorKind::ConfigError, "session pool size must be > 0"));
        }
        let mut slots = Vec::with_capacity(n);
        for i in 0..n {
            slots.push(SessionSlot::new(i, timeout)?);
        }
        Ok(Self {
            slots: Mutex::new(slots),
            next: AtomicUsize::new(0),
            eject_after,
            cooldown,
            timeout,
        })
    }

    /// Round-robin-selects the next available (non-ejected) session.
    pub fn acquire(&self) -> Result<SessionHandle, FetchError> {
        let mut guard = self.slots.lock();
        let len = guard.len();
        for _ in 0..len {
            let idx = self.next.fetch_add(1, Ordering::Relaxed) % len;
            if guard[idx].is_available() {
                let slot = &guard[idx];
                return Ok(SessionHandle { id: slot.id.clone(), client: slot.client.clone() });
            }
        }
        // All sessions ejected: fall through and use the least-recently
        // ejected one rather than stalling the caller entirely.
        let idx = 0;
        let slot = &mut guard[idx];
        slot.ejected_until = None;
        Ok(SessionHandle { id: slot.id.clone(), client: slot.client.clone() })
    }

    /// Records a request outcome for the named session. After
    /// `eject_after` consecutive failures, the session is ejected for
    /// `cooldown` and reinstantiated fresh.
    pub fn record_outcome(&self, session_id: &str, success: bool) {
        let mut guard = self.slots.lock();
        if let Some(slot) = guard.iter_mut().find(|s| s.id == session_id) {
            if success {
                slot.consecutive_failures = 0;
            } else {
                slot.consecutive_failures += 1;
                if slot.consecutive_failures >= self.eject_after {
                    slot.ejected_until = Some(Instant::now() + self.cooldown);
                    if let Ok(fresh) = Client::builder()
                        .timeout(self.timeout)
                        .cookie_store(true)
                        .user_agent(&slot.user_agent)
                        .build()
                    {
                        slot.client = fresh;
                    }
                    slot.consecutive_failures = 0;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_pool() {
        assert!(SessionPool::new(0, 3, Duration::from_secs(1), Duration::from_secs(1)).is_err());
    }

    #[test]
    fn round_robins_across_sessions() {
        let pool = SessionPool::new(3, 10, Duration::from_millis(10), Duration::from_secs(5)).unwrap();
        let first = pool.acquire().unwrap().id;
        let second = pool.acquire().unwrap().id;
        let third = pool.acquire().unwrap().id;
        assert_ne!(first, second);
        assert_ne!(second, third);
    }

    #[test]
    fn ejects_after_consecutive_failures_and_recovers_after_cooldown() {
        let pool = SessionPool::new(2, 2, Duration::from_millis(20), Duration::from_secs(5)).unwrap();
        let target = pool.acquire().unwrap().id;
        pool.record_outcome(&target, false);
        pool.record_outcome(&target, false);
        // Target should now be ejected; repeated acquires should avoid it
        // until cooldown elapses.
        for _ in 0..4 {
            let id = pool.acquire().unwrap().id;
            assert_ne!(id, target);
        }
        std::thread::sleep(Duration::from_millis(25));
        // After cooldown, the ejected session becomes available again.
        let mut seen_target_again = false;
        for _ in 0..4 {
            if pool.acquire().unwrap().id == target {
                seen_target_again = true;
            }
        }
        assert!(seen_target_again);
    }
}
