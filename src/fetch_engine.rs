//! Fetch engine: composes the rate limiter, circuit breaker, retry
//! policy, session pool, and robots gate into a single request pipeline
//! exposed as [`FetchEngine::do_request`].
//!
//! Grounded on `scrapers/binance_hardened_ingest.rs`'s composition style
//! (a hardened wrapper layering backoff/session/circuit-breaker concerns
//! around a raw transport call).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use url::Url;

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{ErrorKind, FetchError};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::robots::RobotsGate;
use crate::session_pool::SessionPool;

/// Per-request cancellation/deadline context. The deadline governs the
/// whole attempt chain including backoff sleeps; retries never extend it.
#[derive(Debug, Clone, Copy)]
pub struct Ctx {
    pub deadline: Instant,
}

impl Ctx {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { deadline: Instant::now() + timeout }
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: HttpMethod,
    pub is_scrape: bool,
    pub force_robots: bool,
    pub endpoint: String,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            is_scrape: false,
            force_robots: false,
            endpoint: endpoint.into(),
        }
    }

    pub fn scrape(mut self) -> Self {
        self.is_scrape = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
    pub attempts: u32,
}

/// Composes the rate limiter, session pool, circuit breaker, retry policy,
/// and robots gate into one "do request" contract.
pub struct FetchEngine {
    rate_limiter: Arc<RateLimiter>,
    sessions: Arc<SessionPool>,
    pub(crate) breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    robots: Option<Arc<RobotsGate>>,
}

impl FetchEngine {
    pub fn new(
        rate_limiter: Arc<RateLimiter>,
        sessions: Arc<SessionPool>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        robots: Option<Arc<RobotsGate>>,
    ) -> Self {
        Self { rate_limiter, sessions, breaker, retry, robots }
    }

    fn host_of(url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url)
            .map_err(|e| FetchError::new(ErrorKind::ValidationError, format!("invalid URL: {e}")))?;
        Ok(parsed.host_str().unwrap_or_default().to_string())
    }

    /// Parses a `Retry-After` header value, which per RFC 7231 is either an
    /// integer number of seconds or an HTTP-date.
    fn parse_retry_after(value: &str) -> Option<Duration> {
        let trimmed = value.trim();
        if let Ok(secs) = trimmed.parse::<u64>() {
            return Some(Duration::from_secs(secs));
        }
        let when = chrono::DateTime::parse_from_rfc2822(trimmed).ok()?;
        let delta = when.with_timezone(&chrono::Utc) - chrono::Utc::now();
        delta.to_std().ok()
    }

    /// Executes `request`, retrying per the retry policy's budget and
    /// classification until it succeeds, exhausts the budget, or `ctx`
    /// expires.
    pub async fn do_request(&self, ctx: Ctx, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let host = Self::host_of(&request.url)?;
        let mut attempt = 0u32;
        let mut last_err: Option<FetchError> = None;

        loop {
            if ctx.expired() {
                return Err(FetchError::new(ErrorKind::Timeout, "request deadline exceeded")
                    .with_endpoint(&request.endpoint)
                    .with_attempt(attempt));
            }

            match self.attempt_once(ctx, &host, request, attempt).await {
                Ok(resp) => return Ok(resp),
                Err(err) => {
                    last_err = Some(err.clone());
                    if !self.retry.should_retry(attempt, err.kind) {
                        return Err(err);
                    }
                    let delay = self.retry.delay(attempt, err.retry_after);
                    let remaining = ctx.deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(err);
                    }
                    tokio::time::sleep(delay.min(remaining)).await;
                    attempt += 1;
                }
            }
        }
        // unreachable, loop always returns
        #[allow(unreachable_code)]
        {
            Err(last_err.unwrap_or_else(|| FetchError::new(ErrorKind::NetworkError, "exhausted retries")))
        }
    }

    async fn attempt_once(
        &self,
        ctx: Ctx,
        host: &str,
        request: &FetchRequest,
        attempt: u32,
    ) -> Result<FetchResponse, FetchError> {
        // (a) robots-check if the request is a scrape.
        if request.is_scrape {
            if let Some(robots) = &self.robots {
                robots.check(&request.url, request.force_robots).await?;
            }
        }

        // (b) acquire host token, then session token.
        let session = self.sessions.acquire()?;
        self.rate_limiter
            .acquire(host, Some(&session.id), ctx.deadline)
            .await
            .map_err(|e| e.with_endpoint(&request.endpoint).with_attempt(attempt))?;

        // (c) consult circuit breaker.
        if !self.breaker.try_admit(host) {
            return Err(FetchError::new(ErrorKind::CircuitOpen, "circuit breaker is open")
                .with_endpoint(&request.endpoint)
                .with_attempt(attempt));
        }

        // (d) execute HTTP, recording the outcome into the breaker.
        let result = session.client.get(&request.url).send().await;
        match result {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let is_failure = FetchError::is_breaker_failure(status);
                let is_success = (200..300).contains(&status);
                if is_failure {
                    self.breaker.record(host, false);
                    self.sessions.record_outcome(&session.id, false);
                } else if is_success {
                    self.breaker.record(host, true);
                    self.sessions.record_outcome(&session.id, true);
                }
                // other 4xx: neither success nor failure for the breaker.

                let mut headers = HashMap::new();
                for (k, v) in resp.headers().iter() {
                    if let Ok(val) = v.to_str() {
                        headers.insert(k.as_str().to_ascii_lowercase(), val.to_string());
                    }
                }

                if is_success {
                    let body = resp.text().await.map_err(|e| {
                        FetchError::new(ErrorKind::NetworkError, format!("failed to read body: {e}"))
                            .with_endpoint(&request.endpoint)
                            .with_attempt(attempt)
                            .with_status(status)
                    })?;
                    return Ok(FetchResponse { status, body, headers, attempts: attempt + 1 });
                }

                let kind = FetchError::classify_status(status);
                let mut err = FetchError::new(kind, format!("HTTP {status}"))
                    .with_endpoint(&request.endpoint)
                    .with_attempt(attempt)
                    .with_status(status);
                if let Some(retry_after) = headers.get("retry-after").and_then(|v| Self::parse_retry_after(v)) {
                    err = err.with_retry_after(retry_after);
                }
                Err(err)
            }
            Err(e) => {
                self.breaker.record(host, false);
                self.sessions.record_outcome(&session.id, false);
                let kind = if e.is_timeout() { ErrorKind::Timeout } else { ErrorKind::NetworkError };
                Err(FetchError::new(kind, format!("request failed: {e}"))
                    .with_endpoint(&request.endpoint)
                    .with_attempt(attempt))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RobotsPolicy;

    fn build_engine(breaker_window: usize, threshold: f64) -> FetchEngine {
        let rate_limiter = Arc::new(RateLimiter::new(100.0, 100, 100.0, 100).unwrap());
        let sessions = Arc::new(
            SessionPool::new(2, 10, Duration::from_millis(10), Duration::from_secs(5)).unwrap(),
        );
        let breaker = Arc::new(CircuitBreaker::new(
            breaker_window,
            threshold,
            Duration::from_millis(20),
            1,
        ));
        let retry = RetryPolicy::new(2, 10, 100).unwrap();
        FetchEngine::new(rate_limiter, sessions, breaker, retry, None)
    }

    #[tokio::test]
    async fn rejects_invalid_url() {
        let engine = build_engine(5, 0.5);
        let ctx = Ctx::with_timeout(Duration::from_secs(1));
        let req = FetchRequest::get("not a url", "quote");
        let result = engine.do_request(ctx, &req).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn open_circuit_fails_fast_without_retry() {
        let engine = build_engine(1, 0.5);
        // Trip the breaker directly via a failing host before issuing a
        // real request, simulating prior failures.
        engine.breaker.record("127.0.0.1", false);
        let ctx = Ctx::with_timeout(Duration::from_secs(1));
        let req = FetchRequest::get("http://127.0.0.1:1/never", "quote");
        let result = engine.do_request(ctx, &req).await;
        assert!(matches!(result, Err(e) if e.kind == ErrorKind::CircuitOpen));
    }
}
