//! FX converter: currency conversion with rate caching and scale
//! discipline.
//!
//! Grounded on `robots.rs`'s TTL-cache-under-mutex shape, retargeted from
//! robots rules onto FX rates, plus its own fetch engine call scoped to a
//! dedicated FX host.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::decimal::{mul_round, Dec};
use crate::error::{ErrorKind, FetchError};
use crate::fetch_engine::{Ctx, FetchEngine, FetchRequest};

/// Provenance attached to any FX-converted artifact.
#[derive(Debug, Clone)]
pub struct FxMeta {
    pub provider: String,
    pub base: String,
    pub symbols: Vec<String>,
    pub as_of: chrono::DateTime<chrono::Utc>,
    pub rate_scale: u32,
    pub cache_hit: bool,
    pub attempts: u32,
    pub stale: bool,
}

struct CachedRate {
    rate: Dec,
    fetched_at: Instant,
}

/// Fetches and caches `from -> to` currency rates, then performs the final
/// `mul_round` against the target field's scale.
pub struct FxConverter {
    cache: Mutex<HashMap<(String, String), CachedRate>>,
    ttl: Duration,
    rate_scale: u32,
    fx_host_base_url: String,
    engine: Option<Arc<FetchEngine>>,
}

impl FxConverter {
    pub fn new(ttl: Duration, rate_scale: u32, fx_host_base_url: impl Into<String>, engine: Option<Arc<FetchEngine>>) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            ttl,
            rate_scale,
            fx_host_base_url: fx_host_base_url.into(),
            engine,
        }
    }

    fn cached(&self, from: &str, to: &str) -> Option<(Dec, bool)> {
        let guard = self.cache.lock();
        let entry = guard.get(&(from.to_string(), to.to_string()))?;
        let fresh = entry.fetched_at.elapsed() < self.ttl;
        Some((entry.rate, !fresh))
    }

    fn store(&self, from: &str, to: &str, rate: Dec) {
        let mut guard = self.cache.lock();
        guard.insert((from.to_string(), to.to_string()), CachedRate { rate, fetched_at: Instant::now() });
    }

    /// Fetches a fresh `from -> to` rate from the FX host via the fetch
    /// engine, scoped to its own retry/breaker budget (the engine it was
    /// built with already carries those).
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<Dec, FetchError> {
        let engine = self.engine.as_ref().ok_or_else(|| {
            FetchError::new(ErrorKind::FxUnavailable, "no FX engine configured")
        })?;
        let url = format!("{}/fx/{from}{to}", self.fx_host_base_url);
        let ctx = Ctx::with_timeout(Duration::from_secs(10));
        let request = FetchRequest::get(url, "fx-rate");
        let response = engine.do_request(ctx, &request).await.map_err(|e| {
            FetchError::new(ErrorKind::FxUnavailable, format!("FX rate fetch failed: {e}"))
        })?;
        let parsed: serde_json::Value = serde_json::from_str(&response.body).map_err(|e| {
            FetchError::new(ErrorKind::FxUnavailable, format!("FX rate payload decode failed: {e}"))
        })?;
        let rate_f64 = parsed
            .get("rate")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| FetchError::new(ErrorKind::FxUnavailable, "FX payload missing rate"))?;
        crate::decimal::to_scaled(rate_f64, self.rate_scale)
    }

    /// `convert(ctx, value, from, to, at) -> (Dec, FXMeta)`. When
    /// `from == to`, returns `value` unchanged with `provider="none"`.
    pub async fn convert(
        &self,
        value: Dec,
        from: &str,
        to: &str,
        target_scale: u32,
        as_of: chrono::DateTime<chrono::Utc>,
    ) -> Result<(Dec, FxMeta), FetchError> {
        if from == to {
            return Ok((
                value,
                FxMeta {
                    provider: "none".to_string(),
                    base: from.to_string(),
                    symbols: vec![to.to_string()],
                    as_of,
                    rate_scale: self.rate_scale,
                    cache_hit: false,
                    attempts: 0,
                    stale: false,
                },
            ));
        }

        if let Some((rate, stale)) = self.cached(from, to) {
            if !stale {
                let converted = mul_round(value, rate, target_scale)?;
                return Ok((
                    converted,
                    FxMeta {
                        provider: "yahoo-web".to_string(),
                        base: from.to_string(),
                        symbols: vec![to.to_string()],
                        as_of,
                        rate_scale: self.rate_scale,
                        cache_hit: true,
                        attempts: 0,
                        stale: false,
                    },
                ));
            }
        }

        match self.fetch_rate(from, to).await {
            Ok(rate) => {
                self.store(from, to, rate);
                let converted = mul_round(value, rate, target_scale)?;
                Ok((
                    converted,
                    FxMeta {
                        provider: "yahoo-web".to_string(),
                        base: from.to_string(),
                        symbols: vec![to.to_string()],
                        as_of,
                        rate_scale: self.rate_scale,
                        cache_hit: false,
                        attempts: 1,
                        stale: false,
                    },
                ))
            }
            Err(e) => {
                // Serve a stale cache entry rather than failing outright,
                // if one exists.
                if let Some((rate, _)) = self.cached(from, to) {
                    let converted = mul_round(value, rate, target_scale)?;
                    return Ok((
                        converted,
                        FxMeta {
                            provider: "yahoo-web".to_string(),
                            base: from.to_string(),
                            symbols: vec![to.to_string()],
                            as_of,
                            rate_scale: self.rate_scale,
                            cache_hit: true,
                            attempts: 1,
                            stale: true,
                        },
                    ));
                }
                Err(e)
            }
        }
    }
}
