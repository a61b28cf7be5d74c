//! Configuration surface, loaded once at startup and treated as
//! immutable thereafter. Follows the `Config::from_env` idiom
//! (`models.rs`), extended with a TOML file as the primary source and env
//! vars as overrides.

use crate::error::{ErrorKind, FetchError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooHostConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub max_conns_per_host: usize,
    pub user_agent: String,
}

impl Default for YahooHostConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.example.com".to_string(),
            timeout_ms: 10_000,
            idle_timeout_ms: 90_000,
            max_conns_per_host: 10,
            user_agent: "marketfetch/0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub global_workers: usize,
    pub per_host_workers: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { global_workers: 8, per_host_workers: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub per_host_qps: f64,
    pub per_host_burst: u32,
    pub per_session_qps: f64,
    pub per_session_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_host_qps: 5.0,
            per_host_burst: 10,
            per_session_qps: 2.0,
            per_session_burst: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    pub n: usize,
    pub eject_after: u32,
    pub recreate_cooldown_ms: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self { n: 4, eject_after: 3, recreate_cooldown_ms: 30_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub attempts: u32,
    pub base_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { attempts: 4, base_ms: 200, max_delay_ms: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub window: usize,
    pub failure_threshold: f64,
    pub reset_timeout_ms: u64,
    pub half_open_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window: 20,
            failure_threshold: 0.5,
            reset_timeout_ms: 30_000,
            half_open_probes: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentPolicy {
    Raw,
    SplitOnly,
    SplitDividend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketsConfig {
    pub allowed_intervals: Vec<String>,
    pub allowed_mics: Vec<String>,
    pub default_adjustment_policy: AdjustmentPolicy,
}

impl Default for MarketsConfig {
    fn default() -> Self {
        Self {
            allowed_intervals: vec!["1d".to_string()],
            allowed_mics: vec![],
            default_adjustment_policy: AdjustmentPolicy::Raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FxProvider {
    None,
    YahooWeb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxConfig {
    pub provider: FxProvider,
    pub target: Option<String>,
    pub cache_ttl_ms: u64,
    pub rate_scale: u32,
    pub rounding: String,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            provider: FxProvider::None,
            target: None,
            cache_ttl_ms: 60_000,
            rate_scale: 8,
            rounding: "half_up".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    Nats,
    Kafka,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub enabled: bool,
    pub env: String,
    pub topic_prefix: String,
    pub max_payload_bytes: usize,
    pub backend: BusBackend,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            env: "dev".to_string(),
            topic_prefix: "ampy".to_string(),
            max_payload_bytes: 1_048_576,
            backend: BusBackend::Nats,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotsPolicy {
    Enforce,
    Warn,
    Ignore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub enabled: bool,
    pub qps: f64,
    pub burst: u32,
    pub robots_policy: RobotsPolicy,
    pub cache_ttl_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            qps: 1.0,
            burst: 2,
            robots_policy: RobotsPolicy::Enforce,
            cache_ttl_ms: 3_600_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub yahoo: YahooHostConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub markets: MarketsConfig,
    #[serde(default)]
    pub fx: FxConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

impl Config {
    /// Loads config from an optional TOML file, falling back to defaults,
    /// then applies a small set of env-var overrides (teacher idiom:
    /// `dotenv().ok()` + `std::env::var(...).unwrap_or(default)`).
    pub fn load(path: Option<&Path>) -> Result<Self, FetchError> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| {
                    FetchError::new(
                        ErrorKind::ConfigError,
                        format!("failed to read config file {}: {e}", p.display()),
                    )
                })?;
                toml::from_str(&text).map_err(|e| {
                    FetchError::new(ErrorKind::ConfigError, format!("invalid config TOML: {e}"))
                })?
            }
            None => Config::default(),
        };

        if let Ok(v) = std::env::var("MARKETFETCH_BASE_URL") {
            config.yahoo.base_url = v;
        }
        if let Ok(v) = std::env::var("MARKETFETCH_BUS_ENABLED") {
            config.bus.enabled = v.parse().unwrap_or(config.bus.enabled);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FetchError> {
        if self.rate_limit.per_host_qps <= 0.0 || self.rate_limit.per_host_burst == 0 {
            return Err(FetchError::new(
                ErrorKind::ConfigError,
                "rate_limit.per_host_qps and per_host_burst must be > 0",
            ));
        }
        if self.rate_limit.per_session_qps <= 0.0 || self.rate_limit.per_session_burst == 0 {
            return Err(FetchError::new(
                ErrorKind::ConfigError,
                "rate_limit.per_session_qps and per_session_burst must be > 0",
            ));
        }
        if self.retry.attempts == 0 {
            return Err(FetchError::new(
                ErrorKind::ConfigError,
                "retry.attempts must be >= 1",
            ));
        }
        if !(self.circuit_breaker.failure_threshold > 0.0
            && self.circuit_breaker.failure_threshold <= 1.0)
        {
            return Err(FetchError::new(
                ErrorKind::ConfigError,
                "circuit_breaker.failure_threshold must be in (0,1]",
            ));
        }
        if self.markets.allowed_intervals != vec!["1d".to_string()] {
            return Err(FetchError::new(
                ErrorKind::ConfigError,
                "markets.allowed_intervals must be exactly [\"1d\"] in the core",
            ));
        }
        if !(262_144..=10_485_760).contains(&self.bus.max_payload_bytes) {
            return Err(FetchError::new(
                ErrorKind::ConfigError,
                "bus.max_payload_bytes must be in [262144, 10485760]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_failure_threshold() {
        let mut c = Config::default();
        c.circuit_breaker.failure_threshold = 0.0;
        assert!(c.validate().is_err());
        c.circuit_breaker.failure_threshold = 1.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_bad_payload_budget() {
        let mut c = Config::default();
        c.bus.max_payload_bytes = 100;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_non_1d_interval() {
        let mut c = Config::default();
        c.markets.allowed_intervals = vec!["1h".to_string()];
        assert!(c.validate().is_err());
    }

    #[test]
    fn loads_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[rate_limit]\nper_host_qps = 9.0\nper_host_burst = 20\nper_session_qps = 3.0\nper_session_burst = 6\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.rate_limit.per_host_qps, 9.0);
    }
}
