//! Robots gate: per-host cache of parsed allow/deny rules with TTL.

use parking_lot::Mutex;
use reqwest::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::RobotsPolicy;
use crate::error::{ErrorKind, FetchError};

#[derive(Debug, Clone, Default)]
struct RobotsRules {
    disallow: Vec<String>,
    allow: Vec<String>,
}

impl RobotsRules {
    /// Parses a minimal robots.txt: `User-agent: *` blocks with
    /// `Disallow`/`Allow` lines. Unknown directives are ignored.
    fn parse(text: &str) -> Self {
        let mut rules = RobotsRules::default();
        let mut in_wildcard_block = false;
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else { continue };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim().to_string();
            match key.as_str() {
                "user-agent" => in_wildcard_block = value == "*",
                "disallow" if in_wildcard_block && !value.is_empty() => rules.disallow.push(value),
                "allow" if in_wildcard_block && !value.is_empty() => rules.allow.push(value),
                _ => {}
            }
        }
        rules
    }

    fn allows(&self, path: &str) -> bool {
        let mut best_allow_len = None;
        let mut best_deny_len = None;
        for rule in &self.allow {
            if path.starts_with(rule.as_str()) {
                best_allow_len = Some(best_allow_len.unwrap_or(0).max(rule.len()));
            }
        }
        for rule in &self.disallow {
            if path.starts_with(rule.as_str()) {
                best_deny_len = Some(best_deny_len.unwrap_or(0).max(rule.len()));
            }
        }
        match (best_allow_len, best_deny_len) {
            (Some(a), Some(d)) => a >= d,
            (None, Some(_)) => false,
            _ => true,
        }
    }
}

struct CacheEntry {
    rules: RobotsRules,
    fetched_at: Instant,
}

/// Caches and enforces (or logs, or bypasses) per-host robots.txt rules.
pub struct RobotsGate {
    cache: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    policy: RobotsPolicy,
    client: Client,
}

pub enum RobotsDecision {
    Allowed,
    DisallowedLogged,
}

impl RobotsGate {
    pub fn new(policy: RobotsPolicy, ttl: Duration, client: Client) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            ttl,
            policy,
            client,
        }
    }

    async fn fetch_rules(&self, host: &str, scheme: &str) -> RobotsRules {
        let url = format!("{scheme}://{host}/robots.txt");
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(text) => RobotsRules::parse(&text),
                Err(_) => RobotsRules::default(),
            },
            _ => RobotsRules::default(),
        }
    }

    async fn rules_for(&self, host: &str, scheme: &str) -> RobotsRules {
        {
            let guard = self.cache.lock();
            if let Some(entry) = guard.get(host) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return entry.rules.clone();
                }
            }
        }
        let rules = self.fetch_rules(host, scheme).await;
        let mut guard = self.cache.lock();
        guard.insert(
            host.to_string(),
            CacheEntry { rules: rules.clone(), fetched_at: Instant::now() },
        );
        rules
    }

    /// Decides whether `url` may be fetched, honoring the configured
    /// policy. `force` bypasses the check entirely and is reserved for
    /// diagnostic workflows — callers must gate it from production paths
    /// themselves.
    pub async fn check(&self, url: &str, force: bool) -> Result<RobotsDecision, FetchError> {
        if force || matches!(self.policy, RobotsPolicy::Ignore) {
            return Ok(RobotsDecision::Allowed);
        }
        let parsed = Url::parse(url)
            .map_err(|e| FetchError::new(ErrorKind::ValidationError, format!("invalid URL: {e}")))?;
        let host = parsed.host_str().unwrap_or_default().to_string();
        let rules = self.rules_for(&host, parsed.scheme()).await;
        let allowed = rules.allows(parsed.path());
        if allowed {
            return Ok(RobotsDecision::Allowed);
        }
        match self.policy {
            RobotsPolicy::Enforce => Err(FetchError::new(
                ErrorKind::RobotsDenied,
                format!("robots.txt disallows {}", parsed.path()),
            )
            .with_endpoint(url)),
            RobotsPolicy::Warn => {
                tracing::warn!(url, "robots.txt disallows this path but policy is warn-only");
                Ok(RobotsDecision::DisallowedLogged)
            }
            RobotsPolicy::Ignore => Ok(RobotsDecision::Allowed),
        }
    }
}
