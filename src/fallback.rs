//! Fallback coordinator: per-endpoint API<->scrape strategy, error-driven
//! source switching, per-symbol partial-success preservation.

use std::collections::HashMap;
use std::future::Future;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Api,
    Scrape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStrategy {
    Auto,
    ApiOnly,
    ScrapeOnly,
}

/// One fallback decision record: `{from_source, to_source, reason}`.
#[derive(Debug, Clone)]
pub struct FallbackDecision {
    pub from_source: SourceKind,
    pub to_source: SourceKind,
    pub reason: ErrorKind,
}

/// Whether an API error is one the coordinator should fall back from:
/// auth_error, not_supported, rate_limited-after-exhaustion, or
/// decode_error.
fn should_fall_back(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::AuthError | ErrorKind::NotSupported | ErrorKind::RateLimited | ErrorKind::DecodeError
    )
}

pub struct FallbackCoordinator {
    strategies: HashMap<String, FallbackStrategy>,
    default_strategy: FallbackStrategy,
}

impl FallbackCoordinator {
    pub fn new(default_strategy: FallbackStrategy) -> Self {
        Self { strategies: HashMap::new(), default_strategy }
    }

    pub fn with_strategy(mut self, endpoint: impl Into<String>, strategy: FallbackStrategy) -> Self {
        self.strategies.insert(endpoint.into(), strategy);
        self
    }

    fn strategy_for(&self, endpoint: &str) -> FallbackStrategy {
        self.strategies.get(endpoint).copied().unwrap_or(self.default_strategy)
    }

    /// Attempts `api`, falling back to `scrape` per the endpoint's strategy
    /// and the configured error classification. Returns the successful
    /// value, the source it came from, and any fallback decision recorded
    /// along the way. A terminal failure returns the *last* error.
    pub async fn run<T, FutA, FutS, E>(
        &self,
        endpoint: &str,
        api: FutA,
        scrape: FutS,
    ) -> Result<(T, SourceKind, Option<FallbackDecision>), E>
    where
        FutA: Future<Output = Result<T, E>>,
        FutS: Future<Output = Result<T, E>>,
        E: HasErrorKind,
    {
        match self.strategy_for(endpoint) {
            FallbackStrategy::ScrapeOnly => scrape.await.map(|v| (v, SourceKind::Scrape, None)),
            FallbackStrategy::ApiOnly => api.await.map(|v| (v, SourceKind::Api, None)),
            FallbackStrategy::Auto => match api.await {
                Ok(v) => Ok((v, SourceKind::Api, None)),
                Err(err) if should_fall_back(err.error_kind()) => {
                    let reason = err.error_kind();
                    scrape.await.map(|v| {
                        (
                            v,
                            SourceKind::Scrape,
                            Some(FallbackDecision { from_source: SourceKind::Api, to_source: SourceKind::Scrape, reason }),
                        )
                    })
                }
                Err(err) => Err(err),
            },
        }
    }
}

/// Lets [`FallbackCoordinator::run`] inspect error kind without depending
/// on `FetchError` directly (keeps the coordinator generic over `T`/`E`).
pub trait HasErrorKind {
    fn error_kind(&self) -> ErrorKind;
}

impl HasErrorKind for crate::error::FetchError {
    fn error_kind(&self) -> ErrorKind {
        self.kind
    }
}

/// The outcome of one endpoint within a multi-endpoint call, preserving
/// partial success rather than collapsing to a single failure.
#[derive(Debug, Clone)]
pub enum EndpointOutcome<T> {
    Ok { value: T, source: SourceKind, decision: Option<FallbackDecision> },
    Err(crate::error::FetchError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    #[tokio::test]
    async fn auto_falls_back_on_auth_error() {
        let coordinator = FallbackCoordinator::new(FallbackStrategy::Auto);
        let api = async { Err::<i32, FetchError>(FetchError::new(ErrorKind::AuthError, "401")) };
        let scrape = async { Ok::<i32, FetchError>(42) };
        let (value, source, decision) = coordinator.run("key-statistics", api, scrape).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(source, SourceKind::Scrape);
        assert!(decision.is_some());
        assert_eq!(decision.unwrap().reason, ErrorKind::AuthError);
    }

    #[tokio::test]
    async fn api_only_never_falls_back() {
        let coordinator = FallbackCoordinator::new(FallbackStrategy::Auto)
            .with_strategy("quote", FallbackStrategy::ApiOnly);
        let api = async { Err::<i32, FetchError>(FetchError::new(ErrorKind::AuthError, "401")) };
        let scrape = async { Ok::<i32, FetchError>(42) };
        let result = coordinator.run("quote", api, scrape).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn scrape_only_skips_api_entirely() {
        let coordinator = FallbackCoordinator::new(FallbackStrategy::Auto)
            .with_strategy("news", FallbackStrategy::ScrapeOnly);
        let api = async { panic!("api should not be called") };
        let scrape = async { Ok::<i32, FetchError>(7) };
        let (value, source, decision) = coordinator.run::<_, _, _, FetchError>("news", api, scrape).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(source, SourceKind::Scrape);
        assert!(decision.is_none());
    }

    #[tokio::test]
    async fn non_fallback_error_is_terminal() {
        let coordinator = FallbackCoordinator::new(FallbackStrategy::Auto);
        let api = async { Err::<i32, FetchError>(FetchError::new(ErrorKind::ValidationError, "bad field")) };
        let scrape = async { Ok::<i32, FetchError>(1) };
        let result = coordinator.run("quote", api, scrape).await;
        assert!(matches!(result, Err(e) if e.kind == ErrorKind::ValidationError));
    }
}
