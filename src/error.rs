//! Crate-wide error type.
//!
//! Every error the fetch engine, decoders, extractor, normalizer, and
//! emitter can produce funnels through [`FetchError`]. Per the error
//! handling design, every error carries kind, endpoint, symbol, attempt
//! count, last status, and (for HTML paths) the pattern that failed.

use std::time::Duration;

use thiserror::Error;

/// The taxonomy of error kinds recognized across the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigError,
    ValidationError,
    AuthError,
    RateLimited,
    Timeout,
    NetworkError,
    DecodeError,
    ParseError,
    SchemaDrift,
    RobotsDenied,
    CircuitOpen,
    NotSupported,
    PublishError,
    FxUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigError => "config_error",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::AuthError => "auth_error",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::DecodeError => "decode_error",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::SchemaDrift => "schema_drift",
            ErrorKind::RobotsDenied => "robots_denied",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::NotSupported => "not_supported",
            ErrorKind::PublishError => "publish_error",
            ErrorKind::FxUnavailable => "fx_unavailable",
        }
    }

    /// Whether the retry policy should spend a retry budget attempt
    /// recovering this kind.
    ///
    /// Circuit-open rejections are deliberately excluded so retries never
    /// run past a tripped breaker.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Timeout | ErrorKind::NetworkError
        )
    }
}

/// A structured error carrying the provenance fields callers need to
/// classify and log a failure.
#[derive(Debug, Error, Clone)]
#[error("{kind_str}: {message} (endpoint={endpoint:?} symbol={symbol:?} attempt={attempt} last_status={last_status:?} pattern={pattern:?})", kind_str = self.kind.as_str())]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
    pub endpoint: Option<String>,
    pub symbol: Option<String>,
    pub attempt: u32,
    pub last_status: Option<u16>,
    pub pattern: Option<String>,
    /// Server-specified minimum backoff, parsed from a `Retry-After`
    /// response header when the failing attempt returned one.
    pub retry_after: Option<Duration>,
}

impl FetchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            endpoint: None,
            symbol: None,
            attempt: 0,
            last_status: None,
            pattern: None,
            retry_after: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.last_status = Some(status);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Classifies an HTTP status code into an error kind.
    pub fn classify_status(status: u16) -> ErrorKind {
        match status {
            401 | 403 => ErrorKind::AuthError,
            404 => ErrorKind::NotSupported,
            408 => ErrorKind::Timeout,
            425 | 429 => ErrorKind::RateLimited,
            s if s >= 500 => ErrorKind::NetworkError,
            _ => ErrorKind::ValidationError,
        }
    }

    /// Whether the circuit breaker should count this status as a failure.
    pub fn is_breaker_failure(status: u16) -> bool {
        status >= 500 || status == 429
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
