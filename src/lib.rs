//! Resilient market-data acquisition client.
//!
//! The fetch engine (rate limiter, circuit breaker, retry, session pool,
//! robots gate) is shared by both the JSON source-API path and the HTML
//! scrape path; the fallback coordinator picks between them per endpoint
//! and the normalizer maps whichever one answered into the canonical
//! entity model.

pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod decimal;
pub mod emitter;
pub mod error;
pub mod fallback;
pub mod fetch_engine;
pub mod fx;
pub mod html;
pub mod identity;
pub mod normalize;
pub mod rate_limiter;
pub mod retry;
pub mod robots;
pub mod session_pool;
pub mod source_api;
pub mod time_utils;

pub use client::MarketDataClient;
pub use error::{ErrorKind, FetchError};
