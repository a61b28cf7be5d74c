//! Source-API decoder: strict-ish JSON decode + structural validation
//! for chart, quote, and fundamentals payloads.
//!
//! Grounded on `scrapers/dome_rest.rs`'s plain `reqwest::Client` +
//! `resp.json::<T>()` shape; field shapes cross-checked (reference only,
//! not copied) against `other_examples/.../gramistella-yfinance-rs`.

pub mod chart;
pub mod fundamentals;
pub mod quote;

pub use chart::{decode_chart, ChartBar, ChartResult};
pub use fundamentals::{decode_fundamentals, FundamentalsStatement, StatementLine};
pub use quote::{decode_quote, QuoteResult};
