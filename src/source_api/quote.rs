//! Quote JSON decoding.

use serde::Deserialize;

use crate::error::{ErrorKind, FetchError};

#[derive(Debug, Deserialize)]
struct RawQuote {
    symbol: String,
    currency: Option<String>,
    exchange: Option<String>,
    bid: Option<f64>,
    ask: Option<f64>,
    #[serde(rename = "bidSize")]
    bid_size: Option<u64>,
    #[serde(rename = "askSize")]
    ask_size: Option<u64>,
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "regularMarketHigh")]
    regular_market_high: Option<f64>,
    #[serde(rename = "regularMarketLow")]
    regular_market_low: Option<f64>,
    #[serde(rename = "regularMarketVolume")]
    regular_market_volume: Option<u64>,
}

/// Decoded quote fields, carrying forward only the fields present (never
/// relying on sentinel zeros).
#[derive(Debug, Clone)]
pub struct QuoteResult {
    pub symbol: String,
    pub currency: String,
    pub exchange: String,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub bid_size: Option<u64>,
    pub ask_size: Option<u64>,
    pub regular_market_price: Option<f64>,
    pub regular_market_high: Option<f64>,
    pub regular_market_low: Option<f64>,
    pub regular_market_volume: Option<u64>,
}

pub fn decode_quote(body: &str) -> Result<QuoteResult, FetchError> {
    let raw: RawQuote = serde_json::from_str(body)
        .map_err(|e| FetchError::new(ErrorKind::DecodeError, format!("quote JSON decode failed: {e}")))?;

    for (name, value) in [
        ("bid", raw.bid),
        ("ask", raw.ask),
        ("regularMarketPrice", raw.regular_market_price),
        ("regularMarketHigh", raw.regular_market_high),
        ("regularMarketLow", raw.regular_market_low),
    ] {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(FetchError::new(
                    ErrorKind::ValidationError,
                    format!("{name} is not finite"),
                ));
            }
        }
    }

    let has_price = raw.bid.is_some()
        || raw.ask.is_some()
        || raw.regular_market_price.is_some()
        || raw.regular_market_high.is_some()
        || raw.regular_market_low.is_some();
    if !has_price {
        return Err(FetchError::new(
            ErrorKind::ValidationError,
            "quote has no price fields; at least one is required",
        ));
    }

    Ok(QuoteResult {
        symbol: raw.symbol,
        currency: raw.currency.unwrap_or_default(),
        exchange: raw.exchange.unwrap_or_default(),
        bid: raw.bid,
        ask: raw.ask,
        bid_size: raw.bid_size,
        ask_size: raw.ask_size,
        regular_market_price: raw.regular_market_price,
        regular_market_high: raw.regular_market_high,
        regular_market_low: raw.regular_market_low,
        regular_market_volume: raw.regular_market_volume,
    })
}
