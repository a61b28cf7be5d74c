//! Quote normalization: `NormalizedQuote`.

use crate::decimal::{to_scaled_for_currency, CurrencyScalePolicy, Dec};
use crate::error::{ErrorKind, FetchError};
use crate::identity::Security;
use crate::normalize::{validate_currency_code, validate_mic_if_present, Meta};
use crate::source_api::quote::QuoteResult;
use crate::time_utils::Clock;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, serde::Serialize)]
pub struct NormalizedQuote {
    pub security: Security,
    pub kind: &'static str, // always "QUOTE"
    pub bid: Option<Dec>,
    pub bid_size: Option<u64>,
    pub ask: Option<Dec>,
    pub ask_size: Option<u64>,
    pub regular_market_price: Option<Dec>,
    pub regular_market_high: Option<Dec>,
    pub regular_market_low: Option<Dec>,
    pub regular_market_volume: Option<u64>,
    pub venue: Option<String>,
    pub currency_code: String,
    pub event_time: DateTime<Utc>,
    pub ingest_time: DateTime<Utc>,
    pub meta: Meta,
}

impl NormalizedQuote {
    fn validate(&self) -> Result<(), FetchError> {
        if self.bid.is_none()
            && self.ask.is_none()
            && self.regular_market_price.is_none()
            && self.regular_market_high.is_none()
            && self.regular_market_low.is_none()
        {
            return Err(FetchError::new(
                ErrorKind::ValidationError,
                "quote requires at least one price field",
            ));
        }
        validate_currency_code(&self.currency_code)?;
        validate_mic_if_present(&self.security.mic)?;
        Ok(())
    }
}

pub fn normalize_quote(
    raw: &QuoteResult,
    security: Security,
    scale_policy: &CurrencyScalePolicy,
    run_id: &str,
    producer: &str,
    clock: &dyn Clock,
) -> Result<NormalizedQuote, FetchError> {
    let now = clock.now();
    let currency = if raw.currency.is_empty() { "USD".to_string() } else { raw.currency.clone() };

    let scale = |v: Option<f64>| -> Result<Option<Dec>, FetchError> {
        v.map(|x| to_scaled_for_currency(x, &currency, scale_policy)).transpose()
    };

    let quote = NormalizedQuote {
        security,
        kind: "QUOTE",
        bid: scale(raw.bid)?,
        bid_size: raw.bid_size,
        ask: scale(raw.ask)?,
        ask_size: raw.ask_size,
        regular_market_price: scale(raw.regular_market_price)?,
        regular_market_high: scale(raw.regular_market_high)?,
        regular_market_low: scale(raw.regular_market_low)?,
        regular_market_volume: raw.regular_market_volume,
        venue: if raw.exchange.is_empty() { None } else { Some(raw.exchange.clone()) },
        currency_code: currency,
        event_time: now,
        ingest_time: now,
        meta: Meta::new(run_id, producer),
    };
    quote.validate()?;
    Ok(quote)
}
