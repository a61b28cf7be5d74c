//! Integration coverage for the normalize stage driven through the
//! decode step, rather than unit-testing decoder and normalizer in
//! isolation — closer to what the client actually does end to end.

use chrono::{TimeZone, Utc};

use marketfetch::decimal::CurrencyScalePolicy;
use marketfetch::identity::{Security, VenueResolver};
use marketfetch::normalize::bars::normalize_bars;
use marketfetch::normalize::quote::normalize_quote;
use marketfetch::source_api::{decode_chart, decode_quote};
use marketfetch::time_utils::FixedClock;

#[test]
fn chart_json_decodes_and_normalizes_into_a_valid_bar() {
    let body = r#"{"chart":{"result":[{
        "meta":{"symbol":"AAPL","currency":"USD","exchangeName":"NMS"},
        "timestamp":[1704326400],
        "indicators":{"quote":[{
            "open":[189.23],"high":[191.0],"low":[188.9],"close":[190.45],"volume":[43210000]
        }]}
    }],"error":null}}"#;

    let chart = decode_chart(body).unwrap();
    let venue = VenueResolver::new();
    let security = venue.build(&chart.symbol, &chart.exchange_name);
    let clock = FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap());

    let batch =
        normalize_bars(&chart, security, false, &CurrencyScalePolicy::default(), "run-1", "marketfetch-test", &clock)
            .unwrap();

    assert_eq!(batch.security, Security { symbol: "AAPL".into(), mic: "XNAS".into() });
    let bar = &batch.bars[0];
    assert_eq!(bar.open.scaled, 18923);
    assert_eq!(bar.close.scaled, 19045);
    assert_eq!(bar.start.to_rfc3339(), "2024-01-02T00:00:00+00:00");
    assert_eq!(bar.end, bar.event_time);
}

#[test]
fn chart_json_with_only_null_bars_fails_to_decode() {
    let body = r#"{"chart":{"result":[{
        "meta":{"symbol":"AAPL"},
        "timestamp":[1704326400],
        "indicators":{"quote":[{"open":[null],"high":[null],"low":[null],"close":[null],"volume":[null]}]}
    }],"error":null}}"#;
    assert!(decode_chart(body).is_err());
}

#[test]
fn quote_json_decodes_and_normalizes_with_resolved_venue() {
    let body = r#"{
        "symbol":"7203.T","currency":"JPY","exchange":"JPX",
        "bid":2500.0,"ask":2505.0,"regularMarketPrice":2502.5
    }"#;

    let quote = decode_quote(body).unwrap();
    let venue = VenueResolver::new();
    let security = venue.build(&quote.symbol, &quote.exchange);
    let clock = FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap());

    let normalized =
        normalize_quote(&quote, security, &CurrencyScalePolicy::default(), "run-1", "marketfetch-test", &clock)
            .unwrap();

    assert_eq!(normalized.security.symbol, "7203");
    assert_eq!(normalized.security.mic, "XTKS");
    assert_eq!(normalized.currency_code, "JPY");
}
