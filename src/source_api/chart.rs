//! Chart JSON decoding.

use serde::Deserialize;

use crate::error::{ErrorKind, FetchError};

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<RawChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawChartResult {
    meta: RawMeta,
    timestamp: Option<Vec<i64>>,
    indicators: RawIndicators,
}

#[derive(Debug, Deserialize)]
struct RawMeta {
    symbol: String,
    currency: Option<String>,
    #[serde(rename = "exchangeName")]
    exchange_name: Option<String>,
    timezone: Option<String>,
    #[serde(rename = "firstTradeDate")]
    first_trade_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawIndicators {
    quote: Vec<RawQuoteArrays>,
    adjclose: Option<Vec<RawAdjClose>>,
}

#[derive(Debug, Deserialize, Default)]
struct RawQuoteArrays {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<u64>>>,
}

#[derive(Debug, Deserialize)]
struct RawAdjClose {
    adjclose: Option<Vec<Option<f64>>>,
}

/// A single decoded, internally-consistent chart bar.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adjclose: Option<f64>,
}

/// The decoded result of one chart series.
#[derive(Debug, Clone)]
pub struct ChartResult {
    pub symbol: String,
    pub currency: String,
    pub exchange_name: String,
    pub timezone: Option<String>,
    pub first_trade_date: Option<i64>,
    pub bars: Vec<ChartBar>,
}

/// Decodes a chart JSON payload, skipping bars with any missing OHLCV
/// component but failing if none remain valid.
pub fn decode_chart(body: &str) -> Result<ChartResult, FetchError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| FetchError::new(ErrorKind::DecodeError, format!("chart JSON decode failed: {e}")))?;

    if let Some(err) = envelope.chart.error {
        if !err.is_null() {
            return Err(FetchError::new(
                ErrorKind::SchemaDrift,
                format!("chart API returned an error object: {err}"),
            ));
        }
    }

    let results = envelope.chart.result.ok_or_else(|| {
        FetchError::new(ErrorKind::SchemaDrift, "chart.result missing")
    })?;
    let raw = results
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::new(ErrorKind::SchemaDrift, "chart.result is empty"))?;

    let timestamps = raw
        .timestamp
        .ok_or_else(|| FetchError::new(ErrorKind::SchemaDrift, "chart.result[0].timestamp missing"))?;

    let quote = raw
        .indicators
        .quote
        .into_iter()
        .next()
        .unwrap_or_default();

    let n = timestamps.len();
    let arrays_consistent = [&quote.open, &quote.high, &quote.low, &quote.close]
        .iter()
        .all(|arr| arr.as_ref().map(|a| a.len()) == Some(n));
    let volume_consistent = quote.volume.as_ref().map(|a| a.len()) == Some(n);
    if !arrays_consistent || !volume_consistent {
        return Err(FetchError::new(
            ErrorKind::SchemaDrift,
            "chart indicator arrays have mismatched lengths",
        ));
    }

    let adjclose = raw
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .and_then(|a| a.adjclose);
    if let Some(adj) = &adjclose {
        if adj.len() != n {
            return Err(FetchError::new(
                ErrorKind::SchemaDrift,
                "adjclose array length mismatch",
            ));
        }
    }

    let open = quote.open.unwrap();
    let high = quote.high.unwrap();
    let low = quote.low.unwrap();
    let close = quote.close.unwrap();
    let volume = quote.volume.unwrap();

    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let (Some(o), Some(h), Some(l), Some(c), Some(v)) =
            (open[i], high[i], low[i], close[i], volume[i])
        else {
            continue; // missing component: skip, not fatal
        };
        if !(o.is_finite() && h.is_finite() && l.is_finite() && c.is_finite()) {
            continue;
        }
        if o < 0.0 || h < 0.0 || l < 0.0 || c < 0.0 {
            continue;
        }
        if h < o.max(c).max(l) || l > o.min(c).min(h) {
            continue; // internal consistency violated
        }
        bars.push(ChartBar {
            timestamp: timestamps[i],
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
            adjclose: adjclose.as_ref().and_then(|a| a[i]),
        });
    }

    if bars.is_empty() {
        return Err(FetchError::new(ErrorKind::DecodeError, "no valid bars"));
    }

    Ok(ChartResult {
        symbol: raw.meta.symbol,
        currency: raw.meta.currency.unwrap_or_default(),
        exchange_name: raw.meta.exchange_name.unwrap_or_default(),
        timezone: raw.meta.timezone,
        first_trade_date: raw.meta.first_trade_date,
        bars,
    })
}
