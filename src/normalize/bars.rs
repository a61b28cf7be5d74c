//! Bar normalization: `NormalizedBar`/`NormalizedBarBatch`.

use crate::decimal::{to_scaled_for_currency, CurrencyScalePolicy, Dec};
use crate::error::{ErrorKind, FetchError};
use crate::identity::Security;
use crate::normalize::{validate_currency_code, validate_mic_if_present, Meta};
use crate::source_api::chart::ChartResult;
use crate::time_utils::{utc_day_boundaries, Clock};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentPolicyId {
    Raw,
    SplitOnly,
    SplitDividend,
}

impl AdjustmentPolicyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentPolicyId::Raw => "raw",
            AdjustmentPolicyId::SplitOnly => "split_only",
            AdjustmentPolicyId::SplitDividend => "split_dividend",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NormalizedBar {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub open: Dec,
    pub high: Dec,
    pub low: Dec,
    pub close: Dec,
    pub volume: u64,
    pub adjusted: bool,
    pub adjustment_policy_id: AdjustmentPolicyId,
    pub currency_code: String,
    pub event_time: DateTime<Utc>,
    pub ingest_time: DateTime<Utc>,
    pub as_of: DateTime<Utc>,
}

impl NormalizedBar {
    fn validate(&self) -> Result<(), FetchError> {
        if self.end != self.start + chrono::Duration::hours(24) {
            return Err(FetchError::new(ErrorKind::ValidationError, "end must equal start + 24h"));
        }
        if self.event_time != self.end {
            return Err(FetchError::new(ErrorKind::ValidationError, "event_time must equal end"));
        }
        let lo = self.open.to_f64().min(self.close.to_f64());
        let hi = self.open.to_f64().max(self.close.to_f64());
        if self.low.to_f64() > lo + 1e-9 {
            return Err(FetchError::new(ErrorKind::ValidationError, "low must be <= min(open,close)"));
        }
        if self.high.to_f64() < hi - 1e-9 {
            return Err(FetchError::new(ErrorKind::ValidationError, "high must be >= max(open,close)"));
        }
        let wants_adjusted = matches!(
            self.adjustment_policy_id,
            AdjustmentPolicyId::SplitOnly | AdjustmentPolicyId::SplitDividend
        );
        if self.adjusted != wants_adjusted {
            return Err(FetchError::new(
                ErrorKind::ValidationError,
                "adjusted flag must match adjustment_policy_id",
            ));
        }
        validate_currency_code(&self.currency_code)?;
        Ok(())
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NormalizedBarBatch {
    pub security: Security,
    pub bars: Vec<NormalizedBar>,
    pub meta: Meta,
}

impl NormalizedBarBatch {
    fn validate(&self) -> Result<(), FetchError> {
        if self.bars.is_empty() {
            return Err(FetchError::new(ErrorKind::ValidationError, "bar batch must not be empty"));
        }
        validate_mic_if_present(&self.security.mic)?;
        for bar in &self.bars {
            bar.validate()?;
        }
        for pair in self.bars.windows(2) {
            if pair[0].event_time >= pair[1].event_time {
                return Err(FetchError::new(
                    ErrorKind::ValidationError,
                    "bars must be strictly ordered by event_time ascending with no duplicates",
                ));
            }
        }
        Ok(())
    }
}

/// Normalizes a decoded chart result into a [`NormalizedBarBatch`].
/// `adjusted_requested` mirrors the caller's `adjusted` flag: if true and
/// the source carries an adjusted close, bars are emitted adjusted;
/// otherwise raw.
pub fn normalize_bars(
    chart: &ChartResult,
    security: Security,
    adjusted_requested: bool,
    scale_policy: &CurrencyScalePolicy,
    run_id: &str,
    producer: &str,
    clock: &dyn Clock,
) -> Result<NormalizedBarBatch, FetchError> {
    let ingest_time = clock.now();
    let currency = if chart.currency.is_empty() { "USD".to_string() } else { chart.currency.clone() };

    let mut bars = Vec::with_capacity(chart.bars.len());
    for raw_bar in &chart.bars {
        let (start, end, event_time) = utc_day_boundaries(raw_bar.timestamp);
        let use_adjusted = adjusted_requested && raw_bar.adjclose.is_some();
        let close_value = if use_adjusted { raw_bar.adjclose.unwrap() } else { raw_bar.close };
        let policy = if use_adjusted { AdjustmentPolicyId::SplitDividend } else { AdjustmentPolicyId::Raw };

        let open = to_scaled_for_currency(raw_bar.open, &currency, scale_policy)?;
        let high = to_scaled_for_currency(raw_bar.high, &currency, scale_policy)?;
        let low = to_scaled_for_currency(raw_bar.low, &currency, scale_policy)?;
        let close = to_scaled_for_currency(close_value, &currency, scale_policy)?;

        bars.push(NormalizedBar {
            start,
            end,
            open,
            high,
            low,
            close,
            volume: raw_bar.volume,
            adjusted: use_adjusted,
            adjustment_policy_id: policy,
            currency_code: currency.clone(),
            event_time,
            ingest_time,
            as_of: event_time,
        });
    }

    let batch = NormalizedBarBatch {
        security,
        bars,
        meta: Meta::new(run_id, producer),
    };
    batch.validate()?;
    Ok(batch)
}
