//! Fundamentals normalization: `NormalizedFundamentalsLine/Snapshot`,
//! whitelisted key mapping, per-key scale policy, quarterly period
//! derivation.

use std::collections::HashMap;

use chrono::{DateTime, Months, TimeZone, Utc};

use crate::decimal::{to_scaled, Dec};
use crate::error::FetchError;
use crate::identity::Security;
use crate::normalize::Meta;
use crate::source_api::fundamentals::{FundamentalsResult, StatementPeriod};
use crate::time_utils::Clock;

/// Source key (as it appears in the statement JSON) -> canonical key.
/// Anything not listed here and not already `custom_`-prefixed is dropped.
fn whitelist() -> &'static HashMap<&'static str, &'static str> {
    use std::sync::OnceLock;
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("totalRevenue", "revenue"),
            ("netIncome", "net_income"),
            ("basicEPS", "eps_basic"),
            ("totalAssets", "total_assets"),
            ("totalLiab", "total_liabilities"),
            ("totalStockholderEquity", "total_equity"),
            ("totalCashFromOperatingActivities", "operating_cashflow"),
        ])
    })
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NormalizedFundamentalsLine {
    pub key: String,
    pub value: Dec,
    pub currency_code: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NormalizedFundamentalsSnapshot {
    pub security: Security,
    pub lines: Vec<NormalizedFundamentalsLine>,
    pub source: String,
    pub as_of: DateTime<Utc>,
    pub meta: Meta,
}

fn period_bounds(end_date_unix: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = Utc.timestamp_opt(end_date_unix, 0).single().unwrap_or_else(|| {
        Utc.timestamp_opt(0, 0).single().expect("epoch is always valid")
    });
    let start = end.checked_sub_months(Months::new(3)).unwrap_or(end);
    (start, end)
}

fn canonical_key_for(source_key: &str) -> Option<String> {
    if let Some(mapped) = whitelist().get(source_key) {
        return Some((*mapped).to_string());
    }
    if let Some(custom) = source_key.strip_prefix("custom_") {
        return Some(format!("custom_{custom}"));
    }
    None
}

fn lines_from_statement(
    statements: &[StatementPeriod],
    currency: &str,
) -> Vec<NormalizedFundamentalsLine> {
    let mut lines = Vec::new();
    for period in statements {
        let (period_start, period_end) = period_bounds(period.end_date_unix);
        for line in &period.lines {
            let Some(canonical_key) = canonical_key_for(&line.key) else { continue };
            let Some(raw_value) = line.value else { continue };
            if !raw_value.is_finite() {
                continue;
            }
            // EPS is interpreted at the raw host value, scale=2; other
            // money fields go through the normal to_scaled path, also
            // scale=2 in the core.
            let Ok(value) = to_scaled(raw_value, 2) else { continue };
            lines.push(NormalizedFundamentalsLine {
                key: canonical_key,
                value,
                currency_code: currency.to_string(),
                period_start,
                period_end,
            });
        }
    }
    lines
}

pub fn normalize_fundamentals(
    raw: &FundamentalsResult,
    security: Security,
    currency: &str,
    source: &str,
    run_id: &str,
    producer: &str,
    clock: &dyn Clock,
) -> NormalizedFundamentalsSnapshot {
    let mut lines = Vec::new();
    lines.extend(lines_from_statement(&raw.income, currency));
    lines.extend(lines_from_statement(&raw.balance_sheet, currency));
    lines.extend(lines_from_statement(&raw.cash_flow, currency));

    NormalizedFundamentalsSnapshot {
        security,
        lines,
        source: source.to_string(),
        as_of: clock.now(),
        meta: Meta::new(run_id, producer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_api::fundamentals::StatementLine;
    use crate::time_utils::FixedClock;
    use chrono::TimeZone;

    #[test]
    fn maps_whitelisted_keys_and_derives_quarterly_period() {
        let raw = FundamentalsResult {
            income: vec![StatementPeriod {
                end_date_unix: 1_704_067_200,
                lines: vec![
                    StatementLine { key: "totalRevenue".to_string(), value: Some(1000.0) },
                    StatementLine { key: "unmappedField".to_string(), value: Some(5.0) },
                ],
            }],
            balance_sheet: vec![],
            cash_flow: vec![],
        };
        let sec = Security { symbol: "AAPL".into(), mic: "XNAS".into() };
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap());
        let snapshot =
            normalize_fundamentals(&raw, sec, "USD", "yahoo-finance-web", "run-1", "host-1", &clock);
        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(snapshot.lines[0].key, "revenue");
        assert!(snapshot.lines[0].period_start < snapshot.lines[0].period_end);
    }

    #[test]
    fn drops_non_finite_values() {
        let raw = FundamentalsResult {
            income: vec![StatementPeriod {
                end_date_unix: 1_704_067_200,
                lines: vec![StatementLine { key: "netIncome".to_string(), value: Some(f64::NAN) }],
            }],
            balance_sheet: vec![],
            cash_flow: vec![],
        };
        let sec = Security { symbol: "AAPL".into(), mic: "XNAS".into() };
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap());
        let snapshot =
            normalize_fundamentals(&raw, sec, "USD", "yahoo-finance-web", "run-1", "host-1", &clock);
        assert!(snapshot.lines.is_empty());
    }

    #[test]
    fn keeps_custom_prefixed_keys() {
        let raw = FundamentalsResult {
            income: vec![StatementPeriod {
                end_date_unix: 1_704_067_200,
                lines: vec![StatementLine { key: "custom_foo".to_string(), value: Some(1.0) }],
            }],
            balance_sheet: vec![],
            cash_flow: vec![],
        };
        let sec = Security { symbol: "AAPL".into(), mic: "XNAS".into() };
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap());
        let snapshot =
            normalize_fundamentals(&raw, sec, "USD", "yahoo-finance-web", "run-1", "host-1", &clock);
        assert_eq!(snapshot.lines[0].key, "custom_foo");
    }
}
