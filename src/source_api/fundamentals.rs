//! Fundamentals JSON decoding.
//!
//! Three arrays of statements (income, balance sheet, cash flow), each
//! with `endDate.raw` and nullable metric objects `{raw, fmt}`.

use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{ErrorKind, FetchError};

#[derive(Debug, Deserialize)]
struct RawEndDate {
    raw: i64,
}

#[derive(Debug, Deserialize)]
struct RawMetric {
    raw: Option<f64>,
    #[allow(dead_code)]
    fmt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStatement {
    #[serde(rename = "endDate")]
    end_date: RawEndDate,
    #[serde(flatten)]
    metrics: HashMap<String, Option<RawMetric>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFundamentals {
    #[serde(default)]
    income_statement_history: Vec<RawStatement>,
    #[serde(default)]
    balance_sheet_history: Vec<RawStatement>,
    #[serde(default)]
    cashflow_statement_history: Vec<RawStatement>,
}

/// One decoded source metric value for a statement period.
#[derive(Debug, Clone)]
pub struct StatementLine {
    pub key: String,
    pub value: Option<f64>,
}

/// One decoded statement: an end date plus its metric lines.
#[derive(Debug, Clone)]
pub struct StatementPeriod {
    pub end_date_unix: i64,
    pub lines: Vec<StatementLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundamentalsStatement {
    Income,
    BalanceSheet,
    CashFlow,
}

/// The decoded three-statement bundle for one symbol.
#[derive(Debug, Clone)]
pub struct FundamentalsResult {
    pub income: Vec<StatementPeriod>,
    pub balance_sheet: Vec<StatementPeriod>,
    pub cash_flow: Vec<StatementPeriod>,
}

fn convert_statements(raw: Vec<RawStatement>) -> Vec<StatementPeriod> {
    raw.into_iter()
        .map(|stmt| {
            let lines = stmt
                .metrics
                .into_iter()
                .filter_map(|(key, metric)| {
                    let metric = metric?;
                    Some(StatementLine { key, value: metric.raw })
                })
                .collect();
            StatementPeriod { end_date_unix: stmt.end_date.raw, lines }
        })
        .collect()
}

pub fn decode_fundamentals(body: &str) -> Result<FundamentalsResult, FetchError> {
    let raw: RawFundamentals = serde_json::from_str(body).map_err(|e| {
        FetchError::new(ErrorKind::DecodeError, format!("fundamentals JSON decode failed: {e}"))
    })?;

    if raw.income_statement_history.is_empty()
        && raw.balance_sheet_history.is_empty()
        && raw.cashflow_statement_history.is_empty()
    {
        return Err(FetchError::new(
            ErrorKind::SchemaDrift,
            "fundamentals payload contains no statements",
        ));
    }

    Ok(FundamentalsResult {
        income: convert_statements(raw.income_statement_history),
        balance_sheet: convert_statements(raw.balance_sheet_history),
        cash_flow: convert_statements(raw.cashflow_statement_history),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_income_statement_with_nullable_metrics() {
        let body = r#"{
            "incomeStatementHistory": [
                {"endDate": {"raw": 1704067200}, "totalRevenue": {"raw": 1000.0, "fmt": "1.0K"}, "netIncome": null}
            ]
        }"#;
        let result = decode_fundamentals(body).unwrap();
        assert_eq!(result.income.len(), 1);
        assert_eq!(result.income[0].end_date_unix, 1704067200);
        let revenue = result.income[0]
            .lines
            .iter()
            .find(|l| l.key == "totalRevenue")
            .unwrap();
        assert_eq!(revenue.value, Some(1000.0));
    }

    #[test]
    fn rejects_empty_payload() {
        let body = r#"{}"#;
        assert!(decode_fundamentals(body).is_err());
    }
}
