//! Endpoint-specific DTOs produced by the HTML extractor.
//!
//! Scalar-field endpoints (key statistics, profile, analysis, analyst
//! insights) pull named fields straight from the pattern registry. The
//! three statement endpoints (financials, balance sheet, cash flow) read
//! column headers dynamically rather than hard-coding quarter dates: one
//! `periods` pattern captures the header row, one `row` pattern is applied
//! repeatedly to pick up however many line items the page has.

use std::collections::HashMap;

use crate::error::{ErrorKind, FetchError};
use crate::html::coerce::{normalize_url, parse_relative_time, parse_scaled_number};
use crate::html::patterns::PatternRegistry;
use crate::time_utils::Clock;

fn require_field(
    registry: &PatternRegistry,
    endpoint: &str,
    field: &str,
    html: &str,
) -> Option<String> {
    registry.extract(endpoint, field, html).map(str::to_string)
}

fn require_number(registry: &PatternRegistry, endpoint: &str, field: &str, html: &str) -> Option<f64> {
    require_field(registry, endpoint, field, html).and_then(|raw| parse_scaled_number(&raw))
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct KeyStatisticsDto {
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
}

pub fn extract_key_statistics(
    registry: &PatternRegistry,
    html: &str,
) -> Result<KeyStatisticsDto, FetchError> {
    let dto = KeyStatisticsDto {
        market_cap: require_number(registry, "key-statistics", "market_cap", html),
        pe_ratio: require_number(registry, "key-statistics", "pe_ratio", html),
        eps: require_number(registry, "key-statistics", "eps", html),
        dividend_yield: require_number(registry, "key-statistics", "dividend_yield", html),
        beta: require_number(registry, "key-statistics", "beta", html),
        fifty_two_week_high: require_number(registry, "key-statistics", "fifty_two_week_high", html),
        fifty_two_week_low: require_number(registry, "key-statistics", "fifty_two_week_low", html),
    };
    if dto.market_cap.is_none() && dto.pe_ratio.is_none() && dto.eps.is_none() {
        return Err(FetchError::new(ErrorKind::ParseError, "no_fields_extracted")
            .with_endpoint("key-statistics"));
    }
    Ok(dto)
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ProfileDto {
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub employees: Option<i64>,
    pub description: Option<String>,
    pub website: Option<String>,
}

pub fn extract_profile(
    registry: &PatternRegistry,
    html: &str,
    base_url: &str,
) -> Result<ProfileDto, FetchError> {
    let name = require_field(registry, "profile", "name", html);
    if name.is_none() {
        return Err(FetchError::new(ErrorKind::ParseError, "no_fields_extracted")
            .with_endpoint("profile"));
    }
    let website = require_field(registry, "profile", "website", html)
        .and_then(|raw| normalize_url(&raw, base_url));
    let employees = require_field(registry, "profile", "employees", html)
        .and_then(|raw| crate::html::coerce::parse_int_text(&raw));
    Ok(ProfileDto {
        name,
        sector: require_field(registry, "profile", "sector", html),
        industry: require_field(registry, "profile", "industry", html),
        employees,
        description: require_field(registry, "profile", "description", html),
        website,
    })
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AnalysisDto {
    pub recommendation: Option<String>,
    pub price_target_avg: Option<f64>,
    pub price_target_high: Option<f64>,
    pub price_target_low: Option<f64>,
}

pub fn extract_analysis(registry: &PatternRegistry, html: &str) -> Result<AnalysisDto, FetchError> {
    let dto = AnalysisDto {
        recommendation: require_field(registry, "analysis", "recommendation", html),
        price_target_avg: require_number(registry, "analysis", "price_target_avg", html),
        price_target_high: require_number(registry, "analysis", "price_target_high", html),
        price_target_low: require_number(registry, "analysis", "price_target_low", html),
    };
    if dto.recommendation.is_none() && dto.price_target_avg.is_none() {
        return Err(FetchError::new(ErrorKind::ParseError, "no_fields_extracted")
            .with_endpoint("analysis"));
    }
    Ok(dto)
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AnalystInsightsDto {
    pub consensus: Option<String>,
    pub num_analysts: Option<i64>,
}

pub fn extract_analyst_insights(
    registry: &PatternRegistry,
    html: &str,
) -> Result<AnalystInsightsDto, FetchError> {
    let dto = AnalystInsightsDto {
        consensus: require_field(registry, "analyst-insights", "consensus", html),
        num_analysts: require_field(registry, "analyst-insights", "num_analysts", html)
            .and_then(|raw| crate::html::coerce::parse_int_text(&raw)),
    };
    if dto.consensus.is_none() {
        return Err(FetchError::new(ErrorKind::ParseError, "no_fields_extracted")
            .with_endpoint("analyst-insights"));
    }
    Ok(dto)
}

/// Dynamic statement table for financials/balance-sheet/cash-flow: column
/// headers and row labels are both read from the page, never hard-coded.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StatementTableDto {
    pub periods: Vec<String>,
    pub rows: HashMap<String, Vec<Option<f64>>>,
}

pub fn extract_statement_table(
    registry: &PatternRegistry,
    endpoint: &str,
    html: &str,
) -> Result<StatementTableDto, FetchError> {
    let periods_raw = require_field(registry, endpoint, "periods", html)
        .ok_or_else(|| FetchError::new(ErrorKind::ParseError, "no_fields_extracted").with_endpoint(endpoint))?;
    let periods: Vec<String> = periods_raw.split('|').map(|s| s.trim().to_string()).collect();

    let field_patterns = registry
        .field_patterns(endpoint, "row")
        .ok_or_else(|| FetchError::new(ErrorKind::ConfigError, "no row pattern configured").with_endpoint(endpoint))?;

    let mut rows = HashMap::new();
    for re in &field_patterns.patterns {
        for caps in re.captures_iter(html) {
            let label = match caps.get(1) {
                Some(m) => m.as_str().trim().to_string(),
                None => continue,
            };
            let values_raw = match caps.get(2) {
                Some(m) => m.as_str(),
                None => continue,
            };
            let values: Vec<Option<f64>> = values_raw
                .split('|')
                .map(|v| parse_scaled_number(v.trim()))
                .collect();
            rows.insert(label, values);
        }
    }

    if rows.is_empty() {
        return Err(FetchError::new(ErrorKind::ParseError, "no_fields_extracted").with_endpoint(endpoint));
    }
    Ok(StatementTableDto { periods, rows })
}

/// One raw news item as extracted from the page, before dedup/sort.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NewsItemDto {
    pub headline: String,
    pub url: String,
    pub source: String,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub tickers: Vec<String>,
}

/// Extracts and deduplicates news items. `item_blocks` are pre-split
/// per-article HTML fragments (the container-selection step).
pub fn extract_news(
    registry: &PatternRegistry,
    item_blocks: &[&str],
    base_url: &str,
    clock: &dyn Clock,
) -> Result<Vec<NewsItemDto>, FetchError> {
    let now = clock.now();
    let mut items = Vec::new();
    for block in item_blocks {
        let headline = require_field(registry, "news", "headline", block);
        let url_raw = require_field(registry, "news", "url", block);
        let (Some(headline), Some(url_raw)) = (headline, url_raw) else {
            continue; // required fields missing: drop the item, not fatal.
        };
        let Some(url) = normalize_url(&url_raw, base_url) else {
            continue;
        };
        let source = require_field(registry, "news", "source", block).unwrap_or_default();
        let published_at = require_field(registry, "news", "published_at", block)
            .and_then(|raw| parse_relative_time(&raw, now));
        let tickers = require_field(registry, "news", "tickers", block)
            .map(|raw| raw.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect())
            .unwrap_or_default();
        items.push(NewsItemDto { headline, url, source, published_at, tickers });
    }

    if items.is_empty() {
        return Err(FetchError::new(ErrorKind::ParseError, "news_no_articles").with_endpoint("news"));
    }

    Ok(dedup_and_sort_news(items))
}

fn normalized_title(headline: &str) -> String {
    headline.trim().to_ascii_lowercase()
}

/// URL match, or same `(normalized_title, source)` within a 2-minute window
/// on `published_at`.
fn dedup_and_sort_news(items: Vec<NewsItemDto>) -> Vec<NewsItemDto> {
    let mut kept: Vec<NewsItemDto> = Vec::new();
    for item in items {
        let is_dup = kept.iter().any(|existing| {
            if existing.url == item.url {
                return true;
            }
            if normalized_title(&existing.headline) != normalized_title(&item.headline)
                || existing.source != item.source
            {
                return false;
            }
            match (existing.published_at, item.published_at) {
                (Some(a), Some(b)) => (a - b).num_seconds().abs() <= 120,
                _ => false,
            }
        });
        if !is_dup {
            kept.push(item);
        }
    }
    kept.sort_by(|a, b| match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_utils::FixedClock;
    use chrono::TimeZone;
    use chrono::Utc;

    fn registry() -> PatternRegistry {
        let yaml = r#"
news:
  headline:
    - "<h3>([^<]+)</h3>"
  url:
    - "href=\"([^\"]+)\""
  source:
    - "<span class=\"source\">([^<]+)</span>"
  published_at:
    - "<time>([^<]+)</time>"
"#;
        PatternRegistry::from_yaml(yaml).unwrap()
    }

    #[test]
    fn dedups_news_across_tracking_params_and_relative_paths() {
        let reg = registry();
        let block_a =
            r#"<h3>T</h3><a href="https://finance.yahoo.com/news/a.html?utm_source=x"></a><span class="source">S</span><time>16m ago</time>"#;
        let block_b = r#"<h3>T</h3><a href="/news/a.html"></a><span class="source">S</span><time>16m ago</time>"#;
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap());
        let items = extract_news(
            &reg,
            &[block_a, block_b],
            "https://finance.yahoo.com/",
            &clock,
        )
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://finance.yahoo.com/news/a.html");
    }

    #[test]
    fn missing_required_fields_drops_item_not_whole_extraction() {
        let reg = registry();
        let good = r#"<h3>T</h3><a href="/news/a.html"></a>"#;
        let bad = r#"<span class="source">S</span>"#; // no headline, no url
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap());
        let items = extract_news(&reg, &[good, bad], "https://finance.yahoo.com/", &clock).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn no_articles_at_all_is_an_error() {
        let reg = registry();
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap());
        let err = extract_news(&reg, &[], "https://finance.yahoo.com/", &clock).unwrap_err();
        assert_eq!(err.message, "news_no_articles");
    }

    #[test]
    fn statement_table_reads_dynamic_headers_and_rows() {
        let yaml = r#"
financials:
  periods:
    - "<thead>([^<]+(?:\\|[^<]+)*)</thead>"
  row:
    - "<tr>([A-Za-z ]+)</tr>:([0-9.\\-|]+)"
"#;
        let reg = PatternRegistry::from_yaml(yaml).unwrap();
        let html = "<thead>2023-12-31|2024-12-31</thead><tr>Total Revenue</tr>:1000.0|1200.0";
        let table = extract_statement_table(&reg, "financials", html).unwrap();
        assert_eq!(table.periods, vec!["2023-12-31", "2024-12-31"]);
        assert_eq!(table.rows["Total Revenue"], vec![Some(1000.0), Some(1200.0)]);
    }
}
