//! Integration coverage for the HTML extractor driven through the real
//! shipped pattern registry (`config/patterns.yaml`) instead of the small
//! inline-YAML fixtures used by the unit tests alongside the extractor
//! itself.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use marketfetch::html::patterns::default_registry;
use marketfetch::html::{EndpointDto, HtmlExtractor, ScrapeEndpoint};
use marketfetch::time_utils::FixedClock;

fn extractor() -> HtmlExtractor {
    let registry = Arc::new(default_registry().unwrap());
    let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap()));
    HtmlExtractor::new(registry, clock)
}

#[test]
fn extracts_profile_fields_from_the_shipped_pattern_set() {
    let html = r#"
        <h1 class="title">Apple Inc.</h1>
        <p>Sector: Technology</p>
        <p>Industry: Consumer Electronics</p>
        <p>Full Time Employees 164,000</p>
        <p class="description">Apple designs, manufactures and markets smartphones.</p>
        <a class="website" href="https://www.apple.com">Website</a>
    "#;
    let dto = extractor().extract(ScrapeEndpoint::Profile, html, "https://finance.yahoo.com/").unwrap();
    match dto {
        EndpointDto::Profile(p) => {
            assert_eq!(p.name.as_deref(), Some("Apple Inc."));
            assert_eq!(p.sector.as_deref(), Some("Technology"));
            assert_eq!(p.industry.as_deref(), Some("Consumer Electronics"));
            assert_eq!(p.employees, Some(164_000));
            assert_eq!(p.website.as_deref(), Some("https://www.apple.com/"));
        }
        _ => panic!("wrong variant"),
    }
}

#[test]
fn extracts_key_statistics_numerics_with_suffixes() {
    let html = r#"
        Market Cap (intraday) 2.95T
        Trailing PE 31.2
        EPS (TTM) 6.1
        Forward Dividend & Yield 0.52%
        Beta (5Y Monthly) 1.3
        52 Week High 199.62
        52 Week Low 164.08
    "#;
    let dto = extractor().extract(ScrapeEndpoint::KeyStatistics, html, "https://finance.yahoo.com/").unwrap();
    match dto {
        EndpointDto::KeyStatistics(s) => {
            assert_eq!(s.market_cap, Some(2.95e12));
            assert_eq!(s.pe_ratio, Some(31.2));
            assert_eq!(s.eps, Some(6.1));
            assert_eq!(s.dividend_yield, Some(0.52));
            assert_eq!(s.beta, Some(1.3));
            assert_eq!(s.fifty_two_week_high, Some(199.62));
            assert_eq!(s.fifty_two_week_low, Some(164.08));
        }
        _ => panic!("wrong variant"),
    }
}

#[test]
fn extracts_dynamic_statement_table_headers_and_rows() {
    let html = concat!(
        "<thead class=\"row\">2023-12-31|2024-12-31</thead>",
        "<tr data-label=\"Total Revenue\">1000.0|1200.0</tr>",
        "<tr data-label=\"Net Income\">100.0|150.0</tr>",
    );
    let dto = extractor().extract(ScrapeEndpoint::Financials, html, "https://finance.yahoo.com/").unwrap();
    match dto {
        EndpointDto::Financials(table) => {
            assert_eq!(table.periods, vec!["2023-12-31", "2024-12-31"]);
            assert_eq!(table.rows["Total Revenue"], vec![Some(1000.0), Some(1200.0)]);
            assert_eq!(table.rows["Net Income"], vec![Some(100.0), Some(150.0)]);
        }
        _ => panic!("wrong variant"),
    }
}

#[test]
fn balance_sheet_and_cash_flow_share_the_same_row_shape() {
    let html = concat!(
        "<thead>2024-12-31</thead>",
        "<tr data-label=\"Total Assets\">500.0</tr>",
    );
    let balance = extractor().extract(ScrapeEndpoint::BalanceSheet, html, "https://finance.yahoo.com/").unwrap();
    match balance {
        EndpointDto::BalanceSheet(table) => assert_eq!(table.rows["Total Assets"], vec![Some(500.0)]),
        _ => panic!("wrong variant"),
    }

    let cash_html = concat!(
        "<thead>2024-12-31</thead>",
        "<tr data-label=\"Operating Cash Flow\">80.0</tr>",
    );
    let cash_flow = extractor().extract(ScrapeEndpoint::CashFlow, cash_html, "https://finance.yahoo.com/").unwrap();
    match cash_flow {
        EndpointDto::CashFlow(table) => assert_eq!(table.rows["Operating Cash Flow"], vec![Some(80.0)]),
        _ => panic!("wrong variant"),
    }
}

#[test]
fn extracts_analysis_and_analyst_insights() {
    let analysis_html = r#"
        Recommendation Rating: Buy
        Average 195.0
        High 220.0
        Low 170.0
    "#;
    let analysis = extractor().extract(ScrapeEndpoint::Analysis, analysis_html, "https://finance.yahoo.com/").unwrap();
    match analysis {
        EndpointDto::Analysis(a) => {
            assert_eq!(a.recommendation.as_deref(), Some("Buy"));
            assert_eq!(a.price_target_avg, Some(195.0));
            assert_eq!(a.price_target_high, Some(220.0));
            assert_eq!(a.price_target_low, Some(170.0));
        }
        _ => panic!("wrong variant"),
    }

    let insights_html = r#"
        Consensus Rating: Overweight
        Number of Analysts 32
    "#;
    let insights =
        extractor().extract(ScrapeEndpoint::AnalystInsights, insights_html, "https://finance.yahoo.com/").unwrap();
    match insights {
        EndpointDto::AnalystInsights(i) => {
            assert_eq!(i.consensus.as_deref(), Some("Overweight"));
            assert_eq!(i.num_analysts, Some(32));
        }
        _ => panic!("wrong variant"),
    }
}

#[test]
fn extracts_and_dedups_news_articles_from_the_shipped_pattern_set() {
    let html = concat!(
        "<article>",
        "<h3 class=\"headline\">Apple unveils new chip</h3>",
        "<a class=\"link\" href=\"/news/apple-chip.html\"></a>",
        "<span class=\"publisher\">Reuters</span>",
        "<time datetime=\"2025-09-29\">16m ago</time>",
        "<div class=\"tickers\">AAPL, NASDAQ</div>",
        "</article>",
        "<article>",
        "<h3 class=\"headline\">Apple unveils new chip</h3>",
        "<a class=\"link\" href=\"https://finance.yahoo.com/news/apple-chip.html?utm_source=x\"></a>",
        "<span class=\"publisher\">Reuters</span>",
        "<time datetime=\"2025-09-29\">16m ago</time>",
        "</article>",
    );
    let dto = extractor().extract(ScrapeEndpoint::News, html, "https://finance.yahoo.com/").unwrap();
    match dto {
        EndpointDto::News(items) => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].headline, "Apple unveils new chip");
            assert_eq!(items[0].source, "Reuters");
            assert_eq!(items[0].tickers, vec!["AAPL".to_string(), "NASDAQ".to_string()]);
        }
        _ => panic!("wrong variant"),
    }
}

#[test]
fn missing_required_profile_name_is_a_parse_error() {
    let html = "<p>Sector: Technology</p>";
    let err = extractor().extract(ScrapeEndpoint::Profile, html, "https://finance.yahoo.com/").unwrap_err();
    assert_eq!(err.message, "no_fields_extracted");
}

#[test]
fn news_page_with_no_article_containers_is_a_parse_error() {
    let err = extractor()
        .extract(ScrapeEndpoint::News, "<div>nothing here</div>", "https://finance.yahoo.com/")
        .unwrap_err();
    assert_eq!(err.message, "news_no_articles");
}
