//! HTML extractor: pattern-based field extraction from scraped pages,
//! producing per-endpoint DTOs.
//!
//! No example repo in this corpus does HTML scraping, so there's no
//! precedent to follow directly; this extractor uses an externalized
//! pattern registry and regex over raw page text rather than a full DOM
//! tree, since the crate depends on `regex` already and the source pages
//! the registry targets are simple enough not to need a DOM parser.

pub mod coerce;
pub mod endpoints;
pub mod patterns;

use std::sync::Arc;

use crate::error::{ErrorKind, FetchError};
use crate::time_utils::Clock;
use endpoints::*;
use patterns::PatternRegistry;

/// The per-endpoint DTO union the extractor can return.
#[derive(Debug, Clone)]
pub enum EndpointDto {
    Profile(ProfileDto),
    KeyStatistics(KeyStatisticsDto),
    Financials(StatementTableDto),
    BalanceSheet(StatementTableDto),
    CashFlow(StatementTableDto),
    Analysis(AnalysisDto),
    AnalystInsights(AnalystInsightsDto),
    News(Vec<NewsItemDto>),
}

/// HTML scrape endpoints the fallback coordinator and client route to,
/// mirroring `/quote/{ticker}/{endpoint}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeEndpoint {
    Profile,
    KeyStatistics,
    Financials,
    BalanceSheet,
    CashFlow,
    Analysis,
    AnalystInsights,
    News,
}

impl ScrapeEndpoint {
    pub fn path_segment(&self) -> &'static str {
        match self {
            ScrapeEndpoint::Profile => "profile",
            ScrapeEndpoint::KeyStatistics => "key-statistics",
            ScrapeEndpoint::Financials => "financials",
            ScrapeEndpoint::BalanceSheet => "balance-sheet",
            ScrapeEndpoint::CashFlow => "cash-flow",
            ScrapeEndpoint::Analysis => "analysis",
            ScrapeEndpoint::AnalystInsights => "analyst-insights",
            ScrapeEndpoint::News => "news",
        }
    }
}

/// Splits a news page into per-article fragments before field extraction.
/// Each `<article>...</article>` block is one candidate item.
fn split_news_containers(html: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find("<article") {
        let after_start = &rest[start..];
        if let Some(end) = after_start.find("</article>") {
            blocks.push(&after_start[..end + "</article>".len()]);
            rest = &after_start[end + "</article>".len()..];
        } else {
            break;
        }
    }
    blocks
}

pub struct HtmlExtractor {
    registry: Arc<PatternRegistry>,
    clock: Arc<dyn Clock>,
}

impl HtmlExtractor {
    pub fn new(registry: Arc<PatternRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    pub fn extract(
        &self,
        endpoint: ScrapeEndpoint,
        html: &str,
        base_url: &str,
    ) -> Result<EndpointDto, FetchError> {
        match endpoint {
            ScrapeEndpoint::Profile => {
                extract_profile(&self.registry, html, base_url).map(EndpointDto::Profile)
            }
            ScrapeEndpoint::KeyStatistics => {
                extract_key_statistics(&self.registry, html).map(EndpointDto::KeyStatistics)
            }
            ScrapeEndpoint::Financials => {
                extract_statement_table(&self.registry, "financials", html).map(EndpointDto::Financials)
            }
            ScrapeEndpoint::BalanceSheet => {
                extract_statement_table(&self.registry, "balance-sheet", html).map(EndpointDto::BalanceSheet)
            }
            ScrapeEndpoint::CashFlow => {
                extract_statement_table(&self.registry, "cash-flow", html).map(EndpointDto::CashFlow)
            }
            ScrapeEndpoint::Analysis => {
                extract_analysis(&self.registry, html).map(EndpointDto::Analysis)
            }
            ScrapeEndpoint::AnalystInsights => {
                extract_analyst_insights(&self.registry, html).map(EndpointDto::AnalystInsights)
            }
            ScrapeEndpoint::News => {
                let blocks = split_news_containers(html);
                if blocks.is_empty() {
                    return Err(FetchError::new(ErrorKind::ParseError, "news_no_articles")
                        .with_endpoint("news"));
                }
                extract_news(&self.registry, &blocks, base_url, self.clock.as_ref())
                    .map(EndpointDto::News)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_utils::FixedClock;
    use chrono::{TimeZone, Utc};

    fn registry() -> Arc<PatternRegistry> {
        let yaml = r#"
profile:
  name:
    - "<h1>([^<]+)</h1>"
news:
  headline:
    - "<h3>([^<]+)</h3>"
  url:
    - "href=\"([^\"]+)\""
"#;
        Arc::new(PatternRegistry::from_yaml(yaml).unwrap())
    }

    #[test]
    fn extracts_profile_name() {
        let extractor = HtmlExtractor::new(
            registry(),
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap())),
        );
        let dto = extractor
            .extract(ScrapeEndpoint::Profile, "<h1>Apple Inc.</h1>", "https://finance.yahoo.com/")
            .unwrap();
        match dto {
            EndpointDto::Profile(p) => assert_eq!(p.name.as_deref(), Some("Apple Inc.")),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn splits_article_containers_and_extracts_news() {
        let extractor = HtmlExtractor::new(
            registry(),
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap())),
        );
        let html = r#"<article><h3>A</h3><a href="/news/a.html"></a></article><article><h3>B</h3><a href="/news/b.html"></a></article>"#;
        let dto = extractor
            .extract(ScrapeEndpoint::News, html, "https://finance.yahoo.com/")
            .unwrap();
        match dto {
            EndpointDto::News(items) => assert_eq!(items.len(), 2),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn no_article_containers_fails_with_news_no_articles() {
        let extractor = HtmlExtractor::new(
            registry(),
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap())),
        );
        let err = extractor
            .extract(ScrapeEndpoint::News, "<div>no articles here</div>", "https://finance.yahoo.com/")
            .unwrap_err();
        assert_eq!(err.message, "news_no_articles");
    }
}
