//! Caller-facing API: a thin client exposing per-artifact fetch methods,
//! scrape methods per endpoint, and a "fetch all fundamentals"
//! convenience that preserves partial success.
//!
//! Structured around a top-level struct wrapping its subsystems, the way
//! `main.rs`'s original handler plumbing did, rebuilt around this
//! crate's own subsystems.

use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::Config;
use crate::decimal::CurrencyScalePolicy;
use crate::error::FetchError;
use crate::fallback::{FallbackCoordinator, FallbackStrategy};
use crate::fetch_engine::{Ctx, FetchEngine, FetchRequest};
use crate::html::endpoints::{AnalysisDto, AnalystInsightsDto, KeyStatisticsDto, ProfileDto, StatementTableDto};
use crate::html::{EndpointDto, HtmlExtractor, ScrapeEndpoint};
use crate::identity::{Security, VenueResolver};
use crate::normalize::bars::NormalizedBarBatch;
use crate::normalize::fundamentals::{normalize_fundamentals, NormalizedFundamentalsSnapshot};
use crate::normalize::news::{normalize_news, NewsItem};
use crate::normalize::profile::{normalize_profile, NormalizedProfile};
use crate::normalize::quote::{normalize_quote, NormalizedQuote};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::robots::RobotsGate;
use crate::session_pool::SessionPool;
use crate::source_api::{decode_chart, decode_fundamentals, decode_quote};
use crate::time_utils::{Clock, SystemClock};

/// HTML pages live under a fixed host distinct from the JSON API host,
/// mirroring `https://{host}/quote/{ticker}/{endpoint}`.
const SCRAPE_BASE_URL: &str = "https://finance.yahoo.com";

/// One endpoint's outcome within a multi-endpoint fundamentals pull,
/// preserving partial success rather than collapsing to one failure.
#[derive(Debug, Clone)]
pub enum FundamentalsOutcome {
    Fundamentals(Result<NormalizedFundamentalsSnapshot, FetchError>),
    KeyStatistics(Result<KeyStatisticsDto, FetchError>),
    Financials(Result<StatementTableDto, FetchError>),
    BalanceSheet(Result<StatementTableDto, FetchError>),
    CashFlow(Result<StatementTableDto, FetchError>),
    Analysis(Result<AnalysisDto, FetchError>),
    AnalystInsights(Result<AnalystInsightsDto, FetchError>),
}

/// Minimal company identification — deliberately not the full profile;
/// `FetchCompanyInfo` stays identification-only by design.
#[derive(Debug, Clone)]
pub struct CompanyIdentification {
    pub security: Security,
    pub currency_code: Option<String>,
    pub exchange: Option<String>,
}

pub struct MarketDataClient {
    config: Config,
    engine: Arc<FetchEngine>,
    extractor: HtmlExtractor,
    venue: VenueResolver,
    scale_policy: CurrencyScalePolicy,
    fallback: FallbackCoordinator,
    clock: Arc<dyn Clock>,
    producer: String,
}

impl MarketDataClient {
    pub fn new(config: Config) -> Result<Self, FetchError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self, FetchError> {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit.per_host_qps,
            config.rate_limit.per_host_burst,
            config.rate_limit.per_session_qps,
            config.rate_limit.per_session_burst,
        )?);
        let sessions = Arc::new(SessionPool::new(
            config.sessions.n,
            config.sessions.eject_after,
            Duration::from_millis(config.sessions.recreate_cooldown_ms),
            Duration::from_millis(config.yahoo.timeout_ms),
        )?);
        let breaker = Arc::new(CircuitBreaker::new(
            config.circuit_breaker.window,
            config.circuit_breaker.failure_threshold,
            Duration::from_millis(config.circuit_breaker.reset_timeout_ms),
            config.circuit_breaker.half_open_probes,
        ));
        let retry = RetryPolicy::new(config.retry.attempts, config.retry.base_ms, config.retry.max_delay_ms)?;

        let robots = if config.scrape.enabled {
            let robots_client = reqwest::Client::builder()
                .timeout(Duration::from_millis(config.yahoo.timeout_ms))
                .build()
                .map_err(|e| {
                    FetchError::new(crate::error::ErrorKind::ConfigError, format!("failed to build robots client: {e}"))
                })?;
            Some(Arc::new(RobotsGate::new(
                config.scrape.robots_policy,
                Duration::from_millis(config.scrape.cache_ttl_ms),
                robots_client,
            )))
        } else {
            None
        };

        let engine = Arc::new(FetchEngine::new(rate_limiter, sessions, breaker, retry, robots));

        let registry = Arc::new(crate::html::patterns::default_registry()?);
        let extractor = HtmlExtractor::new(registry, clock.clone());

        let fallback = FallbackCoordinator::new(FallbackStrategy::Auto)
            .with_strategy("financials", FallbackStrategy::ScrapeOnly)
            .with_strategy("balance-sheet", FallbackStrategy::ScrapeOnly)
            .with_strategy("cash-flow", FallbackStrategy::ScrapeOnly)
            .with_strategy("analysis", FallbackStrategy::ScrapeOnly)
            .with_strategy("analyst-insights", FallbackStrategy::ScrapeOnly)
            .with_strategy("news", FallbackStrategy::ScrapeOnly);

        Ok(Self {
            producer: format!("marketfetch@{}", config.yahoo.base_url),
            config,
            engine,
            extractor,
            venue: VenueResolver::new(),
            scale_policy: CurrencyScalePolicy::default(),
            fallback,
            clock,
        })
    }

    fn chart_url(&self, symbol: &str, start_unix: i64, end_unix: i64) -> String {
        format!(
            "{}/v8/finance/chart/{symbol}?interval=1d&period1={start_unix}&period2={end_unix}",
            self.config.yahoo.base_url
        )
    }

    fn quote_url(&self, symbol: &str) -> String {
        format!("{}/v7/finance/quote?symbols={symbol}", self.config.yahoo.base_url)
    }

    fn fundamentals_url(&self, symbol: &str) -> String {
        format!(
            "{}/v10/finance/quoteSummary/{symbol}?modules=incomeStatementHistory,balanceSheetHistory,cashflowStatementHistory",
            self.config.yahoo.base_url
        )
    }

    fn scrape_url(&self, symbol: &str, endpoint: ScrapeEndpoint) -> String {
        format!("{SCRAPE_BASE_URL}/quote/{symbol}/{}", endpoint.path_segment())
    }

    fn key_statistics_api_url(&self, symbol: &str) -> String {
        format!(
            "{}/v10/finance/quoteSummary/{symbol}?modules=defaultKeyStatistics,summaryDetail",
            self.config.yahoo.base_url
        )
    }

    /// The key-statistics module is paid-tier restricted on some accounts
    /// (the 401 the fallback example is built around); decoded straight
    /// from `quoteSummary` JSON rather than going through the three-
    /// statement fundamentals decoder.
    async fn fetch_key_statistics_via_api(&self, symbol: &str) -> Result<KeyStatisticsDto, FetchError> {
        let ctx = Ctx::with_timeout(Duration::from_millis(self.config.yahoo.timeout_ms * 2));
        let url = self.key_statistics_api_url(symbol);
        let request = FetchRequest::get(url, "key-statistics");
        let response = self.engine.do_request(ctx, &request).await?;
        decode_key_statistics_json(&response.body)
    }

    /// Fetches daily OHLCV bars for `symbol` in `[start_unix, end_unix]`.
    pub async fn fetch_bars(
        &self,
        symbol: &str,
        start_unix: i64,
        end_unix: i64,
        adjusted: bool,
        run_id: &str,
    ) -> Result<NormalizedBarBatch, FetchError> {
        let ctx = Ctx::with_timeout(Duration::from_millis(self.config.yahoo.timeout_ms * 2));
        let url = self.chart_url(symbol, start_unix, end_unix);
        let request = FetchRequest::get(url, "chart");
        let response = self.engine.do_request(ctx, &request).await?;
        let chart = decode_chart(&response.body)?;
        let security = self.venue.build(&chart.symbol, &chart.exchange_name);
        crate::normalize::bars::normalize_bars(
            &chart,
            security,
            adjusted,
            &self.scale_policy,
            run_id,
            &self.producer,
            self.clock.as_ref(),
        )
    }

    pub async fn fetch_quote(&self, symbol: &str, run_id: &str) -> Result<NormalizedQuote, FetchError> {
        let ctx = Ctx::with_timeout(Duration::from_millis(self.config.yahoo.timeout_ms * 2));
        let url = self.quote_url(symbol);
        let request = FetchRequest::get(url, "quote");
        let response = self.engine.do_request(ctx, &request).await?;
        let quote = decode_quote(&response.body)?;
        let security = self.venue.build(&quote.symbol, &quote.exchange);
        normalize_quote(&quote, security, &self.scale_policy, run_id, &self.producer, self.clock.as_ref())
    }

    /// Alias for "fetch market data": the quote surface is the only
    /// real-time market-data artifact the source exposes.
    pub async fn fetch_market_data(&self, symbol: &str, run_id: &str) -> Result<NormalizedQuote, FetchError> {
        self.fetch_quote(symbol, run_id).await
    }

    /// Company *identification* only — symbol, MIC, and currency, sourced
    /// from the JSON quote. Richer profile fields (sector, description,
    /// employee count) are a distinct, explicit call: [`Self::scrape_profile`].
    /// Do not widen this to return scraped fields — `FetchCompanyInfo`
    /// stays limited to identification by design.
    pub async fn fetch_company_info(&self, symbol: &str, _run_id: &str) -> Result<CompanyIdentification, FetchError> {
        let ctx = Ctx::with_timeout(Duration::from_millis(self.config.yahoo.timeout_ms * 2));
        let url = self.quote_url(symbol);
        let request = FetchRequest::get(url, "quote");
        let response = self.engine.do_request(ctx, &request).await?;
        let quote = decode_quote(&response.body)?;
        let security = self.venue.build(&quote.symbol, &quote.exchange);
        Ok(CompanyIdentification {
            security,
            currency_code: if quote.currency.is_empty() { None } else { Some(quote.currency) },
            exchange: if quote.exchange.is_empty() { None } else { Some(quote.exchange) },
        })
    }

    async fn scrape_page(&self, symbol: &str, endpoint: ScrapeEndpoint) -> Result<String, FetchError> {
        let ctx = Ctx::with_timeout(Duration::from_millis(self.config.yahoo.timeout_ms * 2));
        let url = self.scrape_url(symbol, endpoint);
        let request = FetchRequest::get(url, endpoint.path_segment()).scrape();
        let response = self.engine.do_request(ctx, &request).await?;
        Ok(response.body)
    }

    pub async fn scrape_profile(&self, symbol: &str) -> Result<ProfileDto, FetchError> {
        let html = self.scrape_page(symbol, ScrapeEndpoint::Profile).await?;
        match self.extractor.extract(ScrapeEndpoint::Profile, &html, SCRAPE_BASE_URL)? {
            EndpointDto::Profile(dto) => Ok(dto),
            _ => unreachable!("extract(Profile) always returns EndpointDto::Profile"),
        }
    }

    /// The richer profile (sector, industry, description, ...) that
    /// `fetch_company_info` deliberately withholds: scrapes and normalizes
    /// the profile page explicitly.
    pub async fn fetch_profile(&self, symbol: &str, run_id: &str) -> Result<NormalizedProfile, FetchError> {
        let dto = self.scrape_profile(symbol).await?;
        let security = Security { symbol: symbol.to_string(), mic: String::new() };
        normalize_profile(&dto, security, run_id, &self.producer, self.clock.as_ref())
    }

    pub async fn scrape_key_statistics(&self, symbol: &str) -> Result<KeyStatisticsDto, FetchError> {
        let html = self.scrape_page(symbol, ScrapeEndpoint::KeyStatistics).await?;
        match self.extractor.extract(ScrapeEndpoint::KeyStatistics, &html, SCRAPE_BASE_URL)? {
            EndpointDto::KeyStatistics(dto) => Ok(dto),
            _ => unreachable!(),
        }
    }

    /// Key statistics, trying the JSON API first and falling back to the
    /// scrape path on `auth_error`/`not_supported`/`decode_error` per the
    /// fallback coordinator's `auto` strategy.
    pub async fn key_statistics(
        &self,
        symbol: &str,
    ) -> Result<(KeyStatisticsDto, crate::fallback::SourceKind, Option<crate::fallback::FallbackDecision>), FetchError>
    {
        self.fallback
            .run("key-statistics", self.fetch_key_statistics_via_api(symbol), self.scrape_key_statistics(symbol))
            .await
    }

    pub async fn scrape_financials(&self, symbol: &str) -> Result<StatementTableDto, FetchError> {
        let html = self.scrape_page(symbol, ScrapeEndpoint::Financials).await?;
        match self.extractor.extract(ScrapeEndpoint::Financials, &html, SCRAPE_BASE_URL)? {
            EndpointDto::Financials(dto) => Ok(dto),
            _ => unreachable!(),
        }
    }

    pub async fn scrape_balance_sheet(&self, symbol: &str) -> Result<StatementTableDto, FetchError> {
        let html = self.scrape_page(symbol, ScrapeEndpoint::BalanceSheet).await?;
        match self.extractor.extract(ScrapeEndpoint::BalanceSheet, &html, SCRAPE_BASE_URL)? {
            EndpointDto::BalanceSheet(dto) => Ok(dto),
            _ => unreachable!(),
        }
    }

    pub async fn scrape_cash_flow(&self, symbol: &str) -> Result<StatementTableDto, FetchError> {
        let html = self.scrape_page(symbol, ScrapeEndpoint::CashFlow).await?;
        match self.extractor.extract(ScrapeEndpoint::CashFlow, &html, SCRAPE_BASE_URL)? {
            EndpointDto::CashFlow(dto) => Ok(dto),
            _ => unreachable!(),
        }
    }

    pub async fn scrape_analysis(&self, symbol: &str) -> Result<AnalysisDto, FetchError> {
        let html = self.scrape_page(symbol, ScrapeEndpoint::Analysis).await?;
        match self.extractor.extract(ScrapeEndpoint::Analysis, &html, SCRAPE_BASE_URL)? {
            EndpointDto::Analysis(dto) => Ok(dto),
            _ => unreachable!(),
        }
    }

    pub async fn scrape_analyst_insights(&self, symbol: &str) -> Result<AnalystInsightsDto, FetchError> {
        let html = self.scrape_page(symbol, ScrapeEndpoint::AnalystInsights).await?;
        match self.extractor.extract(ScrapeEndpoint::AnalystInsights, &html, SCRAPE_BASE_URL)? {
            EndpointDto::AnalystInsights(dto) => Ok(dto),
            _ => unreachable!(),
        }
    }

    pub async fn scrape_news(&self, symbol: &str, run_id: &str) -> Result<Vec<NewsItem>, FetchError> {
        let html = self.scrape_page(symbol, ScrapeEndpoint::News).await?;
        match self.extractor.extract(ScrapeEndpoint::News, &html, SCRAPE_BASE_URL)? {
            EndpointDto::News(items) => Ok(normalize_news(items, run_id, &self.producer)),
            _ => unreachable!(),
        }
    }

    async fn fetch_fundamentals_via_api(
        &self,
        symbol: &str,
        run_id: &str,
    ) -> Result<NormalizedFundamentalsSnapshot, FetchError> {
        let ctx = Ctx::with_timeout(Duration::from_millis(self.config.yahoo.timeout_ms * 2));
        let url = self.fundamentals_url(symbol);
        let request = FetchRequest::get(url, "fundamentals");
        let response = self.engine.do_request(ctx, &request).await?;
        let raw = decode_fundamentals(&response.body)?;
        let security = Security { symbol: symbol.to_string(), mic: String::new() };
        Ok(normalize_fundamentals(&raw, security, "USD", "yahoo-finance-web", run_id, &self.producer, self.clock.as_ref()))
    }

    /// "Fetch all fundamentals" convenience: pulls the JSON fundamentals
    /// statement plus every scrape-backed fundamentals-style endpoint,
    /// returning per-endpoint outcomes rather than failing the whole call
    /// when one endpoint errors.
    pub async fn fetch_all_fundamentals(&self, symbol: &str, run_id: &str) -> Vec<FundamentalsOutcome> {
        vec![
            FundamentalsOutcome::Fundamentals(self.fetch_fundamentals_via_api(symbol, run_id).await),
            FundamentalsOutcome::KeyStatistics(self.key_statistics(symbol).await.map(|(dto, _, _)| dto)),
            FundamentalsOutcome::Financials(self.scrape_financials(symbol).await),
            FundamentalsOutcome::BalanceSheet(self.scrape_balance_sheet(symbol).await),
            FundamentalsOutcome::CashFlow(self.scrape_cash_flow(symbol).await),
            FundamentalsOutcome::Analysis(self.scrape_analysis(symbol).await),
            FundamentalsOutcome::AnalystInsights(self.scrape_analyst_insights(symbol).await),
        ]
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Pulls the key-statistics fields out of a `quoteSummary` JSON response.
/// Tolerates the module being entirely absent (treated as `decode_error`,
/// which the fallback coordinator treats as fall-back-eligible).
fn decode_key_statistics_json(body: &str) -> Result<KeyStatisticsDto, FetchError> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        FetchError::new(crate::error::ErrorKind::DecodeError, format!("key-statistics JSON decode failed: {e}"))
    })?;
    let result = value
        .pointer("/quoteSummary/result/0")
        .ok_or_else(|| FetchError::new(crate::error::ErrorKind::DecodeError, "quoteSummary.result[0] missing"))?;

    let raw_f64 = |path: &str| -> Option<f64> { result.pointer(path).and_then(|v| v.as_f64()) };

    let dto = KeyStatisticsDto {
        market_cap: raw_f64("/summaryDetail/marketCap/raw"),
        pe_ratio: raw_f64("/summaryDetail/trailingPE/raw"),
        eps: raw_f64("/defaultKeyStatistics/trailingEps/raw"),
        dividend_yield: raw_f64("/summaryDetail/dividendYield/raw"),
        beta: raw_f64("/defaultKeyStatistics/beta/raw"),
        fifty_two_week_high: raw_f64("/summaryDetail/fiftyTwoWeekHigh/raw"),
        fifty_two_week_low: raw_f64("/summaryDetail/fiftyTwoWeekLow/raw"),
    };
    if dto.market_cap.is_none() && dto.pe_ratio.is_none() && dto.eps.is_none() {
        return Err(FetchError::new(crate::error::ErrorKind::DecodeError, "no key-statistics fields present"));
    }
    Ok(dto)
}
