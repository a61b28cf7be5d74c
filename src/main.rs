//! CLI entry point: subcommands `pull`, `quote`, `fundamentals`, `scrape`,
//! `soak`, `config`, `version` over a thin binary wrapping a library
//! (`anyhow::Result` at the top, structured errors underneath).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketfetch::client::MarketDataClient;
use marketfetch::config::Config;
use marketfetch::error::ErrorKind;
use marketfetch::html::ScrapeEndpoint;

#[derive(Parser)]
#[command(name = "marketfetch", version, about = "Resilient market-data acquisition client")]
struct Cli {
    /// Path to a TOML config file; falls back to built-in defaults.
    #[arg(long, global = true, env = "MARKETFETCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull daily OHLCV bars for a symbol.
    Pull {
        symbol: String,
        #[arg(long)]
        start: i64,
        #[arg(long)]
        end: i64,
        #[arg(long, default_value_t = false)]
        adjusted: bool,
        #[arg(long, default_value = "cli")]
        run_id: String,
    },
    /// Fetch a real-time quote.
    Quote {
        symbol: String,
        #[arg(long, default_value = "cli")]
        run_id: String,
    },
    /// Fetch all fundamentals endpoints, preserving partial success.
    Fundamentals {
        symbol: String,
        #[arg(long, default_value = "cli")]
        run_id: String,
    },
    /// Scrape a single HTML endpoint.
    Scrape {
        symbol: String,
        #[arg(value_enum)]
        endpoint: ScrapeEndpointArg,
        #[arg(long, default_value = "cli")]
        run_id: String,
    },
    /// Long-lived loop issuing requests at a fixed cadence, for endurance
    /// testing the rate limiter / breaker / session pool.
    Soak {
        symbol: String,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
        #[arg(long, default_value_t = 0)]
        iterations: u64,
    },
    /// Print the effective, validated configuration as JSON.
    Config,
    /// Print the binary's version.
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScrapeEndpointArg {
    Profile,
    KeyStatistics,
    Financials,
    BalanceSheet,
    CashFlow,
    Analysis,
    AnalystInsights,
    News,
}

impl From<ScrapeEndpointArg> for ScrapeEndpoint {
    fn from(arg: ScrapeEndpointArg) -> Self {
        match arg {
            ScrapeEndpointArg::Profile => ScrapeEndpoint::Profile,
            ScrapeEndpointArg::KeyStatistics => ScrapeEndpoint::KeyStatistics,
            ScrapeEndpointArg::Financials => ScrapeEndpoint::Financials,
            ScrapeEndpointArg::BalanceSheet => ScrapeEndpoint::BalanceSheet,
            ScrapeEndpointArg::CashFlow => ScrapeEndpoint::CashFlow,
            ScrapeEndpointArg::Analysis => ScrapeEndpoint::Analysis,
            ScrapeEndpointArg::AnalystInsights => ScrapeEndpoint::AnalystInsights,
            ScrapeEndpointArg::News => ScrapeEndpoint::News,
        }
    }
}

/// Exit codes: `0` success, `1` general error, `2` paid/unsupported
/// endpoint, `3` config error, `4` publish error.
const EXIT_OK: u8 = 0;
const EXIT_GENERAL: u8 = 1;
const EXIT_UNSUPPORTED: u8 = 2;
const EXIT_CONFIG: u8 = 3;
const EXIT_PUBLISH: u8 = 4;

fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::ConfigError => EXIT_CONFIG,
        ErrorKind::PublishError => EXIT_PUBLISH,
        ErrorKind::NotSupported | ErrorKind::RobotsDenied => EXIT_UNSUPPORTED,
        _ => EXIT_GENERAL,
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(kind = e.kind.as_str(), "failed to load config: {}", e.message);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match run(cli.command, config).await {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(e) => {
            if let Some(fetch_err) = e.downcast_ref::<marketfetch::FetchError>() {
                tracing::error!(kind = fetch_err.kind.as_str(), "{}", fetch_err.message);
                ExitCode::from(exit_code_for(fetch_err.kind))
            } else {
                tracing::error!("{e:#}");
                ExitCode::from(EXIT_GENERAL)
            }
        }
    }
}

async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    match command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config).context("serializing config")?);
            return Ok(());
        }
        Command::Version => {
            println!("marketfetch {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let client = MarketDataClient::new(config).context("building market data client")?;

    match command {
        Command::Pull { symbol, start, end, adjusted, run_id } => {
            let batch = client.fetch_bars(&symbol, start, end, adjusted, &run_id).await?;
            println!("{}", serde_json::to_string_pretty(&batch).context("serializing bar batch")?);
        }
        Command::Quote { symbol, run_id } => {
            let quote = client.fetch_quote(&symbol, &run_id).await?;
            println!("{}", serde_json::to_string_pretty(&quote).context("serializing quote")?);
        }
        Command::Fundamentals { symbol, run_id } => {
            let outcomes = client.fetch_all_fundamentals(&symbol, &run_id).await;
            print_fundamentals_outcomes(&outcomes);
        }
        Command::Scrape { symbol, endpoint, run_id } => {
            scrape_one(&client, &symbol, endpoint.into(), &run_id).await?;
        }
        Command::Soak { symbol, interval_secs, iterations } => {
            run_soak(&client, &symbol, interval_secs, iterations).await;
        }
        Command::Config | Command::Version => unreachable!("handled above"),
    }
    Ok(())
}

fn print_fundamentals_outcomes(outcomes: &[marketfetch::client::FundamentalsOutcome]) {
    use marketfetch::client::FundamentalsOutcome as O;
    for outcome in outcomes {
        match outcome {
            O::Fundamentals(r) => report("fundamentals", r),
            O::KeyStatistics(r) => report("key-statistics", r),
            O::Financials(r) => report("financials", r),
            O::BalanceSheet(r) => report("balance-sheet", r),
            O::CashFlow(r) => report("cash-flow", r),
            O::Analysis(r) => report("analysis", r),
            O::AnalystInsights(r) => report("analyst-insights", r),
        }
    }
}

fn report<T: serde::Serialize>(endpoint: &str, result: &Result<T, marketfetch::FetchError>) {
    match result {
        Ok(value) => match serde_json::to_string(value) {
            Ok(json) => println!("{{\"endpoint\":\"{endpoint}\",\"ok\":true,\"value\":{json}}}"),
            Err(e) => tracing::warn!(endpoint, "failed to serialize outcome: {e}"),
        },
        Err(e) => {
            println!("{{\"endpoint\":\"{endpoint}\",\"ok\":false,\"error\":\"{}\"}}", e.kind.as_str());
            tracing::warn!(endpoint, kind = e.kind.as_str(), "{}", e.message);
        }
    }
}

async fn scrape_one(
    client: &MarketDataClient,
    symbol: &str,
    endpoint: ScrapeEndpoint,
    run_id: &str,
) -> anyhow::Result<()> {
    match endpoint {
        ScrapeEndpoint::Profile => {
            let profile = client.fetch_profile(symbol, run_id).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        ScrapeEndpoint::KeyStatistics => {
            let dto = client.scrape_key_statistics(symbol).await?;
            println!("{}", serde_json::to_string_pretty(&dto)?);
        }
        ScrapeEndpoint::Financials => {
            let dto = client.scrape_financials(symbol).await?;
            println!("{}", serde_json::to_string_pretty(&dto)?);
        }
        ScrapeEndpoint::BalanceSheet => {
            let dto = client.scrape_balance_sheet(symbol).await?;
            println!("{}", serde_json::to_string_pretty(&dto)?);
        }
        ScrapeEndpoint::CashFlow => {
            let dto = client.scrape_cash_flow(symbol).await?;
            println!("{}", serde_json::to_string_pretty(&dto)?);
        }
        ScrapeEndpoint::Analysis => {
            let dto = client.scrape_analysis(symbol).await?;
            println!("{}", serde_json::to_string_pretty(&dto)?);
        }
        ScrapeEndpoint::AnalystInsights => {
            let dto = client.scrape_analyst_insights(symbol).await?;
            println!("{}", serde_json::to_string_pretty(&dto)?);
        }
        ScrapeEndpoint::News => {
            let items = client.scrape_news(symbol, run_id).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }
    Ok(())
}

/// Issues `fetch_quote` at a fixed cadence, logging outcome and never
/// exiting non-zero on a single failed iteration — the point is to watch
/// the rate limiter / breaker / session pool behave over a long run, not
/// to fail fast. `iterations == 0` means run until killed.
async fn run_soak(client: &MarketDataClient, symbol: &str, interval_secs: u64, iterations: u64) {
    let mut tick = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    let mut count: u64 = 0;
    loop {
        tick.tick().await;
        count += 1;
        let run_id = format!("soak-{count}");
        match client.fetch_quote(symbol, &run_id).await {
            Ok(quote) => {
                tracing::info!(iteration = count, symbol = %quote.security.symbol, "soak: quote ok");
            }
            Err(e) => {
                tracing::warn!(iteration = count, kind = e.kind.as_str(), "soak: quote failed: {}", e.message);
            }
        }
        if iterations != 0 && count >= iterations {
            break;
        }
    }
}
