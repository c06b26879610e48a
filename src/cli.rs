//! CLI definition and dispatch.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::adapters::alpaca_adapter::AlpacaAdapter;
use crate::adapters::alpha_vantage_adapter::AlphaVantageAdapter;
use crate::adapters::console;
use crate::adapters::credentials::Credentials;
use crate::adapters::csv_adapter::{CsvPriceAdapter, NoFundamentals};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::html_report_adapter::HtmlReportAdapter;
use crate::adapters::market_cache::MarketCache;
use crate::adapters::openai_adapter::OpenAiAdapter;
use crate::adapters::sec_ticker_adapter::SecTickerAdapter;
use crate::adapters::slack_adapter::{LogNotifier, SlackAdapter};
use crate::adapters::supabase_adapter::SupabaseAdapter;
use crate::domain::analyst::Analyst;
use crate::domain::backtest::{self as backtest_engine, Backtester};
use crate::domain::error::HedgeError;
use crate::domain::execution::{self, SizingMode};
use crate::domain::portfolio::Portfolio;
use crate::domain::price::parse_date;
use crate::domain::records::recent_tickers;
use crate::domain::settings::{Settings, StoreBackend};
use crate::domain::ticker::{TickerExtractor, parse_tickers, select_scan_tickers};
use crate::domain::workflow::{HedgeFund, resolve_dates};
use crate::logging::init_cli_logger;
use crate::ports::broker_port::BrokerPort;
use crate::ports::fundamentals_port::FundamentalsSource;
use crate::ports::llm_port::LlmPort;
use crate::ports::notifier_port::Notifier;
use crate::ports::price_port::PriceSource;
use crate::ports::record_store_port::RecordStore;
use crate::ports::report_port::ReportPort;
use crate::ports::ticker_directory_port::TickerDirectory;

#[derive(Parser, Debug)]
#[command(name = "hedgebot", version, about = "Multi-agent equity trading bot and backtester")]
pub struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// INI configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Comma-separated ticker symbols
    #[arg(long, required = true)]
    pub tickers: String,
    /// YYYY-MM-DD, defaults to three months before the end date
    #[arg(long, value_parser = parse_date_arg)]
    pub start_date: Option<NaiveDate>,
    /// YYYY-MM-DD, defaults to today
    #[arg(long, value_parser = parse_date_arg)]
    pub end_date: Option<NaiveDate>,
    #[arg(long)]
    pub initial_cash: Option<f64>,
    /// Print each agent's output as JSON
    #[arg(long)]
    pub show_reasoning: bool,
    /// Comma-separated analyst keys, default all
    #[arg(long)]
    pub analysts: Option<String>,
    /// Send orders to the broker
    #[arg(long)]
    pub execute_trades: bool,
    /// Notional per buy order; implies fixed-amount sizing
    #[arg(long)]
    pub trade_amount: Option<f64>,
    #[arg(long)]
    pub leverage: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the analysts and portfolio manager once
    Run(RunArgs),
    /// Replay the fund over past business days
    Backtest {
        #[arg(long, required = true)]
        tickers: String,
        #[arg(long, value_parser = parse_date_arg)]
        start_date: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date_arg)]
        end_date: Option<NaiveDate>,
        #[arg(long)]
        initial_capital: Option<f64>,
        #[arg(long)]
        analysts: Option<String>,
        /// Directory of <TICKER>.csv daily prices for offline runs
        #[arg(long)]
        prices_dir: Option<PathBuf>,
        /// HTML report path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Trade owned and most-mentioned stocks one by one
    Scan,
    /// Recompute each stock's recent mention count
    CountMentions,
    /// Extract tickers from a text file and record the mentions
    RecordMentions {
        #[arg(long)]
        file: PathBuf,
    },
    /// Probe the configured record store
    VerifyDb,
    /// List the selectable analysts
    Analysts,
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).map_err(|e| e.to_string())
}

pub fn run(cli: Cli) -> ExitCode {
    init_cli_logger(cli.verbose);
    let result = load_settings(cli.config.as_ref()).and_then(|settings| match cli.command {
        Command::Run(args) => run_hedge_fund(&settings, &args),
        Command::Backtest {
            tickers,
            start_date,
            end_date,
            initial_capital,
            analysts,
            prices_dir,
            output,
        } => run_backtest(
            &settings,
            &tickers,
            start_date,
            end_date,
            initial_capital,
            analysts.as_deref(),
            prices_dir.as_ref(),
            output.as_ref(),
        ),
        Command::Scan => run_scan(&settings),
        Command::CountMentions => run_count_mentions(&settings),
        Command::RecordMentions { file } => run_record_mentions(&settings, &file),
        Command::VerifyDb => run_verify_db(&settings),
        Command::Analysts => {
            print!("{}", console::render_analysts());
            Ok(())
        }
    });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

pub fn load_settings(path: Option<&PathBuf>) -> Result<Settings, HedgeError> {
    if let Some(p) = path {
        eprintln!("Loading config from {}", p.display());
    }
    let config = FileConfigAdapter::load_optional(path)?;
    Settings::from_config(&config)
}

fn select_analysts(list: Option<&str>) -> Result<Vec<Analyst>, HedgeError> {
    match list {
        Some(l) => Analyst::parse_list(l),
        None => Ok(Analyst::all()),
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn market_data(settings: &Settings, creds: &Credentials) -> Result<AlphaVantageAdapter, HedgeError> {
    AlphaVantageAdapter::new(&settings.endpoints.alpha_vantage_url, creds.alpha_vantage()?.clone())
}

/// The language model when a key is set; without one the rules decide.
fn language_model(settings: &Settings, creds: &Credentials) -> Result<Option<OpenAiAdapter>, HedgeError> {
    match &creds.openai_api_key {
        Some(key) => Ok(Some(OpenAiAdapter::new(
            &settings.endpoints.openai_url,
            &settings.endpoints.openai_model,
            key.clone(),
        )?)),
        None => {
            info!("no language model key set, portfolio decisions use rules");
            Ok(None)
        }
    }
}

fn broker(settings: &Settings, creds: &Credentials) -> Result<AlpacaAdapter, HedgeError> {
    let (key, secret) = creds.alpaca()?;
    AlpacaAdapter::new(
        &settings.endpoints.alpaca_trading_url,
        &settings.endpoints.alpaca_data_url,
        key.clone(),
        secret.clone(),
    )
}

fn record_store(
    settings: &Settings,
    creds: &Credentials,
) -> Result<Option<Box<dyn RecordStore>>, HedgeError> {
    match settings.store.backend {
        StoreBackend::None => Ok(None),
        StoreBackend::Supabase => {
            let (url, key) = creds.supabase()?;
            Ok(Some(Box::new(SupabaseAdapter::new(url, key.clone())?)))
        }
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite => {
            let path = settings
                .store
                .sqlite_path
                .as_deref()
                .ok_or_else(|| HedgeError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;
            let store =
                crate::adapters::sqlite_adapter::SqliteAdapter::new(path, settings.store.pool_size)?;
            store.initialize_schema()?;
            Ok(Some(Box::new(store)))
        }
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite => Err(HedgeError::ConfigInvalid {
            section: "store".into(),
            key: "backend".into(),
            reason: "built without the sqlite feature".into(),
        }),
    }
}

fn require_store(
    settings: &Settings,
    creds: &Credentials,
) -> Result<Box<dyn RecordStore>, HedgeError> {
    record_store(settings, creds)?.ok_or_else(|| HedgeError::ConfigMissing {
        section: "store".into(),
        key: "backend".into(),
    })
}

fn notifier(creds: &Credentials) -> Result<Box<dyn Notifier>, HedgeError> {
    match &creds.slack_webhook_url {
        Some(url) => Ok(Box::new(SlackAdapter::new(url.clone())?)),
        None => Ok(Box::new(LogNotifier)),
    }
}

fn notify(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.notify(message) {
        warn!(error = %e, "notification failed");
    }
}

fn print_reasoning(agent: &str, output: &serde_json::Value) {
    let pretty = serde_json::to_string_pretty(output).unwrap_or_else(|_| output.to_string());
    println!("\n========== {agent} ==========\n{pretty}");
}

/// Wires the fund over the given sources with the configured limits.
fn hedge_fund<'a>(
    settings: &Settings,
    analysts: Vec<Analyst>,
    prices: &'a dyn PriceSource,
    fundamentals: &'a dyn FundamentalsSource,
    llm: Option<&'a dyn LlmPort>,
) -> HedgeFund<'a> {
    HedgeFund {
        llm,
        llm_retries: settings.endpoints.openai_max_retries,
        risk_settings: settings.risk,
        decision_settings: settings.decision,
        ..HedgeFund::new(analysts, prices, fundamentals)
    }
}

fn run_hedge_fund(settings: &Settings, args: &RunArgs) -> Result<(), HedgeError> {
    let tickers = parse_tickers(&args.tickers)?;
    let analysts = select_analysts(args.analysts.as_deref())?;
    let (start, end) = resolve_dates(args.start_date, args.end_date, today(), 3)?;
    let creds = Credentials::from_env();
    let initial_cash = args.initial_cash.unwrap_or(settings.trading.initial_cash);

    let source = market_data(settings, &creds)?;
    let cache = MarketCache::new(&source, &source);
    let llm = language_model(settings, &creds)?;

    let alpaca = if args.execute_trades {
        Some(broker(settings, &creds)?)
    } else {
        None
    };
    let portfolio = match &alpaca {
        Some(b) => execution::initialize_portfolio(b, initial_cash, &tickers),
        None => Portfolio::new(initial_cash, &tickers),
    };

    eprintln!(
        "Running {} analyst(s) on {} from {start} to {end}",
        analysts.len(),
        tickers.join(", ")
    );
    let mut fund = hedge_fund(settings, analysts, &cache, &cache, llm.as_ref().map(|l| l as &dyn LlmPort));
    fund.live_trading = alpaca.is_some();
    if args.show_reasoning {
        fund.reasoning_sink = Some(&print_reasoning);
    }
    let result = fund.run(&tickers, start, end, &portfolio)?;
    print!("{}", console::render_decisions(&result));

    if let Some(b) = &alpaca {
        let mode = match (args.trade_amount, args.leverage) {
            (None, None) => settings.sizing_mode()?,
            (amount, leverage) => SizingMode::FixedAmount {
                amount: amount.unwrap_or(settings.trading.trade_amount),
                leverage: leverage.unwrap_or(settings.trading.leverage),
            },
        };
        eprintln!("\nExecuting trades through the broker...");
        let outcomes = execution::execute_decisions(b, &result.decisions, &mode);
        print!("{}", console::render_execution(&outcomes));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_backtest(
    settings: &Settings,
    tickers: &str,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    initial_capital: Option<f64>,
    analysts: Option<&str>,
    prices_dir: Option<&PathBuf>,
    output: Option<&PathBuf>,
) -> Result<(), HedgeError> {
    let tickers = parse_tickers(tickers)?;
    let analysts = select_analysts(analysts)?;
    let (start, end) = resolve_dates(start_date, end_date, today(), 12)?;
    let mut config = settings.backtest_config(tickers.clone(), start, end);
    if let Some(capital) = initial_capital {
        config.initial_capital = capital;
    }
    config.validate()?;

    let creds = Credentials::from_env();
    let csv = prices_dir.map(CsvPriceAdapter::new);
    let remote = match (&csv, creds.alpha_vantage_api_key.is_some()) {
        (Some(_), false) => {
            warn!("no market data key set, fundamentals are empty and analysts stay neutral");
            None
        }
        _ => Some(market_data(settings, &creds)?),
    };
    if let Some(c) = &csv {
        let available = c.available_tickers()?;
        for t in tickers.iter().filter(|t| !available.contains(t)) {
            warn!(ticker = %t, "no price file for ticker");
        }
    }

    let offline = NoFundamentals;
    let price_source: &dyn PriceSource = match (&csv, &remote) {
        (Some(c), _) => c,
        (None, Some(r)) => r,
        (None, None) => return Err(HedgeError::invalid_input("no price source configured")),
    };
    let fundamentals_source: &dyn FundamentalsSource = match &remote {
        Some(r) => r,
        None => &offline,
    };
    let cache = MarketCache::new(price_source, fundamentals_source);
    let llm = language_model(settings, &creds)?;
    let store = record_store(settings, &creds)?;

    eprintln!("Prefetching data for {} ticker(s)...", tickers.len());
    backtest_engine::prefetch(&cache, &cache, &config);

    let fund = hedge_fund(settings, analysts, &cache, &cache, llm.as_ref().map(|l| l as &dyn LlmPort));
    let mut backtester = Backtester::new(config, &fund, &cache);
    if let Some(s) = &store {
        backtester = backtester.with_store(s.as_ref());
    }

    eprintln!("Running backtest: {} from {start} to {end}", tickers.join(", "));
    let result = backtester.run(|day| print!("{}", console::render_backtest_day(day)))?;
    print!("{}", console::render_summary(&result.summary));

    if let Some(path) = output {
        HtmlReportAdapter::new().write(&result, &path.display().to_string())?;
        eprintln!("\nReport written to: {}", path.display());
    }
    Ok(())
}

/// Most-mentioned tickers whose last mention is within `recent_days` of `now`.
pub fn hot_scan_candidates(
    store: &dyn RecordStore,
    limit: usize,
    now: DateTime<Utc>,
    recent_days: i64,
) -> Result<Vec<String>, HedgeError> {
    let recent = recent_tickers(&store.stocks()?, now, recent_days);
    let hot = store.hot_stocks(limit)?;
    let stale = hot.iter().filter(|t| !recent.contains(t)).count();
    if stale > 0 {
        info!(stale, recent_days, "dropping hot tickers with no recent mention");
    }
    Ok(hot.into_iter().filter(|t| recent.contains(t)).collect())
}

fn run_scan(settings: &Settings) -> Result<(), HedgeError> {
    let creds = Credentials::from_env();
    let alpaca = broker(settings, &creds)?;
    let source = market_data(settings, &creds)?;
    let cache = MarketCache::new(&source, &source);
    let llm = language_model(settings, &creds)?;
    let notifier = notifier(&creds)?;
    let directory = SecTickerAdapter::new(
        &settings.endpoints.sec_tickers_url,
        &settings.endpoints.sec_fallback_path,
    )?;
    let known = directory.companies()?;

    let owned: Vec<String> = match alpaca.positions() {
        Ok(positions) => positions.into_iter().map(|p| p.symbol).collect(),
        Err(e) => {
            warn!(error = %e, "could not read broker positions");
            Vec::new()
        }
    };
    let hot = match record_store(settings, &creds)? {
        Some(store) => hot_scan_candidates(
            store.as_ref(),
            settings.scan.hot_limit,
            Utc::now(),
            settings.mentions.recent_days,
        )?,
        None => {
            warn!("no record store configured, scanning owned positions only");
            Vec::new()
        }
    };
    let tickers = select_scan_tickers(&owned, &hot, settings.scan.max_tickers);
    eprintln!(
        "Scanning {} ticker(s): {} owned, {} hot",
        tickers.len(),
        owned.len(),
        hot.len()
    );
    notify(
        notifier.as_ref(),
        &format!(":bar_chart: Starting hedge fund bot for {} tickers", tickers.len()),
    );

    let mode = SizingMode::FixedAmount {
        amount: settings.scan.trade_amount,
        leverage: settings.scan.leverage,
    };
    let mut fund = hedge_fund(settings, Analyst::all(), &cache, &cache, llm.as_ref().map(|l| l as &dyn LlmPort));
    fund.live_trading = true;
    let (start, end) = resolve_dates(None, None, today(), 3)?;

    let mut succeeded = Vec::new();
    let mut failed: Vec<(String, String)> = Vec::new();
    for ticker in &tickers {
        if !known.contains_key(ticker) {
            warn!(ticker = %ticker, "not in the SEC ticker list, skipping");
            continue;
        }
        info!(ticker = %ticker, "processing");
        let one = std::slice::from_ref(ticker);
        let portfolio = execution::initialize_portfolio(&alpaca, settings.trading.initial_cash, one);
        match fund.run(one, start, end, &portfolio) {
            Ok(result) => {
                print!("{}", console::render_decisions(&result));
                let outcomes = execution::execute_decisions(&alpaca, &result.decisions, &mode);
                print!("{}", console::render_execution(&outcomes));
                succeeded.push(ticker.clone());
                thread::sleep(Duration::from_millis(settings.scan.delay_ms));
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "ticker failed");
                failed.push((ticker.clone(), e.to_string()));
                thread::sleep(Duration::from_millis(settings.scan.error_delay_ms));
            }
        }
    }

    let failures: Vec<String> = failed.iter().map(|(t, e)| format!("{t}: {e}")).collect();
    notify(
        notifier.as_ref(),
        &format!(
            ":bar_chart: Hedge fund bot finished processing {} tickers: {} and encountered errors with {} tickers: {}",
            succeeded.len(),
            succeeded.join(", "),
            failed.len(),
            failures.join(", ")
        ),
    );
    Ok(())
}

fn run_count_mentions(settings: &Settings) -> Result<(), HedgeError> {
    let creds = Credentials::from_env();
    let store = require_store(settings, &creds)?;
    let stocks = store.recount_mentions(Utc::now(), settings.mentions.window_days)?;
    let mut counts: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
    for s in &stocks {
        counts.entry(s.mention_count_7d).or_default().push(&s.ticker);
    }
    for (count, tickers) in counts.iter().rev().filter(|(c, _)| **c > 0) {
        println!("{count:>5}  {}", tickers.join(", "));
    }
    eprintln!("Counted mentions for {} stock(s)", stocks.len());
    notify(notifier(&creds)?.as_ref(), ":man-cartwheeling: hot stocks counted successfully");
    Ok(())
}

/// Records every known ticker found in `text` at `at`; returns the tickers recorded.
pub fn record_mentions_in_text(
    store: &dyn RecordStore,
    directory: &dyn TickerDirectory,
    text: &str,
    at: DateTime<Utc>,
    window_days: i64,
) -> Result<Vec<String>, HedgeError> {
    let companies = directory.companies()?;
    let extractor = TickerExtractor::new(companies.keys().cloned())?;
    let found = extractor.find(text);
    for ticker in &found {
        let name = companies.get(ticker).map(String::as_str).unwrap_or("Unknown");
        store.record_mention(ticker, name, at, window_days)?;
    }
    Ok(found)
}

fn run_record_mentions(settings: &Settings, file: &PathBuf) -> Result<(), HedgeError> {
    let text = fs::read_to_string(file)?;
    let creds = Credentials::from_env();
    let store = require_store(settings, &creds)?;
    let directory = SecTickerAdapter::new(
        &settings.endpoints.sec_tickers_url,
        &settings.endpoints.sec_fallback_path,
    )?;
    let found = record_mentions_in_text(
        store.as_ref(),
        &directory,
        &text,
        Utc::now(),
        settings.mentions.window_days,
    )?;
    println!("Recorded {} mention(s): {}", found.len(), found.join(", "));
    Ok(())
}

fn run_verify_db(settings: &Settings) -> Result<(), HedgeError> {
    let creds = Credentials::from_env();
    eprintln!("Credentials:");
    eprint!("{}", console::render_credentials(&creds.status()));
    let store = require_store(settings, &creds)?;
    store.verify()?;
    println!("Database tables verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_command_parses_flags() {
        let cli = Cli::try_parse_from([
            "hedgebot",
            "run",
            "--tickers",
            "AAPL,MSFT",
            "--start-date",
            "2024-01-01",
            "--show-reasoning",
            "--execute-trades",
            "--trade-amount",
            "2000",
            "--leverage",
            "1",
        ])
        .unwrap();
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.tickers, "AAPL,MSFT");
                assert_eq!(args.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
                assert!(args.show_reasoning);
                assert!(args.execute_trades);
                assert_eq!(args.trade_amount, Some(2000.0));
                assert_eq!(args.leverage, Some(1.0));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn invalid_date_is_rejected() {
        let parsed = Cli::try_parse_from(["hedgebot", "run", "--tickers", "AAPL", "--end-date", "2024/01/31"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn run_requires_tickers() {
        assert!(Cli::try_parse_from(["hedgebot", "run"]).is_err());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "hedgebot",
            "backtest",
            "--tickers",
            "AAPL",
            "--prices-dir",
            "data/prices",
            "-o",
            "out/report.html",
            "--config",
            "hedgebot.ini",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("hedgebot.ini")));
        assert!(matches!(cli.command, Command::Backtest { prices_dir: Some(_), .. }));
    }

    #[test]
    fn missing_config_file_fails_to_load() {
        let err = load_settings(Some(&PathBuf::from("/nonexistent/hedgebot.ini"))).unwrap_err();
        assert_eq!(ExitCode::from(&err), ExitCode::from(2));
    }
}
