//! Day-by-day replay of the fund over historical prices.
//!
//! Each business day the engine sees the trailing lookback window, its
//! decisions are filled at that window's latest close, and the portfolio is
//! marked to market.

use chrono::{Duration, Months, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::decision::{Action, TradingDecision};
use super::error::HedgeError;
use super::metrics::{EquityPoint, PerformanceSummary, RollingMetrics};
use super::portfolio::Portfolio;
use super::price::{business_days, latest_close};
use super::records::{AnalystSignalRecord, BacktestRecord};
use super::signal::{AnalystSignals, SignalCounts};
use super::workflow::DecisionEngine;
use crate::ports::fundamentals_port::FundamentalsSource;
use crate::ports::price_port::PriceSource;
use crate::ports::record_store_port::RecordStore;

const PREFETCH_LIMIT: usize = 1000;
const PREFETCH_METRIC_PERIODS: usize = 10;
pub const MAX_LOOKBACK_DAYS: i64 = 3650;
pub const MAX_PREFETCH_YEARS: u32 = 50;

/// `days` calendar days before `day`, if representable.
fn window_start(day: NaiveDate, days: i64) -> Option<NaiveDate> {
    Duration::try_days(days).and_then(|d| day.checked_sub_signed(d))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub tickers: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    /// Calendar days of history the engine sees each day.
    pub lookback_days: i64,
    /// Years of prices warmed before the run.
    pub prefetch_years: u32,
    pub risk_free_rate: f64,
}

impl BacktestConfig {
    pub fn new(tickers: Vec<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        BacktestConfig {
            tickers,
            start_date,
            end_date,
            initial_capital: 100_000.0,
            lookback_days: 30,
            prefetch_years: 1,
            risk_free_rate: 0.0434,
        }
    }

    pub fn validate(&self) -> Result<(), HedgeError> {
        if self.tickers.is_empty() {
            return Err(HedgeError::invalid_input("backtest needs at least one ticker"));
        }
        if self.start_date > self.end_date {
            return Err(HedgeError::invalid_input(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        if self.initial_capital.is_nan() || self.initial_capital <= 0.0 {
            return Err(HedgeError::invalid_input(format!(
                "initial capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if !(0..=MAX_LOOKBACK_DAYS).contains(&self.lookback_days) {
            return Err(HedgeError::invalid_input(format!(
                "lookback days must be between 0 and {MAX_LOOKBACK_DAYS}, got {}",
                self.lookback_days
            )));
        }
        if self.prefetch_years > MAX_PREFETCH_YEARS {
            return Err(HedgeError::invalid_input(format!(
                "prefetch years must be at most {MAX_PREFETCH_YEARS}, got {}",
                self.prefetch_years
            )));
        }
        Ok(())
    }
}

/// One ticker's trade on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestRow {
    pub date: NaiveDate,
    pub ticker: String,
    pub action: Action,
    /// Shares actually filled.
    pub quantity: i64,
    pub price: f64,
    pub shares_owned: i64,
    pub position_value: f64,
    pub counts: SignalCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub date: NaiveDate,
    pub total_value: f64,
    /// Percent, counting realized gains on top of the marked value.
    pub return_pct: f64,
    pub cash_balance: f64,
    pub total_position_value: f64,
    pub metrics: RollingMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayResult {
    pub rows: Vec<BacktestRow>,
    pub summary: SummaryRow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub tickers: Vec<String>,
    pub days: Vec<DayResult>,
    pub equity_curve: Vec<EquityPoint>,
    pub portfolio: Portfolio,
    pub summary: PerformanceSummary,
}

/// Warms a caching source for the whole run. Failures are logged and skipped.
pub fn prefetch(
    prices: &dyn PriceSource,
    fundamentals: &dyn FundamentalsSource,
    config: &BacktestConfig,
) {
    let history_start = config
        .prefetch_years
        .checked_mul(12)
        .and_then(|m| config.end_date.checked_sub_months(Months::new(m)))
        .unwrap_or(config.start_date);
    let lookback_start =
        window_start(config.start_date, config.lookback_days).unwrap_or(config.start_date);
    let price_start = history_start.min(lookback_start);

    for ticker in &config.tickers {
        info!(ticker = %ticker, "prefetching data");
        if let Err(e) = prices.prices(ticker, price_start, config.end_date) {
            warn!(ticker = %ticker, error = %e, "price prefetch failed");
        }
        if let Err(e) =
            fundamentals.financial_metrics(ticker, config.end_date, PREFETCH_METRIC_PERIODS)
        {
            warn!(ticker = %ticker, error = %e, "metrics prefetch failed");
        }
        if let Err(e) = fundamentals.line_items(ticker, config.end_date, PREFETCH_METRIC_PERIODS) {
            warn!(ticker = %ticker, error = %e, "line item prefetch failed");
        }
        if let Err(e) = fundamentals.market_cap(ticker, config.end_date) {
            warn!(ticker = %ticker, error = %e, "market cap prefetch failed");
        }
        if let Err(e) = fundamentals.insider_trades(
            ticker,
            Some(config.start_date),
            config.end_date,
            PREFETCH_LIMIT,
        ) {
            warn!(ticker = %ticker, error = %e, "insider trade prefetch failed");
        }
        if let Err(e) = fundamentals.company_news(
            ticker,
            Some(config.start_date),
            config.end_date,
            PREFETCH_LIMIT,
        ) {
            warn!(ticker = %ticker, error = %e, "news prefetch failed");
        }
    }
}

pub struct Backtester<'a> {
    pub config: BacktestConfig,
    pub engine: &'a dyn DecisionEngine,
    pub prices: &'a dyn PriceSource,
    pub store: Option<&'a dyn RecordStore>,
}

impl<'a> Backtester<'a> {
    pub fn new(
        config: BacktestConfig,
        engine: &'a dyn DecisionEngine,
        prices: &'a dyn PriceSource,
    ) -> Self {
        Backtester {
            config,
            engine,
            prices,
            store: None,
        }
    }

    pub fn with_store(mut self, store: &'a dyn RecordStore) -> Self {
        self.store = Some(store);
        self
    }

    fn price_on(&self, ticker: &str, start: NaiveDate, day: NaiveDate) -> Option<f64> {
        match self.prices.prices(ticker, start, day) {
            Ok(bars) => latest_close(&bars),
            Err(e) => {
                warn!(ticker, date = %day, error = %e, "price lookup failed");
                None
            }
        }
    }

    /// Replays every business day, calling `on_day` after each one.
    pub fn run(&self, mut on_day: impl FnMut(&DayResult)) -> Result<BacktestResult, HedgeError> {
        self.config.validate()?;
        let cfg = &self.config;
        let mut portfolio = Portfolio::new(cfg.initial_capital, &cfg.tickers);
        let mut last_prices: HashMap<String, f64> = HashMap::new();
        let mut equity_curve = vec![EquityPoint {
            date: cfg.start_date,
            value: cfg.initial_capital,
        }];
        let mut days = Vec::new();

        info!(
            tickers = cfg.tickers.len(),
            start = %cfg.start_date,
            end = %cfg.end_date,
            "starting backtest"
        );

        for day in business_days(cfg.start_date, cfg.end_date) {
            let lookback_start = window_start(day, cfg.lookback_days).ok_or_else(|| {
                HedgeError::invalid_input(format!(
                    "lookback of {} days before {day} is out of range",
                    cfg.lookback_days
                ))
            })?;
            let outcome = self
                .engine
                .decide(&cfg.tickers, lookback_start, day, &portfolio)?;

            let mut rows = Vec::new();
            for ticker in &cfg.tickers {
                let Some(price) = self.price_on(ticker, lookback_start, day) else {
                    debug!(ticker = %ticker, date = %day, "no price in window, skipping");
                    continue;
                };
                last_prices.insert(ticker.clone(), price);

                let decision = outcome
                    .decisions
                    .get(ticker)
                    .cloned()
                    .unwrap_or_else(|| TradingDecision::hold("no decision"));
                let filled =
                    portfolio.execute_trade(ticker, decision.action, decision.quantity, price);
                let shares_owned = portfolio.shares(ticker);
                rows.push(BacktestRow {
                    date: day,
                    ticker: ticker.clone(),
                    action: decision.action,
                    quantity: filled,
                    price,
                    shares_owned,
                    position_value: shares_owned as f64 * price,
                    counts: SignalCounts::for_ticker(&outcome.analyst_signals, ticker),
                });
            }

            let total_position_value = portfolio.position_value(&last_prices);
            let total_value = portfolio.cash + total_position_value;
            let realized = portfolio.total_realized_gains();
            let return_pct = ((total_value + realized) / cfg.initial_capital - 1.0) * 100.0;

            equity_curve.push(EquityPoint {
                date: day,
                value: total_value,
            });
            let summary = SummaryRow {
                date: day,
                total_value,
                return_pct,
                cash_balance: portfolio.cash,
                total_position_value,
                metrics: RollingMetrics::compute(&equity_curve, cfg.risk_free_rate),
            };
            let result = DayResult { rows, summary };

            if let Some(store) = self.store {
                persist_day(store, &result, &outcome.analyst_signals);
            }
            on_day(&result);
            days.push(result);
        }

        let summary = PerformanceSummary::compute(
            &equity_curve,
            portfolio.total_realized_gains(),
            cfg.initial_capital,
            cfg.risk_free_rate,
        );
        info!(
            days = days.len(),
            final_value = summary.final_value,
            total_return_pct = summary.total_return_pct,
            "backtest complete"
        );

        Ok(BacktestResult {
            tickers: cfg.tickers.clone(),
            days,
            equity_curve,
            portfolio,
            summary,
        })
    }
}

fn persist_day(store: &dyn RecordStore, day: &DayResult, signals: &AnalystSignals) {
    let s = &day.summary;
    for row in &day.rows {
        let record = BacktestRecord {
            date: row.date,
            ticker: row.ticker.clone(),
            action: row.action.as_str().to_string(),
            quantity: row.quantity,
            price: row.price,
            shares_owned: row.shares_owned,
            position_value: row.position_value,
            bullish_count: row.counts.bullish,
            bearish_count: row.counts.bearish,
            neutral_count: row.counts.neutral,
            total_value: s.total_value,
            return_pct: s.return_pct,
            cash_balance: s.cash_balance,
            total_position_value: s.total_position_value,
        };
        if let Err(e) = store.store_backtest_record(&record) {
            warn!(ticker = %row.ticker, date = %row.date, error = %e, "failed to store backtest record");
        }
    }

    let records: Vec<AnalystSignalRecord> = signals
        .iter()
        .flat_map(|(agent, by_ticker)| {
            by_ticker.iter().map(move |(ticker, sig)| AnalystSignalRecord {
                date: s.date,
                ticker: ticker.clone(),
                analyst: agent.clone(),
                signal: sig.signal.as_str().to_string(),
                confidence: sig.confidence,
            })
        })
        .collect();
    if !records.is_empty() {
        if let Err(e) = store.store_analyst_signals(&records) {
            warn!(date = %s.date, error = %e, "failed to store analyst signals");
        }
    }
}
