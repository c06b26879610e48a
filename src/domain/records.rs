//! Persisted record shapes and the logic that reads them back.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::portfolio::{Holding, Portfolio};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRecord {
    pub date: NaiveDate,
    pub ticker: String,
    pub action: String,
    pub quantity: i64,
    pub price: f64,
    pub shares_owned: i64,
    pub position_value: f64,
    pub bullish_count: u32,
    pub bearish_count: u32,
    pub neutral_count: u32,
    pub total_value: f64,
    pub return_pct: f64,
    pub cash_balance: f64,
    pub total_position_value: f64,
}

impl BacktestRecord {
    /// Throwaway record used to check that the table accepts writes.
    pub fn probe(tag: &str) -> Self {
        BacktestRecord {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            ticker: tag.to_string(),
            action: tag.to_string(),
            quantity: 0,
            price: 0.0,
            shares_owned: 0,
            position_value: 0.0,
            bullish_count: 0,
            bearish_count: 0,
            neutral_count: 0,
            total_value: 0.0,
            return_pct: 0.0,
            cash_balance: 0.0,
            total_position_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystSignalRecord {
    pub date: NaiveDate,
    pub ticker: String,
    pub analyst: String,
    pub signal: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub ticker: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_mentioned: Option<DateTime<Utc>>,
    pub mention_count_7d: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMention {
    pub ticker: String,
    pub mentioned_at: DateTime<Utc>,
}

/// Rebuilds a portfolio from the latest stored backtest row.
///
/// Only the latest row's ticker is restored; its cost basis is shares times the
/// recorded price and realized gains start from zero.
pub fn reconstruct_portfolio(records: &[BacktestRecord]) -> Option<Portfolio> {
    let latest = records.iter().max_by_key(|r| r.date)?;
    let cost_basis = if latest.shares_owned > 0 {
        latest.shares_owned as f64 * latest.price
    } else {
        0.0
    };
    let mut holdings = HashMap::new();
    holdings.insert(
        latest.ticker.clone(),
        Holding {
            shares: latest.shares_owned,
            cost_basis,
            realized_gains: 0.0,
        },
    );
    Some(Portfolio {
        cash: latest.cash_balance,
        buying_power: latest.cash_balance,
        holdings,
    })
}

/// Tickers mentioned within the last `days` days, in input order.
pub fn recent_tickers(stocks: &[StockRecord], now: DateTime<Utc>, days: i64) -> Vec<String> {
    let cutoff = now - Duration::days(days);
    stocks
        .iter()
        .filter(|s| s.last_mentioned.is_some_and(|at| at >= cutoff))
        .map(|s| s.ticker.clone())
        .collect()
}

/// Most-mentioned tickers first; ties keep input order.
pub fn hot_tickers(stocks: &[StockRecord], limit: usize) -> Vec<String> {
    let mut sorted: Vec<&StockRecord> = stocks.iter().collect();
    sorted.sort_by(|a, b| b.mention_count_7d.cmp(&a.mention_count_7d));
    sorted
        .into_iter()
        .take(limit)
        .map(|s| s.ticker.clone())
        .collect()
}

/// Mentions strictly after `now - days`.
pub fn count_recent_mentions(
    mentions: &[StockMention],
    ticker: &str,
    now: DateTime<Utc>,
    days: i64,
) -> u32 {
    let cutoff = now - Duration::days(days);
    mentions
        .iter()
        .filter(|m| m.ticker == ticker && m.mentioned_at > cutoff)
        .count() as u32
}
