//! Position limits derived from portfolio size, cash and buying power.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::portfolio::Portfolio;
use super::price::latest_close;
use crate::ports::price_port::PriceSource;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSettings {
    /// Largest share of portfolio value one ticker may take.
    pub max_position_pct: f64,
    /// Share of broker buying power usable when trading live.
    pub buying_power_pct: f64,
}

impl Default for RiskSettings {
    fn default() -> Self {
        RiskSettings {
            max_position_pct: 0.20,
            buying_power_pct: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReasoning {
    pub portfolio_value: f64,
    pub current_position: f64,
    pub position_limit: f64,
    pub remaining_limit: f64,
    pub available_cash: f64,
    pub buying_power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    /// Money still allowed into the ticker, capped by cash.
    pub remaining_position_limit: f64,
    pub current_price: f64,
    pub max_shares: i64,
    pub reasoning: RiskReasoning,
}

/// Limits for one ticker at `price`. Position value is measured at cost.
pub fn assess(
    portfolio: &Portfolio,
    ticker: &str,
    price: f64,
    live_trading: bool,
    settings: &RiskSettings,
) -> RiskAssessment {
    let current_position = portfolio.cost_basis(ticker);
    let portfolio_value = portfolio.cash + portfolio.total_cost_basis();
    let buying_power = portfolio.buying_power;

    let mut position_limit = portfolio_value * settings.max_position_pct;
    if live_trading {
        position_limit = position_limit.min(buying_power * settings.buying_power_pct);
    }
    let remaining_limit = position_limit - current_position;
    let max_position_size = remaining_limit.min(portfolio.cash);
    let max_shares = if price > 0.0 {
        ((max_position_size / price).floor() as i64).max(0)
    } else {
        0
    };

    RiskAssessment {
        remaining_position_limit: max_position_size,
        current_price: price,
        max_shares,
        reasoning: RiskReasoning {
            portfolio_value,
            current_position,
            position_limit,
            remaining_limit,
            available_cash: portfolio.cash,
            buying_power,
        },
    }
}

/// Assesses every ticker with a price in `[start, end]`; tickers without one are skipped.
pub fn run(
    prices: &dyn PriceSource,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
    portfolio: &Portfolio,
    live_trading: bool,
    settings: &RiskSettings,
) -> BTreeMap<String, RiskAssessment> {
    let mut out = BTreeMap::new();
    for ticker in tickers {
        let bars = match prices.prices(ticker, start, end) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "risk check could not load prices");
                continue;
            }
        };
        let Some(price) = latest_close(&bars) else {
            warn!(ticker = %ticker, "no price data, skipping risk check");
            continue;
        };
        let assessment = assess(portfolio, ticker, price, live_trading, settings);
        debug!(
            ticker = %ticker,
            price,
            max_shares = assessment.max_shares,
            "position limit computed"
        );
        out.insert(ticker.clone(), assessment);
    }
    out
}
