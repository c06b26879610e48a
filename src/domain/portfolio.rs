//! Cash, holdings and trade bookkeeping.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::decision::Action;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub shares: i64,
    /// Total amount paid for the shares currently held.
    pub cost_basis: f64,
    pub realized_gains: f64,
}

impl Holding {
    pub fn average_cost(&self) -> f64 {
        if self.shares > 0 {
            self.cost_basis / self.shares as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    pub buying_power: f64,
    pub holdings: HashMap<String, Holding>,
}

impl Portfolio {
    pub fn new(cash: f64, tickers: &[String]) -> Self {
        Portfolio {
            cash,
            buying_power: cash,
            holdings: tickers
                .iter()
                .map(|t| (t.clone(), Holding::default()))
                .collect(),
        }
    }

    pub fn shares(&self, ticker: &str) -> i64 {
        self.holdings.get(ticker).map(|h| h.shares).unwrap_or(0)
    }

    pub fn cost_basis(&self, ticker: &str) -> f64 {
        self.holdings.get(ticker).map(|h| h.cost_basis).unwrap_or(0.0)
    }

    pub fn total_cost_basis(&self) -> f64 {
        self.holdings.values().map(|h| h.cost_basis).sum()
    }

    pub fn total_realized_gains(&self) -> f64 {
        self.holdings.values().map(|h| h.realized_gains).sum()
    }

    /// Market value of all holdings; tickers without a price contribute nothing.
    pub fn position_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.holdings
            .iter()
            .filter_map(|(t, h)| prices.get(t).map(|p| h.shares as f64 * p))
            .sum()
    }

    pub fn total_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.cash + self.position_value(prices)
    }

    /// Applies a simulated fill and returns the number of shares actually traded.
    ///
    /// Buys shrink to what cash affords. Sells never exceed the shares held.
    pub fn execute_trade(&mut self, ticker: &str, action: Action, quantity: i64, price: f64) -> i64 {
        if quantity <= 0 || price <= 0.0 || !price.is_finite() {
            return 0;
        }
        match action {
            Action::Buy => {
                let affordable = (self.cash / price).floor() as i64;
                let filled = quantity.min(affordable);
                if filled <= 0 {
                    return 0;
                }
                let cost = filled as f64 * price;
                let holding = self.holdings.entry(ticker.to_string()).or_default();
                holding.shares += filled;
                holding.cost_basis += cost;
                self.cash -= cost;
                filled
            }
            Action::Sell => {
                let Some(holding) = self.holdings.get_mut(ticker) else {
                    return 0;
                };
                let filled = quantity.min(holding.shares);
                if filled <= 0 {
                    return 0;
                }
                let avg_cost = holding.average_cost();
                holding.realized_gains += (price - avg_cost) * filled as f64;
                holding.shares -= filled;
                holding.cost_basis = if holding.shares > 0 {
                    avg_cost * holding.shares as f64
                } else {
                    0.0
                };
                self.cash += filled as f64 * price;
                filled
            }
            Action::Hold => 0,
        }
    }
}
