//! Routing trading decisions to a broker.
//!
//! The sizing mode decides how many shares an order carries. Each ticker is
//! handled on its own; a broker error on one never stops the rest.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{error, info, warn};

use super::decision::{Action, TradingDecision};
use super::error::HedgeError;
use super::order::{OrderRequest, OrderSide};
use super::portfolio::{Holding, Portfolio};
use crate::ports::broker_port::BrokerPort;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingMode {
    /// Trade the quantity the portfolio manager chose.
    Decision,
    /// Buy a fixed notional, sell the whole position.
    FixedAmount { amount: f64, leverage: f64 },
    /// Buy up to a share of equity while keeping a cash buffer, sell the whole position.
    RiskAware {
        max_position_pct: f64,
        cash_buffer_pct: f64,
    },
}

impl SizingMode {
    pub fn parse(
        name: &str,
        amount: f64,
        leverage: f64,
        max_position_pct: f64,
        cash_buffer_pct: f64,
    ) -> Result<Self, HedgeError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "decision" => Ok(SizingMode::Decision),
            "fixed" => Ok(SizingMode::FixedAmount { amount, leverage }),
            "risk" => Ok(SizingMode::RiskAware {
                max_position_pct,
                cash_buffer_pct,
            }),
            other => Err(HedgeError::invalid_input(format!(
                "unknown sizing mode '{other}' (expected decision, fixed or risk)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    NoAction,
    Skipped { reason: String },
    Submitted { order_id: String, status: String },
    Error { message: String },
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::NoAction => f.write_str("no action"),
            ExecutionOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
            ExecutionOutcome::Submitted { order_id, status } => {
                write!(f, "submitted {order_id} ({status})")
            }
            ExecutionOutcome::Error { message } => write!(f, "error: {message}"),
        }
    }
}

/// Sizes the order for one decision. `Ok(None)` means nothing to trade.
fn plan_order(
    broker: &dyn BrokerPort,
    ticker: &str,
    decision: &TradingDecision,
    mode: &SizingMode,
) -> Result<Option<OrderRequest>, HedgeError> {
    let side = match decision.action {
        Action::Buy => OrderSide::Buy,
        Action::Sell => OrderSide::Sell,
        Action::Hold => return Ok(None),
    };

    if side == OrderSide::Sell && !matches!(mode, SizingMode::Decision) {
        let held = broker.position(ticker)?.map(|p| p.qty).unwrap_or(0);
        if held <= 0 {
            return Ok(None);
        }
        return Ok(Some(OrderRequest::market(ticker, held, OrderSide::Sell)));
    }

    match *mode {
        SizingMode::Decision => {
            if decision.quantity <= 0 {
                return Ok(None);
            }
            Ok(Some(decision.order.clone().unwrap_or_else(|| {
                OrderRequest::market(ticker, decision.quantity, side)
            })))
        }
        SizingMode::FixedAmount { amount, leverage } => {
            let price = broker.latest_trade_price(ticker)?;
            if price <= 0.0 {
                return Err(HedgeError::Broker {
                    reason: format!("no usable trade price for {ticker}"),
                });
            }
            let qty = (amount * leverage / price).floor() as i64;
            Ok((qty > 0).then(|| OrderRequest::market(ticker, qty, OrderSide::Buy)))
        }
        SizingMode::RiskAware {
            max_position_pct,
            cash_buffer_pct,
        } => {
            let account = broker.account()?;
            let ask = broker.latest_quote(ticker)?.ask_price;
            if ask <= 0.0 {
                return Err(HedgeError::Broker {
                    reason: format!("no usable ask price for {ticker}"),
                });
            }
            let current_value = broker
                .position(ticker)?
                .map(|p| p.market_value)
                .unwrap_or(0.0);
            let room = account.equity * max_position_pct - current_value;
            let by_limit = (room / ask).floor() as i64;
            let by_cash = (account.cash * (1.0 - cash_buffer_pct) / ask).floor() as i64;
            let qty = by_limit.min(by_cash);
            Ok((qty > 0).then(|| OrderRequest::market(ticker, qty, OrderSide::Buy)))
        }
    }
}

pub fn execute_decision(
    broker: &dyn BrokerPort,
    ticker: &str,
    decision: &TradingDecision,
    mode: &SizingMode,
) -> ExecutionOutcome {
    let order = match plan_order(broker, ticker, decision, mode) {
        Ok(Some(order)) => order,
        Ok(None) => return ExecutionOutcome::NoAction,
        Err(e) => {
            error!(ticker, error = %e, "could not size order");
            return ExecutionOutcome::Error {
                message: e.to_string(),
            };
        }
    };

    if let Err(e) = order.validate() {
        warn!(ticker, error = %e, "order rejected before submission");
        return ExecutionOutcome::Skipped {
            reason: e.to_string(),
        };
    }

    info!(ticker, order = %order, "submitting order");
    match broker.submit_order(&order) {
        Ok(receipt) => ExecutionOutcome::Submitted {
            order_id: receipt.id,
            status: receipt.status,
        },
        Err(e) => {
            error!(ticker, error = %e, "order submission failed");
            ExecutionOutcome::Error {
                message: e.to_string(),
            }
        }
    }
}

/// Executes every decision and logs a one-line summary.
pub fn execute_decisions(
    broker: &dyn BrokerPort,
    decisions: &BTreeMap<String, TradingDecision>,
    mode: &SizingMode,
) -> BTreeMap<String, ExecutionOutcome> {
    let outcomes: BTreeMap<String, ExecutionOutcome> = decisions
        .iter()
        .map(|(ticker, decision)| {
            (
                ticker.clone(),
                execute_decision(broker, ticker, decision, mode),
            )
        })
        .collect();

    let submitted = outcomes
        .values()
        .filter(|o| matches!(o, ExecutionOutcome::Submitted { .. }))
        .count();
    let failed = outcomes
        .values()
        .filter(|o| matches!(o, ExecutionOutcome::Error { .. }))
        .count();
    info!(
        total = outcomes.len(),
        submitted,
        failed,
        "execution finished"
    );
    outcomes
}

/// Portfolio seeded from the broker account, or cash only when the broker is unreachable.
pub fn initialize_portfolio(
    broker: &dyn BrokerPort,
    fallback_cash: f64,
    tickers: &[String],
) -> Portfolio {
    let mut portfolio = Portfolio::new(fallback_cash, tickers);
    let account = match broker.account() {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %e, "broker account unavailable, using cash-only portfolio");
            return portfolio;
        }
    };
    portfolio.cash = account.cash;
    portfolio.buying_power = account.buying_power;

    match broker.positions() {
        Ok(positions) => {
            for p in positions.into_iter().filter(|p| p.qty != 0) {
                portfolio.holdings.insert(
                    p.symbol,
                    Holding {
                        shares: p.qty,
                        cost_basis: p.cost_basis,
                        realized_gains: 0.0,
                    },
                );
            }
        }
        Err(e) => warn!(error = %e, "broker positions unavailable"),
    }
    info!(
        cash = portfolio.cash,
        buying_power = portfolio.buying_power,
        positions = portfolio.holdings.values().filter(|h| h.shares != 0).count(),
        "portfolio loaded from broker"
    );
    portfolio
}
