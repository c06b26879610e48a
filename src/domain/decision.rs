//! Portfolio manager: turns analyst signals and risk limits into trading decisions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

use super::agent::ask_structured;
use super::order::{OrderRequest, OrderSide};
use super::portfolio::Portfolio;
use super::risk::RiskAssessment;
use super::signal::{signals_for_ticker, AnalystSignals, Signal};
use crate::ports::llm_port::LlmPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Hold => "hold",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingDecision {
    pub action: Action,
    pub quantity: i64,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderRequest>,
}

impl TradingDecision {
    pub fn hold(reasoning: impl Into<String>) -> Self {
        TradingDecision {
            action: Action::Hold,
            quantity: 0,
            confidence: 0.0,
            reasoning: reasoning.into(),
            order: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionSettings {
    pub buy_confidence: f64,
    pub sell_confidence: f64,
    pub short_confidence: f64,
    pub force_exit_confidence: f64,
    pub market_order_confidence: f64,
    pub limit_offset_pct: f64,
}

impl Default for DecisionSettings {
    fn default() -> Self {
        DecisionSettings {
            buy_confidence: 60.0,
            sell_confidence: 70.0,
            short_confidence: 70.0,
            force_exit_confidence: 40.0,
            market_order_confidence: 80.0,
            limit_offset_pct: 1.0,
        }
    }
}

/// Share of `max_shares` to buy at a given confidence.
pub fn buy_fraction(confidence: f64) -> f64 {
    if confidence > 90.0 {
        1.0
    } else if confidence > 80.0 {
        0.75
    } else if confidence > 70.0 {
        0.5
    } else if confidence > 60.0 {
        0.25
    } else {
        0.0
    }
}

/// Share of `max_shares` to short at a given confidence (only called at or above the short threshold).
pub fn short_fraction(confidence: f64) -> f64 {
    if confidence < 80.0 {
        0.25
    } else if confidence < 90.0 {
        0.50
    } else {
        0.75
    }
}

fn scaled(max_shares: i64, fraction: f64) -> i64 {
    (max_shares as f64 * fraction).floor() as i64
}

/// Enforces position and confidence rules on a proposed decision.
pub fn post_process(
    mut decision: TradingDecision,
    current_position: i64,
    max_shares: i64,
    settings: &DecisionSettings,
) -> TradingDecision {
    decision.quantity = decision.quantity.max(0);

    let closing = current_position > 0
        && (decision.action == Action::Sell || decision.confidence <= settings.force_exit_confidence);

    if closing {
        decision.quantity = decision.quantity.min(current_position);
    } else {
        if current_position == 0 && decision.action == Action::Sell {
            if decision.confidence >= settings.short_confidence {
                decision.quantity = scaled(max_shares, short_fraction(decision.confidence));
            } else {
                decision.action = Action::Hold;
                decision.quantity = 0;
            }
        }

        let weak_buy = decision.action == Action::Buy && decision.confidence <= settings.buy_confidence;
        let weak_sell =
            decision.action == Action::Sell && decision.confidence <= settings.sell_confidence;
        if weak_buy || weak_sell {
            decision.action = Action::Hold;
            decision.quantity = 0;
        }
    }

    if decision.action != Action::Hold && decision.quantity == 0 {
        decision.action = Action::Hold;
    }
    if decision.action == Action::Hold {
        decision.quantity = 0;
    }
    decision
}

/// Live order for a decision: market at high confidence, otherwise a limit offset from `price`.
pub fn build_order(
    ticker: &str,
    decision: &TradingDecision,
    price: f64,
    settings: &DecisionSettings,
) -> Option<OrderRequest> {
    let side = match decision.action {
        Action::Buy => OrderSide::Buy,
        Action::Sell => OrderSide::Sell,
        Action::Hold => return None,
    };
    if decision.quantity <= 0 {
        return None;
    }
    if decision.confidence >= settings.market_order_confidence || price <= 0.0 {
        return Some(OrderRequest::market(ticker, decision.quantity, side));
    }
    let offset = settings.limit_offset_pct / 100.0;
    let limit = match side {
        OrderSide::Buy => price * (1.0 - offset),
        OrderSide::Sell => price * (1.0 + offset),
    };
    Some(OrderRequest::limit(ticker, decision.quantity, side, limit))
}

/// Deterministic decision from a confidence-weighted vote of the analysts.
pub fn rule_based_decision(
    signals: &[(&str, Signal, f64)],
    current_position: i64,
    max_shares: i64,
    settings: &DecisionSettings,
) -> TradingDecision {
    if signals.is_empty() {
        return TradingDecision::hold("No analyst signals");
    }
    let net: f64 = signals
        .iter()
        .map(|(_, s, c)| match s {
            Signal::Bullish => *c,
            Signal::Bearish => -*c,
            Signal::Neutral => 0.0,
        })
        .sum::<f64>()
        / signals.len() as f64;

    let votes = signals
        .iter()
        .map(|(agent, s, c)| format!("{agent}: {s} ({c:.0})"))
        .collect::<Vec<_>>()
        .join(", ");

    let confidence = net.abs().min(100.0);
    let (action, quantity) = if net > 0.0 && confidence > settings.buy_confidence {
        (Action::Buy, scaled(max_shares, buy_fraction(confidence)))
    } else if net < 0.0 && confidence > settings.sell_confidence {
        (Action::Sell, current_position)
    } else {
        (Action::Hold, 0)
    };

    TradingDecision {
        action,
        quantity,
        confidence,
        reasoning: format!("Net signal {net:+.1} from {votes}"),
        order: None,
    }
}

const SYSTEM_PROMPT: &str = "You are a portfolio manager making final trading decisions based on multiple tickers.

Trading Rules:
- Only execute buy orders if confidence > 60%
- Only execute sell orders if confidence > 70%
- For buys, scale position size with confidence:
  * 60-70%: Use 25% of max position size
  * 70-80%: Use 50% of max position size
  * 80-90%: Use 75% of max position size
  * >90%: Use full position size
- Only buy if you have available cash
- Only sell if you currently hold shares or to take a short position
- Sell quantity must be <= current position shares (unless shorting)
- Buy quantity must be <= max_shares for that ticker";

const LIVE_RULES: &str = "

Live Trading Rules:
- Use market orders for confidence >= 80%
- Use limit orders for confidence < 80%
- Set buy limits 1% below market
- Set sell limits 1% above market";

#[derive(Debug, Deserialize)]
struct ManagerReply {
    decisions: BTreeMap<String, ReplyDecision>,
}

#[derive(Debug, Deserialize)]
struct ReplyDecision {
    action: Action,
    quantity: f64,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

#[derive(Serialize)]
struct SignalSummary {
    signal: Signal,
    confidence: f64,
}

pub struct ManagerInputs<'a> {
    pub tickers: &'a [String],
    pub analyst_signals: &'a AnalystSignals,
    pub risk: &'a BTreeMap<String, RiskAssessment>,
    pub portfolio: &'a Portfolio,
    pub live_trading: bool,
}

fn build_prompt(inputs: &ManagerInputs<'_>) -> Result<String, serde_json::Error> {
    let mut signals = BTreeMap::new();
    let mut prices = BTreeMap::new();
    let mut max_shares = BTreeMap::new();
    let mut positions = BTreeMap::new();
    for ticker in inputs.tickers {
        let by_agent: BTreeMap<&str, SignalSummary> =
            signals_for_ticker(inputs.analyst_signals, ticker)
                .into_iter()
                .map(|(agent, s)| {
                    (
                        agent,
                        SignalSummary {
                            signal: s.signal,
                            confidence: s.confidence,
                        },
                    )
                })
                .collect();
        signals.insert(ticker.as_str(), by_agent);
        let risk = inputs.risk.get(ticker);
        prices.insert(ticker.as_str(), risk.map(|r| r.current_price).unwrap_or(0.0));
        max_shares.insert(ticker.as_str(), risk.map(|r| r.max_shares).unwrap_or(0));
        positions.insert(ticker.as_str(), inputs.portfolio.shares(ticker));
    }

    Ok(format!(
        "Based on the team's analysis, make your trading decisions for each ticker.\n\n\
         Here are the signals by ticker:\n{}\n\n\
         Current Prices:\n{}\n\n\
         Maximum Shares Allowed For Purchases:\n{}\n\n\
         Portfolio Cash: {:.2}\n\
         Current Positions: {}\n\n\
         Output strictly in JSON with the following structure:\n\
         {{\"decisions\": {{\"TICKER1\": {{\"action\": \"buy/sell/hold\", \"quantity\": integer, \"confidence\": float, \"reasoning\": \"string\"}}}}}}",
        serde_json::to_string_pretty(&signals)?,
        serde_json::to_string_pretty(&prices)?,
        serde_json::to_string_pretty(&max_shares)?,
        inputs.portfolio.cash,
        serde_json::to_string_pretty(&positions)?,
    ))
}

fn proposals_from_llm(
    llm: &dyn LlmPort,
    inputs: &ManagerInputs<'_>,
    attempts: u32,
) -> Option<BTreeMap<String, TradingDecision>> {
    let user = match build_prompt(inputs) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "could not serialise portfolio manager prompt");
            return None;
        }
    };
    let system = if inputs.live_trading {
        format!("{SYSTEM_PROMPT}{LIVE_RULES}")
    } else {
        SYSTEM_PROMPT.to_string()
    };
    let reply: ManagerReply = ask_structured(llm, &system, &user, attempts)?;
    Some(
        reply
            .decisions
            .into_iter()
            .map(|(ticker, d)| {
                (
                    ticker.to_uppercase(),
                    TradingDecision {
                        action: d.action,
                        quantity: d.quantity.max(0.0).floor() as i64,
                        confidence: d.confidence.clamp(0.0, 100.0),
                        reasoning: d.reasoning,
                        order: None,
                    },
                )
            })
            .collect(),
    )
}

/// Produces one decision per ticker, using the language model when one is given.
pub fn run(
    inputs: &ManagerInputs<'_>,
    llm: Option<&dyn LlmPort>,
    attempts: u32,
    settings: &DecisionSettings,
) -> BTreeMap<String, TradingDecision> {
    let mut proposals = match llm {
        Some(llm) => proposals_from_llm(llm, inputs, attempts).unwrap_or_else(|| {
            warn!("portfolio manager falling back to hold for every ticker");
            inputs
                .tickers
                .iter()
                .map(|t| {
                    (
                        t.clone(),
                        TradingDecision::hold("Error in portfolio management, defaulting to hold"),
                    )
                })
                .collect()
        }),
        None => BTreeMap::new(),
    };

    let mut decisions = BTreeMap::new();
    for ticker in inputs.tickers {
        let position = inputs.portfolio.shares(ticker);
        let risk = inputs.risk.get(ticker);
        let max_shares = risk.map(|r| r.max_shares).unwrap_or(0);
        let price = risk.map(|r| r.current_price).unwrap_or(0.0);

        let proposal = match llm {
            Some(_) => proposals
                .remove(ticker)
                .unwrap_or_else(|| TradingDecision::hold("No decision returned for ticker")),
            None => {
                let votes: Vec<(&str, Signal, f64)> =
                    signals_for_ticker(inputs.analyst_signals, ticker)
                        .into_iter()
                        .map(|(agent, s)| (agent, s.signal, s.confidence))
                        .collect();
                rule_based_decision(&votes, position, max_shares, settings)
            }
        };

        let mut decision = post_process(proposal, position, max_shares, settings);
        if inputs.live_trading {
            decision.order = build_order(ticker, &decision, price, settings);
        }
        info!(
            ticker = %ticker,
            action = %decision.action,
            quantity = decision.quantity,
            confidence = decision.confidence,
            "decision"
        );
        decisions.insert(ticker.clone(), decision);
    }
    decisions
}
