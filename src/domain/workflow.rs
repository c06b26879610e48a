//! One pass of the fund: analysts, then risk limits, then the portfolio manager.

use chrono::{Months, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use super::agent::AgentContext;
use super::analyst::Analyst;
use super::decision::{self, DecisionSettings, ManagerInputs, TradingDecision};
use super::error::HedgeError;
use super::portfolio::Portfolio;
use super::risk::{self, RiskAssessment, RiskSettings};
use super::signal::AnalystSignals;
use super::{buffett, sentiment};
use crate::ports::fundamentals_port::FundamentalsSource;
use crate::ports::llm_port::LlmPort;
use crate::ports::price_port::PriceSource;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub decisions: BTreeMap<String, TradingDecision>,
    pub analyst_signals: AnalystSignals,
    pub risk: BTreeMap<String, RiskAssessment>,
}

/// Anything that can turn a portfolio and a date window into decisions.
pub trait DecisionEngine {
    fn decide(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
        portfolio: &Portfolio,
    ) -> Result<RunResult, HedgeError>;
}

pub struct HedgeFund<'a> {
    pub analysts: Vec<Analyst>,
    pub prices: &'a dyn PriceSource,
    pub fundamentals: &'a dyn FundamentalsSource,
    pub llm: Option<&'a dyn LlmPort>,
    pub llm_retries: u32,
    pub risk_settings: RiskSettings,
    pub decision_settings: DecisionSettings,
    pub live_trading: bool,
    /// Called with each agent's name and output as it finishes.
    pub reasoning_sink: Option<&'a dyn Fn(&str, &serde_json::Value)>,
}

impl<'a> HedgeFund<'a> {
    pub fn new(
        analysts: Vec<Analyst>,
        prices: &'a dyn PriceSource,
        fundamentals: &'a dyn FundamentalsSource,
    ) -> Self {
        HedgeFund {
            analysts,
            prices,
            fundamentals,
            llm: None,
            llm_retries: 3,
            risk_settings: RiskSettings::default(),
            decision_settings: DecisionSettings::default(),
            live_trading: false,
            reasoning_sink: None,
        }
    }

    fn show<T: Serialize>(&self, agent: &str, output: &T) {
        if let Some(sink) = self.reasoning_sink {
            if let Ok(value) = serde_json::to_value(output) {
                sink(agent, &value);
            }
        }
    }

    pub fn run(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
        portfolio: &Portfolio,
    ) -> Result<RunResult, HedgeError> {
        if tickers.is_empty() {
            return Err(HedgeError::invalid_input("no tickers to analyse"));
        }
        if start > end {
            return Err(HedgeError::invalid_input(format!(
                "start date {start} is after end date {end}"
            )));
        }

        let ctx = AgentContext {
            tickers,
            start_date: start,
            end_date: end,
            prices: self.prices,
            fundamentals: self.fundamentals,
            llm: self.llm,
            llm_retries: self.llm_retries,
        };

        let mut analyst_signals = AnalystSignals::new();
        for analyst in &self.analysts {
            info!(analyst = analyst.key(), tickers = tickers.len(), "running analyst");
            let signals = match analyst {
                Analyst::WarrenBuffett => buffett::run(&ctx),
                Analyst::Sentiment => sentiment::run(&ctx),
            };
            self.show(analyst.agent_name(), &signals);
            analyst_signals.insert(analyst.agent_name().to_string(), signals);
        }

        let risk = risk::run(
            self.prices,
            tickers,
            start,
            end,
            portfolio,
            self.live_trading,
            &self.risk_settings,
        );
        self.show(super::signal::RISK_AGENT, &risk);

        let inputs = ManagerInputs {
            tickers,
            analyst_signals: &analyst_signals,
            risk: &risk,
            portfolio,
            live_trading: self.live_trading,
        };
        let decisions = decision::run(&inputs, self.llm, self.llm_retries, &self.decision_settings);
        self.show("portfolio_management_agent", &decisions);

        Ok(RunResult {
            decisions,
            analyst_signals,
            risk,
        })
    }
}

impl DecisionEngine for HedgeFund<'_> {
    fn decide(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
        portfolio: &Portfolio,
    ) -> Result<RunResult, HedgeError> {
        self.run(tickers, start, end, portfolio)
    }
}

/// End defaults to `today`, start to `months` before the end.
pub fn resolve_dates(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
    months: u32,
) -> Result<(NaiveDate, NaiveDate), HedgeError> {
    let end = end.unwrap_or(today);
    let start = match start {
        Some(s) => s,
        None => end
            .checked_sub_months(Months::new(months))
            .ok_or_else(|| HedgeError::invalid_input("start date out of range"))?,
    };
    if start > end {
        return Err(HedgeError::invalid_input(format!(
            "start date {start} is after end date {end}"
        )));
    }
    Ok((start, end))
}
