//! Analyst signals and their aggregation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const RISK_AGENT: &str = "risk_management_agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Bullish => "bullish",
            Signal::Bearish => "bearish",
            Signal::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystSignal {
    pub signal: Signal,
    /// 0 to 100.
    pub confidence: f64,
    pub reasoning: String,
}

impl AnalystSignal {
    pub fn new(signal: Signal, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            signal,
            confidence: confidence.clamp(0.0, 100.0),
            reasoning: reasoning.into(),
        }
    }
}

/// Agent name -> ticker -> signal.
pub type AnalystSignals = BTreeMap<String, BTreeMap<String, AnalystSignal>>;

/// Signals for one ticker from every analyst except the risk manager.
pub fn signals_for_ticker<'a>(
    signals: &'a AnalystSignals,
    ticker: &str,
) -> Vec<(&'a str, &'a AnalystSignal)> {
    signals
        .iter()
        .filter(|(agent, _)| agent.as_str() != RISK_AGENT)
        .filter_map(|(agent, by_ticker)| by_ticker.get(ticker).map(|s| (agent.as_str(), s)))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignalCounts {
    pub bullish: u32,
    pub bearish: u32,
    pub neutral: u32,
}

impl SignalCounts {
    pub fn for_ticker(signals: &AnalystSignals, ticker: &str) -> Self {
        let mut counts = SignalCounts::default();
        for (_, s) in signals_for_ticker(signals, ticker) {
            match s.signal {
                Signal::Bullish => counts.bullish += 1,
                Signal::Bearish => counts.bearish += 1,
                Signal::Neutral => counts.neutral += 1,
            }
        }
        counts
    }
}
