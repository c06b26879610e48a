//! Sentiment analyst combining insider trading direction with news tone.

use std::collections::BTreeMap;
use tracing::{info, warn};

use super::agent::AgentContext;
use super::financials::{CompanyNews, InsiderTrade, NewsSentiment};
use super::signal::{AnalystSignal, Signal};

const INSIDER_WEIGHT: f64 = 0.3;
const NEWS_WEIGHT: f64 = 0.7;
const FETCH_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Tally {
    bullish: f64,
    bearish: f64,
    neutral: f64,
}

impl Tally {
    fn add(&mut self, signal: Signal) {
        match signal {
            Signal::Bullish => self.bullish += 1.0,
            Signal::Bearish => self.bearish += 1.0,
            Signal::Neutral => self.neutral += 1.0,
        }
    }

    fn total(&self) -> f64 {
        self.bullish + self.bearish + self.neutral
    }
}

fn insider_signal(trade: &InsiderTrade) -> Option<Signal> {
    let shares = trade.transaction_shares?;
    if shares < 0.0 {
        Some(Signal::Bearish)
    } else if shares > 0.0 {
        Some(Signal::Bullish)
    } else {
        None
    }
}

fn news_signal(news: &CompanyNews) -> Option<Signal> {
    news.sentiment.map(|s| match s {
        NewsSentiment::Positive => Signal::Bullish,
        NewsSentiment::Negative => Signal::Bearish,
        NewsSentiment::Neutral => Signal::Neutral,
    })
}

/// Weighted vote of insider trades and news items.
pub fn score(trades: &[InsiderTrade], news: &[CompanyNews]) -> AnalystSignal {
    let mut insiders = Tally::default();
    trades.iter().filter_map(insider_signal).for_each(|s| insiders.add(s));
    let mut headlines = Tally::default();
    news.iter().filter_map(news_signal).for_each(|s| headlines.add(s));

    let bullish = insiders.bullish * INSIDER_WEIGHT + headlines.bullish * NEWS_WEIGHT;
    let bearish = insiders.bearish * INSIDER_WEIGHT + headlines.bearish * NEWS_WEIGHT;
    let total = insiders.total() * INSIDER_WEIGHT + headlines.total() * NEWS_WEIGHT;

    let signal = if bullish > bearish {
        Signal::Bullish
    } else if bearish > bullish {
        Signal::Bearish
    } else {
        Signal::Neutral
    };
    let confidence = if total > 0.0 {
        (bullish.max(bearish) / total * 100.0 * 10.0).round() / 10.0
    } else {
        0.0
    };

    AnalystSignal::new(
        signal,
        confidence,
        format!(
            "Weighted Bullish signals: {bullish:.1}, Weighted Bearish signals: {bearish:.1} \
             ({} insider trades, {} news items)",
            insiders.total(),
            headlines.total()
        ),
    )
}

pub fn analyze_ticker(ctx: &AgentContext<'_>, ticker: &str) -> AnalystSignal {
    let trades = ctx
        .fundamentals
        .insider_trades(ticker, Some(ctx.start_date), ctx.end_date, FETCH_LIMIT)
        .unwrap_or_else(|e| {
            warn!(ticker, error = %e, "failed to fetch insider trades");
            Vec::new()
        });
    let news = ctx
        .fundamentals
        .company_news(ticker, Some(ctx.start_date), ctx.end_date, FETCH_LIMIT)
        .unwrap_or_else(|e| {
            warn!(ticker, error = %e, "failed to fetch company news");
            Vec::new()
        });
    let signal = score(&trades, &news);
    info!(ticker, signal = %signal.signal, confidence = signal.confidence, "sentiment analysis complete");
    signal
}

pub fn run(ctx: &AgentContext<'_>) -> BTreeMap<String, AnalystSignal> {
    ctx.tickers
        .iter()
        .map(|t| (t.clone(), analyze_ticker(ctx, t)))
        .collect()
}
