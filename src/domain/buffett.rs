//! Value analyst scoring companies on return on equity, leverage, margins,
//! earnings consistency and a discounted owner-earnings valuation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::agent::{ask_structured, AgentContext};
use super::error::HedgeError;
use super::financials::{FinancialMetrics, LineItem};
use super::signal::{AnalystSignal, Signal};

const GROWTH_RATE: f64 = 0.05;
const DISCOUNT_RATE: f64 = 0.09;
const TERMINAL_MULTIPLE: f64 = 12.0;
const PROJECTION_YEARS: i32 = 10;
const MAINTENANCE_CAPEX_SHARE: f64 = 0.75;
const BASE_MAX_SCORE: u32 = 10;
const MARGIN_OF_SAFETY_BONUS: u32 = 2;
const MARGIN_OF_SAFETY_THRESHOLD: f64 = 0.3;
const PERIODS: usize = 5;

const SYSTEM_PROMPT: &str = "You are a Warren Buffett AI agent, making investment decisions using his principles:
1. Circle of Competence: Only invest in understandable businesses
2. Margin of Safety: Buy well below intrinsic value
3. Economic Moat: Look for competitive advantages
4. Quality Management: Conservative, shareholder-oriented
5. Financial Strength: Low debt, high returns on equity
6. Long-term Perspective: Invest in businesses, not stocks

Rules:
- Only buy when there's a significant margin of safety (>30%)
- Focus on owner earnings and intrinsic value
- Prefer companies with consistent earnings growth
- Avoid companies with high debt or poor management
- Hold good businesses for very long periods
- Sell when fundamentals deteriorate or valuation becomes excessive";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredAnalysis {
    pub score: u32,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OwnerEarnings {
    pub owner_earnings: f64,
    pub net_income: f64,
    pub depreciation: f64,
    pub maintenance_capex: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuffettAnalysis {
    pub signal: Signal,
    pub score: u32,
    pub max_score: u32,
    pub fundamental_analysis: ScoredAnalysis,
    pub consistency_analysis: ScoredAnalysis,
    pub owner_earnings: Option<OwnerEarnings>,
    pub intrinsic_value: Option<f64>,
    pub market_cap: Option<f64>,
    pub margin_of_safety: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BuffettReply {
    signal: Signal,
    confidence: f64,
    reasoning: String,
}

pub fn analyze_fundamentals(metrics: &[FinancialMetrics]) -> ScoredAnalysis {
    let Some(latest) = metrics.first() else {
        return ScoredAnalysis {
            score: 0,
            details: "Insufficient fundamental data".into(),
        };
    };

    let mut score = 0;
    let mut reasons = Vec::new();

    match latest.return_on_equity {
        Some(roe) if roe > 0.15 => {
            score += 2;
            reasons.push(format!("Strong ROE of {:.1}%", roe * 100.0));
        }
        Some(roe) => reasons.push(format!("Weak ROE of {:.1}%", roe * 100.0)),
        None => reasons.push("ROE data not available".into()),
    }

    match latest.debt_to_equity {
        Some(de) if de < 0.5 => {
            score += 2;
            reasons.push("Conservative debt levels".into());
        }
        Some(de) => reasons.push(format!("High debt to equity ratio of {de:.1}")),
        None => reasons.push("Debt to equity data not available".into()),
    }

    match latest.operating_margin {
        Some(m) if m > 0.15 => {
            score += 2;
            reasons.push("Strong operating margins".into());
        }
        Some(m) => reasons.push(format!("Weak operating margin of {:.1}%", m * 100.0)),
        None => reasons.push("Operating margin data not available".into()),
    }

    match latest.current_ratio {
        Some(cr) if cr > 1.5 => {
            score += 1;
            reasons.push("Good liquidity position".into());
        }
        Some(cr) => reasons.push(format!("Weak liquidity with current ratio of {cr:.1}")),
        None => reasons.push("Current ratio data not available".into()),
    }

    ScoredAnalysis {
        score,
        details: reasons.join("; "),
    }
}

/// Items are newest first; growth means each period beats the one before it.
pub fn analyze_consistency(items: &[LineItem]) -> ScoredAnalysis {
    if items.len() < 4 {
        return ScoredAnalysis {
            score: 0,
            details: "Insufficient historical data".into(),
        };
    }

    let earnings: Vec<f64> = items
        .iter()
        .filter_map(|i| i.net_income)
        .filter(|v| *v != 0.0)
        .collect();
    if earnings.len() < 4 {
        return ScoredAnalysis {
            score: 0,
            details: "Insufficient earnings data for trend analysis".into(),
        };
    }

    let mut score = 0;
    let mut reasons = Vec::new();
    if earnings.windows(2).all(|w| w[0] > w[1]) {
        score += 3;
        reasons.push("Consistent earnings growth over past periods".to_string());
    } else {
        reasons.push("Inconsistent earnings growth pattern".to_string());
    }

    let newest = earnings[0];
    let oldest = earnings[earnings.len() - 1];
    let growth_rate = (newest - oldest) / oldest.abs();
    reasons.push(format!(
        "Total earnings growth of {:.1}% over past {} periods",
        growth_rate * 100.0,
        earnings.len()
    ));

    ScoredAnalysis {
        score,
        details: reasons.join("; "),
    }
}

/// Net income + depreciation - maintenance capex for the latest period.
pub fn owner_earnings(items: &[LineItem]) -> Option<OwnerEarnings> {
    let latest = items.first()?;
    let net_income = latest.net_income.filter(|v| *v != 0.0)?;
    let depreciation = latest.depreciation_and_amortization.filter(|v| *v != 0.0)?;
    let capex = latest.capital_expenditure.filter(|v| *v != 0.0)?;
    let maintenance_capex = capex * MAINTENANCE_CAPEX_SHARE;
    Some(OwnerEarnings {
        owner_earnings: net_income + depreciation - maintenance_capex,
        net_income,
        depreciation,
        maintenance_capex,
    })
}

/// Ten-year discounted owner earnings plus a terminal multiple.
pub fn intrinsic_value(owner_earnings: f64) -> f64 {
    let projected: f64 = (1..=PROJECTION_YEARS)
        .map(|year| {
            owner_earnings * (1.0 + GROWTH_RATE).powi(year) / (1.0 + DISCOUNT_RATE).powi(year)
        })
        .sum();
    let terminal = owner_earnings * (1.0 + GROWTH_RATE).powi(PROJECTION_YEARS) * TERMINAL_MULTIPLE
        / (1.0 + DISCOUNT_RATE).powi(PROJECTION_YEARS);
    projected + terminal
}

pub fn analyze(
    metrics: &[FinancialMetrics],
    items: &[LineItem],
    market_cap: Option<f64>,
) -> BuffettAnalysis {
    let fundamental_analysis = analyze_fundamentals(metrics);
    let consistency_analysis = analyze_consistency(items);
    let owner = owner_earnings(items);
    let intrinsic = owner.map(|o| intrinsic_value(o.owner_earnings));

    let mut score = fundamental_analysis.score + consistency_analysis.score;
    let mut max_score = BASE_MAX_SCORE;

    let margin_of_safety = match (intrinsic, market_cap) {
        (Some(iv), Some(cap)) if iv != 0.0 && cap != 0.0 => Some((iv - cap) / cap),
        _ => None,
    };
    if margin_of_safety.is_some_and(|m| m > MARGIN_OF_SAFETY_THRESHOLD) {
        score += MARGIN_OF_SAFETY_BONUS;
        max_score += MARGIN_OF_SAFETY_BONUS;
    }

    let signal = if f64::from(score) >= 0.7 * f64::from(max_score) {
        Signal::Bullish
    } else if f64::from(score) <= 0.3 * f64::from(max_score) {
        Signal::Bearish
    } else {
        Signal::Neutral
    };

    BuffettAnalysis {
        signal,
        score,
        max_score,
        fundamental_analysis,
        consistency_analysis,
        owner_earnings: owner,
        intrinsic_value: intrinsic,
        market_cap,
        margin_of_safety,
    }
}

/// Signal derived from the score alone, used when no language model is configured.
pub fn rule_signal(analysis: &BuffettAnalysis) -> AnalystSignal {
    let confidence = f64::from(analysis.score) / f64::from(analysis.max_score) * 100.0;
    let mut reasoning = vec![
        analysis.fundamental_analysis.details.clone(),
        analysis.consistency_analysis.details.clone(),
    ];
    if let Some(mos) = analysis.margin_of_safety {
        reasoning.push(format!("Margin of safety {:.1}%", mos * 100.0));
    }
    AnalystSignal::new(analysis.signal, confidence.round(), reasoning.join("; "))
}

fn llm_signal(ctx: &AgentContext<'_>, ticker: &str, analysis: &BuffettAnalysis) -> AnalystSignal {
    let Some(llm) = ctx.llm else {
        return rule_signal(analysis);
    };
    let analysis_json =
        serde_json::to_string_pretty(analysis).unwrap_or_else(|_| format!("{analysis:?}"));
    let user = format!(
        "Based on the following analysis, create investment signals as Warren Buffett would.\n\n\
         Analysis Data for {ticker}:\n{analysis_json}\n\n\
         Return signals for this ticker in this JSON format:\n\
         {{\"signal\": \"bullish\" | \"bearish\" | \"neutral\", \"confidence\": float (0-100), \"reasoning\": \"Buffett-style explanation\"}}"
    );
    match ask_structured::<BuffettReply>(llm, SYSTEM_PROMPT, &user, ctx.llm_retries) {
        Some(reply) => AnalystSignal::new(reply.signal, reply.confidence, reply.reasoning),
        None => AnalystSignal::new(
            Signal::Neutral,
            0.0,
            "Error in analysis, defaulting to neutral",
        ),
    }
}

fn or_empty<T>(ticker: &str, what: &str, result: Result<Vec<T>, HedgeError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!(ticker, error = %e, "failed to fetch {what}");
        Vec::new()
    })
}

pub fn analyze_ticker(ctx: &AgentContext<'_>, ticker: &str) -> AnalystSignal {
    let metrics = or_empty(
        ticker,
        "financial metrics",
        ctx.fundamentals.financial_metrics(ticker, ctx.end_date, PERIODS),
    );
    let items = or_empty(
        ticker,
        "line items",
        ctx.fundamentals.line_items(ticker, ctx.end_date, PERIODS),
    );
    let market_cap = ctx
        .fundamentals
        .market_cap(ticker, ctx.end_date)
        .unwrap_or_else(|e| {
            warn!(ticker, error = %e, "failed to fetch market cap");
            None
        });

    let analysis = analyze(&metrics, &items, market_cap);
    info!(
        ticker,
        score = analysis.score,
        max_score = analysis.max_score,
        signal = %analysis.signal,
        "buffett analysis complete"
    );
    llm_signal(ctx, ticker, &analysis)
}

pub fn run(ctx: &AgentContext<'_>) -> BTreeMap<String, AnalystSignal> {
    ctx.tickers
        .iter()
        .map(|t| (t.clone(), analyze_ticker(ctx, t)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn metrics(roe: f64, de: f64, margin: f64, current: f64) -> FinancialMetrics {
        FinancialMetrics {
            ticker: "KO".into(),
            report_period: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            return_on_equity: Some(roe),
            debt_to_equity: Some(de),
            operating_margin: Some(margin),
            current_ratio: Some(current),
            ..Default::default()
        }
    }

    fn item(year: i32, net_income: f64) -> LineItem {
        LineItem {
            ticker: "KO".into(),
            report_period: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
            capital_expenditure: Some(100.0),
            depreciation_and_amortization: Some(50.0),
            net_income: Some(net_income),
            ..Default::default()
        }
    }

    #[test]
    fn fundamentals_award_all_seven_points() {
        let result = analyze_fundamentals(&[metrics(0.20, 0.3, 0.25, 2.0)]);
        assert_eq!(result.score, 7);
        assert!(result.details.contains("Strong ROE of 20.0%"));
    }

    #[test]
    fn fundamentals_weak_company_scores_zero() {
        let result = analyze_fundamentals(&[metrics(0.05, 1.2, 0.05, 0.8)]);
        assert_eq!(result.score, 0);
        assert!(result.details.contains("High debt to equity ratio of 1.2"));
    }

    #[test]
    fn fundamentals_without_data() {
        let result = analyze_fundamentals(&[]);
        assert_eq!(result.score, 0);
        assert_eq!(result.details, "Insufficient fundamental data");
    }

    #[test]
    fn consistency_rewards_growing_earnings() {
        let items = vec![item(2024, 400.0), item(2023, 300.0), item(2022, 200.0), item(2021, 100.0)];
        let result = analyze_consistency(&items);
        assert_eq!(result.score, 3);
        assert!(result.details.contains("Total earnings growth of 300.0% over past 4 periods"));
    }

    #[test]
    fn consistency_penalises_dip() {
        let items = vec![item(2024, 400.0), item(2023, 450.0), item(2022, 200.0), item(2021, 100.0)];
        assert_eq!(analyze_consistency(&items).score, 0);
    }

    #[test]
    fn consistency_needs_four_periods() {
        let items = vec![item(2024, 400.0), item(2023, 300.0), item(2022, 200.0)];
        assert_eq!(analyze_consistency(&items).details, "Insufficient historical data");
    }

    #[test]
    fn owner_earnings_uses_three_quarters_of_capex() {
        let oe = owner_earnings(&[item(2024, 1_000.0)]).unwrap();
        assert_relative_eq!(oe.owner_earnings, 1_000.0 + 50.0 - 75.0);
    }

    #[test]
    fn owner_earnings_requires_every_component() {
        let mut latest = item(2024, 1_000.0);
        latest.capital_expenditure = None;
        assert!(owner_earnings(&[latest]).is_none());
    }

    #[test]
    fn intrinsic_value_matches_closed_form() {
        let oe = 100.0_f64;
        let ratio: f64 = 1.05 / 1.09;
        let annuity: f64 = (1..=10).map(|y| ratio.powi(y)).sum();
        let expected = oe * annuity + oe * ratio.powi(10) * 12.0;
        assert_relative_eq!(intrinsic_value(oe), expected, epsilon = 1e-9);
    }

    #[test]
    fn margin_of_safety_bonus_extends_max_score() {
        let items = vec![item(2024, 400.0), item(2023, 300.0), item(2022, 200.0), item(2021, 100.0)];
        let analysis = analyze(&[metrics(0.20, 0.3, 0.25, 2.0)], &items, Some(10.0));
        assert_eq!(analysis.score, 12);
        assert_eq!(analysis.max_score, 12);
        assert_eq!(analysis.signal, Signal::Bullish);
    }

    #[test]
    fn signal_thresholds() {
        // 2 of 10 is bearish
        let analysis = analyze(&[metrics(0.05, 0.3, 0.05, 0.8)], &[], None);
        assert_eq!(analysis.score, 2);
        assert_eq!(analysis.signal, Signal::Bearish);

        // 5 of 10 is neutral
        let analysis = analyze(&[metrics(0.20, 0.3, 0.05, 2.0)], &[], None);
        assert_eq!(analysis.score, 5);
        assert_eq!(analysis.signal, Signal::Neutral);
    }

    #[test]
    fn rule_signal_confidence_is_score_share() {
        let analysis = analyze(&[metrics(0.20, 0.3, 0.05, 2.0)], &[], None);
        let signal = rule_signal(&analysis);
        assert_eq!(signal.confidence, 50.0);
        assert_eq!(signal.signal, Signal::Neutral);
    }
}
