//! Terminal rendering of run results, backtest progress and diagnostics.

use colored::{ColoredString, Colorize};
use std::collections::BTreeMap;
use std::fmt::Write;

use super::credentials::CredentialStatus;
use crate::domain::analyst::Analyst;
use crate::domain::backtest::DayResult;
use crate::domain::decision::Action;
use crate::domain::execution::ExecutionOutcome;
use crate::domain::metrics::PerformanceSummary;
use crate::domain::signal::{Signal, signals_for_ticker};
use crate::domain::workflow::RunResult;

fn paint_action(action: Action, width: usize) -> ColoredString {
    let text = format!("{:<width$}", action.as_str().to_uppercase());
    match action {
        Action::Buy => text.green().bold(),
        Action::Sell => text.red().bold(),
        Action::Hold => text.yellow(),
    }
}

fn paint_signal(signal: Signal) -> ColoredString {
    let text = format!("{:<8}", signal.as_str().to_uppercase());
    match signal {
        Signal::Bullish => text.green(),
        Signal::Bearish => text.red(),
        Signal::Neutral => text.yellow(),
    }
}

fn signed(value: f64, text: String) -> ColoredString {
    if value > 0.0 {
        text.green()
    } else if value < 0.0 {
        text.red()
    } else {
        text.normal()
    }
}

fn ratio(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_infinite() => "∞".to_string(),
        Some(v) => format!("{v:.2}"),
        None => "-".to_string(),
    }
}

/// Per-ticker analyst signals followed by the trading decision.
pub fn render_decisions(result: &RunResult) -> String {
    let mut out = String::new();
    for (ticker, decision) in &result.decisions {
        let _ = writeln!(out, "\n{} {}", "Analysis for".white().bold(), ticker.cyan().bold());
        let _ = writeln!(out, "{}", "=".repeat(50).bright_black());
        for (agent, signal) in signals_for_ticker(&result.analyst_signals, ticker) {
            let _ = writeln!(
                out,
                "  {:<28} {} {:>6.1}%",
                agent,
                paint_signal(signal.signal),
                signal.confidence
            );
        }
        if let Some(risk) = result.risk.get(ticker) {
            let _ = writeln!(
                out,
                "  {:<28} max position {:.2}, max shares {}",
                "risk_management_agent".bright_black(),
                risk.remaining_position_limit,
                risk.max_shares
            );
        }
        let _ = writeln!(
            out,
            "  {} {} qty {:<6} confidence {:.1}%",
            "Decision:".white().bold(),
            paint_action(decision.action, 5),
            decision.quantity,
            decision.confidence
        );
        if let Some(order) = &decision.order {
            let _ = writeln!(out, "  {} {order}", "Order:".white().bold());
        }
        if !decision.reasoning.is_empty() {
            let _ = writeln!(out, "  {} {}", "Reasoning:".white().bold(), decision.reasoning);
        }
    }
    out
}

/// One line per traded ticker and the day's portfolio summary.
pub fn render_backtest_day(day: &DayResult) -> String {
    let mut out = String::new();
    for row in &day.rows {
        let _ = writeln!(
            out,
            "{} {:<6} {} {:>6} @ {:>9.2}  owned {:>6}  value {:>12.2}  {}/{}/{}",
            row.date,
            row.ticker.cyan(),
            paint_action(row.action, 4),
            row.quantity,
            row.price,
            row.shares_owned,
            row.position_value,
            row.counts.bullish.to_string().green(),
            row.counts.bearish.to_string().red(),
            row.counts.neutral.to_string().yellow(),
        );
    }
    let s = &day.summary;
    let _ = writeln!(
        out,
        "{} {} total {:>12.2}  return {}  cash {:>12.2}  positions {:>12.2}  sharpe {}  sortino {}  drawdown {}",
        s.date,
        "SUMMARY".white().bold(),
        s.total_value,
        signed(s.return_pct, format!("{:>+7.2}%", s.return_pct)),
        s.cash_balance,
        s.total_position_value,
        ratio(s.metrics.sharpe_ratio),
        ratio(s.metrics.sortino_ratio),
        s.metrics
            .max_drawdown
            .map(|d| format!("{d:.2}%"))
            .unwrap_or_else(|| "-".to_string()),
    );
    out
}

pub fn render_summary(summary: &PerformanceSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", "PERFORMANCE SUMMARY".white().bold());
    let _ = writeln!(out, "{}", "=".repeat(50).bright_black());
    let _ = writeln!(out, "Initial Capital:        {:.2}", summary.initial_capital);
    let _ = writeln!(out, "Final Value:            {:.2}", summary.final_value);
    let _ = writeln!(
        out,
        "Total Return:           {}",
        signed(summary.total_return_pct, format!("{:.2}%", summary.total_return_pct))
    );
    let _ = writeln!(out, "Realized Gains:         {:.2}", summary.total_realized_gains);
    let _ = writeln!(out, "Sharpe Ratio:           {}", ratio(Some(summary.sharpe_ratio)));
    let drawdown_date = summary
        .max_drawdown_date
        .map(|d| format!(" on {d}"))
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "Max Drawdown:           {}{drawdown_date}",
        format!("{:.2}%", summary.max_drawdown_pct).red()
    );
    let _ = writeln!(out, "Win Rate:               {:.2}%", summary.win_rate_pct);
    let _ = writeln!(out, "Win/Loss Ratio:         {}", ratio(Some(summary.win_loss_ratio)));
    let _ = writeln!(out, "Max Consecutive Wins:   {}", summary.max_consecutive_wins);
    let _ = writeln!(out, "Max Consecutive Losses: {}", summary.max_consecutive_losses);
    out
}

pub fn render_execution(outcomes: &BTreeMap<String, ExecutionOutcome>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", "ORDER EXECUTION".white().bold());
    for (ticker, outcome) in outcomes {
        let text = outcome.to_string();
        let painted = match outcome {
            ExecutionOutcome::Submitted { .. } => text.green(),
            ExecutionOutcome::Error { .. } => text.red(),
            ExecutionOutcome::Skipped { .. } => text.yellow(),
            ExecutionOutcome::NoAction => text.bright_black(),
        };
        let _ = writeln!(out, "  {:<6} {painted}", ticker.cyan());
    }
    out
}

/// Which credentials are set; values are never shown.
pub fn render_credentials(status: &[CredentialStatus]) -> String {
    let mut out = String::new();
    for s in status {
        let state = if s.present {
            format!("set ({} chars)", s.length).green()
        } else {
            "not set".bright_black()
        };
        let _ = writeln!(out, "  {:<28} {state}", s.variable);
    }
    out
}

pub fn render_analysts() -> String {
    let mut out = String::new();
    for analyst in Analyst::all() {
        let _ = writeln!(out, "{:<16} {}", analyst.key().cyan(), analyst.display_name());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{BacktestRow, SummaryRow};
    use crate::domain::decision::TradingDecision;
    use crate::domain::metrics::RollingMetrics;
    use crate::domain::signal::{AnalystSignal, AnalystSignals, SignalCounts};
    use chrono::NaiveDate;

    #[test]
    fn decisions_show_signals_and_action() {
        let mut signals = AnalystSignals::new();
        signals.entry("sentiment_agent".into()).or_default().insert(
            "AAPL".into(),
            AnalystSignal::new(Signal::Bullish, 72.0, "news"),
        );
        let mut decisions = BTreeMap::new();
        decisions.insert(
            "AAPL".to_string(),
            TradingDecision {
                action: Action::Buy,
                quantity: 12,
                confidence: 72.0,
                reasoning: "positive sentiment".into(),
                order: None,
            },
        );
        let text = render_decisions(&RunResult {
            decisions,
            analyst_signals: signals,
            risk: BTreeMap::new(),
        });
        assert!(text.contains("AAPL"));
        assert!(text.contains("sentiment_agent"));
        assert!(text.contains("BULLISH"));
        assert!(text.contains("BUY"));
        assert!(text.contains("positive sentiment"));
    }

    #[test]
    fn backtest_day_has_summary_line() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let day = DayResult {
            rows: vec![BacktestRow {
                date,
                ticker: "MSFT".into(),
                action: Action::Sell,
                quantity: 3,
                price: 400.0,
                shares_owned: 0,
                position_value: 0.0,
                counts: SignalCounts { bullish: 0, bearish: 2, neutral: 0 },
            }],
            summary: SummaryRow {
                date,
                total_value: 100_500.0,
                return_pct: 0.5,
                cash_balance: 100_500.0,
                total_position_value: 0.0,
                metrics: RollingMetrics::default(),
            },
        };
        let text = render_backtest_day(&day);
        assert!(text.contains("MSFT"));
        assert!(text.contains("SELL"));
        assert!(text.contains("SUMMARY"));
        assert!(text.contains("100500.00"));
    }

    #[test]
    fn credentials_never_show_values() {
        let text = render_credentials(&[CredentialStatus {
            variable: "OPENAI_API_KEY",
            present: true,
            length: 51,
        }]);
        assert!(text.contains("OPENAI_API_KEY"));
        assert!(text.contains("51 chars"));
    }

    #[test]
    fn analysts_listed_in_display_order() {
        let text = render_analysts();
        let buffett = text.find("warren_buffett").unwrap();
        let sentiment = text.find("sentiment").unwrap();
        assert!(buffett < sentiment);
    }
}
