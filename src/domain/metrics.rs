//! Performance metrics over a daily portfolio-value curve.

use chrono::NaiveDate;
use serde::Serialize;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
/// Curves need more points than this before rolling ratios are reported.
const MIN_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Ratios reported on each backtest summary row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RollingMetrics {
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    /// Percent, zero or negative.
    pub max_drawdown: Option<f64>,
}

impl RollingMetrics {
    pub fn compute(curve: &[EquityPoint], risk_free_rate: f64) -> Self {
        if curve.len() <= MIN_POINTS {
            return RollingMetrics::default();
        }
        let returns = daily_returns(curve);
        if returns.is_empty() {
            return RollingMetrics::default();
        }

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
        let mean_excess = mean(&excess);

        let sharpe_ratio = sample_std(&excess)
            .filter(|s| *s > 0.0)
            .map(|s| TRADING_DAYS_PER_YEAR.sqrt() * mean_excess / s);

        let negatives: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        let sortino_ratio = match sample_std(&negatives).filter(|s| *s > 0.0) {
            Some(downside) => TRADING_DAYS_PER_YEAR.sqrt() * mean_excess / downside,
            None if mean_excess > 0.0 => f64::INFINITY,
            None => 0.0,
        };

        let (max_drawdown, _) = max_drawdown(curve);
        RollingMetrics {
            sharpe_ratio,
            sortino_ratio: Some(sortino_ratio),
            max_drawdown: Some(max_drawdown * 100.0),
        }
    }
}

/// End-of-run statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    pub total_realized_gains: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub max_drawdown_date: Option<NaiveDate>,
    pub win_rate_pct: f64,
    pub win_loss_ratio: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl PerformanceSummary {
    pub fn compute(
        curve: &[EquityPoint],
        total_realized_gains: f64,
        initial_capital: f64,
        risk_free_rate: f64,
    ) -> Self {
        let final_value = curve.last().map(|p| p.value).unwrap_or(initial_capital);
        let total_return_pct = if initial_capital > 0.0 {
            (final_value - initial_capital) / initial_capital * 100.0
        } else {
            0.0
        };

        let returns = daily_returns(curve);
        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let sharpe_ratio = match sample_std(&returns) {
            Some(s) if s > 0.0 => TRADING_DAYS_PER_YEAR.sqrt() * (mean(&returns) - daily_rf) / s,
            _ => 0.0,
        };

        let (max_dd, dd_date) = max_drawdown(curve);

        let wins: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
        let losses: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        let win_rate_pct = if returns.is_empty() {
            0.0
        } else {
            wins.len() as f64 / returns.len() as f64 * 100.0
        };
        let win_loss_ratio = if losses.is_empty() {
            f64::INFINITY
        } else if wins.is_empty() {
            0.0
        } else {
            mean(&wins) / mean(&losses).abs()
        };

        let (max_consecutive_wins, max_consecutive_losses) = streaks(&returns);

        PerformanceSummary {
            initial_capital,
            final_value,
            total_return_pct,
            total_realized_gains,
            sharpe_ratio,
            max_drawdown_pct: max_dd * 100.0,
            max_drawdown_date: dd_date,
            win_rate_pct,
            win_loss_ratio,
            max_consecutive_wins,
            max_consecutive_losses,
        }
    }
}

fn daily_returns(curve: &[EquityPoint]) -> Vec<f64> {
    curve
        .windows(2)
        .map(|w| {
            if w[0].value > 0.0 {
                (w[1].value - w[0].value) / w[0].value
            } else {
                0.0
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with one degree of freedom removed; `None` below two values.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Deepest fall from a running peak as a fraction (zero or negative) and the day it happened.
fn max_drawdown(curve: &[EquityPoint]) -> (f64, Option<NaiveDate>) {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    let mut worst_date = curve.first().map(|p| p.date);
    for point in curve {
        peak = peak.max(point.value);
        if peak > 0.0 {
            let dd = (point.value - peak) / peak;
            if dd < worst {
                worst = dd;
                worst_date = Some(point.date);
            }
        }
    }
    (worst, worst_date)
}

/// Longest runs of winning (> 0) and non-winning days.
fn streaks(returns: &[f64]) -> (usize, usize) {
    let mut best_win = 0;
    let mut best_loss = 0;
    let mut win = 0;
    let mut loss = 0;
    for r in returns {
        if *r > 0.0 {
            win += 1;
            loss = 0;
        } else {
            loss += 1;
            win = 0;
        }
        best_win = best_win.max(win);
        best_loss = best_loss.max(loss);
    }
    (best_win, best_loss)
}
