//! HTML backtest report implementing ReportPort.
//!
//! Renders an Askama template with inline SVG charts, the performance
//! summary, monthly returns, final holdings and the daily trade log.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use askama::Template;
use chrono::Datelike;

use super::chart_svg;
use crate::domain::backtest::BacktestResult;
use crate::domain::decision::Action;
use crate::domain::error::HedgeError;
use crate::domain::metrics::EquityPoint;
use crate::ports::report_port::ReportPort;

struct MonthlyReturnRow {
    year: i32,
    months: Vec<String>,
}

struct StatRow {
    label: &'static str,
    value: String,
}

struct TradeRow {
    date: String,
    ticker: String,
    action: String,
    quantity: i64,
    price: String,
    shares_owned: i64,
    position_value: String,
    signals: String,
}

struct HoldingRow {
    ticker: String,
    shares: i64,
    cost_basis: String,
    realized_gains: String,
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate {
    tickers: String,
    start_date: String,
    end_date: String,
    stats: Vec<StatRow>,
    value_svg: String,
    drawdown_svg: String,
    monthly_returns: Vec<MonthlyReturnRow>,
    holdings: Vec<HoldingRow>,
    cash: String,
    trades: Vec<TradeRow>,
}

fn compute_monthly_returns(curve: &[EquityPoint]) -> Vec<MonthlyReturnRow> {
    if curve.len() < 2 {
        return Vec::new();
    }

    let mut monthly: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for window in curve.windows(2) {
        let (prev, curr) = (&window[0], &window[1]);
        let daily = if prev.value > 0.0 {
            (curr.value - prev.value) / prev.value
        } else {
            0.0
        };
        let key = (curr.date.year(), curr.date.month());
        let compounded = monthly.entry(key).or_insert(0.0);
        *compounded += (1.0 + daily).ln();
    }

    let min_year = monthly.keys().map(|k| k.0).min().unwrap_or_default();
    let max_year = monthly.keys().map(|k| k.0).max().unwrap_or_default();
    (min_year..=max_year)
        .map(|year| MonthlyReturnRow {
            year,
            months: (1..=12u32)
                .map(|month| {
                    monthly
                        .get(&(year, month))
                        .map(|log_sum| format!("{:.2}%", (log_sum.exp() - 1.0) * 100.0))
                        .unwrap_or_default()
                })
                .collect(),
        })
        .collect()
}

fn ratio(value: f64) -> String {
    if value.is_infinite() {
        "∞".to_string()
    } else {
        format!("{value:.2}")
    }
}

fn stats(result: &BacktestResult) -> Vec<StatRow> {
    let s = &result.summary;
    vec![
        StatRow { label: "Initial Capital", value: format!("{:.2}", s.initial_capital) },
        StatRow { label: "Final Value", value: format!("{:.2}", s.final_value) },
        StatRow { label: "Total Return", value: format!("{:.2}%", s.total_return_pct) },
        StatRow { label: "Realized Gains", value: format!("{:.2}", s.total_realized_gains) },
        StatRow { label: "Sharpe Ratio", value: ratio(s.sharpe_ratio) },
        StatRow {
            label: "Max Drawdown",
            value: match s.max_drawdown_date {
                Some(date) => format!("{:.2}% on {date}", s.max_drawdown_pct),
                None => format!("{:.2}%", s.max_drawdown_pct),
            },
        },
        StatRow { label: "Win Rate", value: format!("{:.2}%", s.win_rate_pct) },
        StatRow { label: "Win/Loss Ratio", value: ratio(s.win_loss_ratio) },
        StatRow { label: "Max Consecutive Wins", value: s.max_consecutive_wins.to_string() },
        StatRow { label: "Max Consecutive Losses", value: s.max_consecutive_losses.to_string() },
    ]
}

fn trades(result: &BacktestResult) -> Vec<TradeRow> {
    result
        .days
        .iter()
        .flat_map(|day| day.rows.iter())
        .filter(|row| row.action != Action::Hold && row.quantity > 0)
        .map(|row| TradeRow {
            date: row.date.to_string(),
            ticker: row.ticker.clone(),
            action: row.action.as_str().to_uppercase(),
            quantity: row.quantity,
            price: format!("{:.2}", row.price),
            shares_owned: row.shares_owned,
            position_value: format!("{:.2}", row.position_value),
            signals: format!(
                "{}/{}/{}",
                row.counts.bullish, row.counts.bearish, row.counts.neutral
            ),
        })
        .collect()
}

fn holdings(result: &BacktestResult) -> Vec<HoldingRow> {
    let mut rows: Vec<HoldingRow> = result
        .portfolio
        .holdings
        .iter()
        .map(|(ticker, h)| HoldingRow {
            ticker: ticker.clone(),
            shares: h.shares,
            cost_basis: format!("{:.2}", h.cost_basis),
            realized_gains: format!("{:.2}", h.realized_gains),
        })
        .collect();
    rows.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    rows
}

pub struct HtmlReportAdapter;

impl HtmlReportAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, result: &BacktestResult) -> Result<String, HedgeError> {
        let curve = &result.equity_curve;
        let template = ReportTemplate {
            tickers: result.tickers.join(", "),
            start_date: curve.first().map(|p| p.date.to_string()).unwrap_or_default(),
            end_date: curve.last().map(|p| p.date.to_string()).unwrap_or_default(),
            stats: stats(result),
            value_svg: chart_svg::portfolio_value_svg(curve),
            drawdown_svg: chart_svg::drawdown_svg(curve),
            monthly_returns: compute_monthly_returns(curve),
            holdings: holdings(result),
            cash: format!("{:.2}", result.portfolio.cash),
            trades: trades(result),
        };
        template.render().map_err(|e| HedgeError::Report {
            reason: e.to_string(),
        })
    }
}

impl Default for HtmlReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for HtmlReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), HedgeError> {
        let html = self.render(result)?;
        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, html)?;
        tracing::info!(path = %path.display(), "backtest report written");
        Ok(())
    }
}
