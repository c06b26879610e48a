//! Fundamental data types and the derivations shared by every data source.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub ticker: String,
    pub report_period: NaiveDate,
    pub period: String,
    pub currency: String,
    pub return_on_equity: Option<f64>,
    pub net_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub book_value_growth: Option<f64>,
    pub market_cap: Option<f64>,
    pub price_to_earnings_ratio: Option<f64>,
    pub price_to_book_ratio: Option<f64>,
    pub price_to_sales_ratio: Option<f64>,
    pub current_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub earnings_per_share: Option<f64>,
    pub free_cash_flow_per_share: Option<f64>,
}

/// Trailing-twelve-month statement values for one reporting period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub ticker: String,
    pub report_period: NaiveDate,
    pub capital_expenditure: Option<f64>,
    pub depreciation_and_amortization: Option<f64>,
    pub net_income: Option<f64>,
    pub outstanding_shares: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderTrade {
    pub ticker: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub is_board_director: Option<bool>,
    pub transaction_date: Option<NaiveDate>,
    pub transaction_shares: Option<f64>,
    pub transaction_price_per_share: Option<f64>,
    pub transaction_value: Option<f64>,
    pub shares_owned_before_transaction: Option<f64>,
    pub shares_owned_after_transaction: Option<f64>,
    pub filing_date: NaiveDate,
}

impl InsiderTrade {
    /// Transaction date, or the filing date when the transaction date is unknown.
    pub fn effective_date(&self) -> NaiveDate {
        self.transaction_date.unwrap_or(self.filing_date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsSentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyNews {
    pub ticker: String,
    pub title: String,
    pub author: String,
    pub source: String,
    pub date: NaiveDate,
    pub url: String,
    pub sentiment: Option<NewsSentiment>,
}

const DIRECTOR_KEYWORDS: [&str; 4] = ["director", "board member", "chairman", "vice chairman"];

pub fn safe_ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// (current - previous) / |previous|
pub fn growth(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    match (current, previous) {
        (Some(c), Some(p)) if p != 0.0 => Some((c - p) / p.abs()),
        _ => None,
    }
}

pub fn fcf_per_share(
    operating_cash_flow: Option<f64>,
    capital_expenditure: Option<f64>,
    shares: Option<f64>,
) -> Option<f64> {
    match (operating_cash_flow, capital_expenditure, shares) {
        (Some(ocf), Some(capex), Some(s)) if s != 0.0 => Some((ocf - capex) / s),
        _ => None,
    }
}

/// Lenient numeric parse for report fields ("None", "" and garbage become `None`).
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "None" {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Statement line-item parse: like [`parse_number`] but a reported zero counts as missing.
pub fn parse_amount(value: &str) -> Option<f64> {
    parse_number(value).filter(|v| *v != 0.0)
}

/// Sum of exactly four quarterly values, `None` if any is missing.
pub fn ttm_sum(quarters: &[Option<f64>]) -> Option<f64> {
    if quarters.len() < 4 {
        return None;
    }
    quarters[..4].iter().copied().sum()
}

/// Projects a missing latest-quarter value from the trend of the four quarters before it.
///
/// `quarters[0]` is the quarter being estimated; `quarters[1..5]` must all be present.
/// The result is rounded to the nearest thousand.
pub fn interpolate_quarter(quarters: &[Option<f64>]) -> Option<f64> {
    if quarters.len() < 5 {
        return None;
    }
    let previous: Vec<f64> = quarters[1..5].iter().copied().collect::<Option<Vec<f64>>>()?;
    let changes: Vec<f64> = previous.windows(2).map(|w| w[0] - w[1]).collect();
    let avg_change = changes.iter().sum::<f64>() / changes.len() as f64;
    Some(((previous[0] + avg_change) / 1000.0).round() * 1000.0)
}

/// TTM depreciation: interpolates only the newest quarter when it is missing.
pub fn ttm_depreciation(quarters: &[Option<f64>]) -> Option<f64> {
    if quarters.len() < 4 {
        return None;
    }
    match quarters[0] {
        Some(_) => ttm_sum(quarters),
        None => {
            let first = interpolate_quarter(quarters)?;
            let rest: Option<f64> = quarters[1..4].iter().copied().sum();
            Some(first + rest?)
        }
    }
}

pub fn is_board_director(title: Option<&str>) -> Option<bool> {
    let title = title.filter(|t| !t.is_empty())?.to_lowercase();
    Some(DIRECTOR_KEYWORDS.iter().any(|k| title.contains(k)))
}

pub fn sentiment_label(score: f64) -> NewsSentiment {
    if score > 0.25 {
        NewsSentiment::Positive
    } else if score < -0.25 {
        NewsSentiment::Negative
    } else {
        NewsSentiment::Neutral
    }
}
