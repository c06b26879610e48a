//! Company fundamentals, insider activity and news.

use chrono::NaiveDate;

use crate::domain::error::HedgeError;
use crate::domain::financials::{CompanyNews, FinancialMetrics, InsiderTrade, LineItem};

/// Every list is ordered newest first and truncated to `limit`.
pub trait FundamentalsSource {
    fn financial_metrics(
        &self,
        ticker: &str,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<FinancialMetrics>, HedgeError>;

    fn line_items(
        &self,
        ticker: &str,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<LineItem>, HedgeError>;

    fn market_cap(&self, ticker: &str, end_date: NaiveDate) -> Result<Option<f64>, HedgeError>;

    fn insider_trades(
        &self,
        ticker: &str,
        start_date: Option<NaiveDate>,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<InsiderTrade>, HedgeError>;

    fn company_news(
        &self,
        ticker: &str,
        start_date: Option<NaiveDate>,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<CompanyNews>, HedgeError>;
}
