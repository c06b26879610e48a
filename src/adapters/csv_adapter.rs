//! Offline daily prices from `<dir>/<TICKER>.csv`.
//!
//! Files carry a `date,open,high,low,close,volume` header; rows may be in any
//! order and are returned ascending.

use crate::domain::error::HedgeError;
use crate::domain::financials::{CompanyNews, FinancialMetrics, InsiderTrade, LineItem};
use crate::domain::price::PriceBar;
use crate::ports::fundamentals_port::FundamentalsSource;
use crate::ports::price_port::PriceSource;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvPriceAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker.to_uppercase()))
    }

    /// Tickers that have a price file, sorted.
    pub fn available_tickers(&self) -> Result<Vec<String>, HedgeError> {
        let entries = fs::read_dir(&self.base_path)?;
        let mut tickers = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(ticker) = name.strip_suffix(".csv") {
                tickers.push(ticker.to_string());
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}

impl PriceSource for CsvPriceAdapter {
    fn prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, HedgeError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Err(HedgeError::NoData {
                ticker: ticker.to_string(),
            });
        }
        let mut rdr = csv::Reader::from_path(&path).map_err(|e| HedgeError::InvalidInput {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| HedgeError::InvalidInput {
                reason: format!("{} row {}: {e}", path.display(), line + 1),
            })?;
            let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d").map_err(|e| {
                HedgeError::InvalidInput {
                    reason: format!("{} row {}: invalid date: {e}", path.display(), line + 1),
                }
            })?;
            if date < start || date > end {
                continue;
            }
            bars.push(PriceBar {
                ticker: ticker.to_uppercase(),
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume as i64,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

/// Fundamentals for offline runs: every lookup is empty, so analysts report neutral.
pub struct NoFundamentals;

impl FundamentalsSource for NoFundamentals {
    fn financial_metrics(&self, _: &str, _: NaiveDate, _: usize) -> Result<Vec<FinancialMetrics>, HedgeError> {
        Ok(Vec::new())
    }

    fn line_items(&self, _: &str, _: NaiveDate, _: usize) -> Result<Vec<LineItem>, HedgeError> {
        Ok(Vec::new())
    }

    fn market_cap(&self, _: &str, _: NaiveDate) -> Result<Option<f64>, HedgeError> {
        Ok(None)
    }

    fn insider_trades(
        &self,
        _: &str,
        _: Option<NaiveDate>,
        _: NaiveDate,
        _: usize,
    ) -> Result<Vec<InsiderTrade>, HedgeError> {
        Ok(Vec::new())
    }

    fn company_news(
        &self,
        _: &str,
        _: Option<NaiveDate>,
        _: NaiveDate,
        _: usize,
    ) -> Result<Vec<CompanyNews>, HedgeError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> TempDir {
        let dir = TempDir::new().unwrap();
        let csv_content = "date,open,high,low,close,volume\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n";
        fs::write(dir.path().join("AAPL.csv"), csv_content).unwrap();
        fs::write(dir.path().join("MSFT.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        dir
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn prices_are_sorted_ascending() {
        let dir = setup_test_data();
        let adapter = CsvPriceAdapter::new(dir.path());
        let bars = adapter.prices("aapl", d("2024-01-01"), d("2024-01-31")).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, d("2024-01-15"));
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000);
        assert_eq!(bars[0].ticker, "AAPL");
        assert_eq!(bars[2].date, d("2024-01-17"));
    }

    #[test]
    fn prices_filter_by_window() {
        let dir = setup_test_data();
        let adapter = CsvPriceAdapter::new(dir.path());
        let bars = adapter.prices("AAPL", d("2024-01-16"), d("2024-01-16")).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].high, 115.0);
    }

    #[test]
    fn missing_file_is_no_data() {
        let dir = setup_test_data();
        let adapter = CsvPriceAdapter::new(dir.path());
        let result = adapter.prices("XYZ", d("2024-01-01"), d("2024-01-31"));
        assert!(matches!(result, Err(HedgeError::NoData { ticker }) if ticker == "XYZ"));
    }

    #[test]
    fn malformed_row_is_invalid_input() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("BAD.csv"),
            "date,open,high,low,close,volume\n2024-01-15,abc,1,1,1,1\n",
        )
        .unwrap();
        let adapter = CsvPriceAdapter::new(dir.path());
        let result = adapter.prices("BAD", d("2024-01-01"), d("2024-01-31"));
        assert!(matches!(result, Err(HedgeError::InvalidInput { .. })));
    }

    #[test]
    fn available_tickers_lists_csv_files() {
        let dir = setup_test_data();
        let adapter = CsvPriceAdapter::new(dir.path());
        assert_eq!(adapter.available_tickers().unwrap(), vec!["AAPL", "MSFT"]);
    }
}
