//! Persistence port for backtest rows, analyst signals and ticker mentions.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::error::HedgeError;
use crate::domain::records::{AnalystSignalRecord, BacktestRecord, StockRecord};

pub trait RecordStore {
    /// Inserts or replaces the row keyed by (date, ticker).
    fn store_backtest_record(&self, record: &BacktestRecord) -> Result<(), HedgeError>;

    fn backtest_records(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BacktestRecord>, HedgeError>;

    fn has_backtest_record(&self, date: NaiveDate, ticker: &str) -> Result<bool, HedgeError> {
        Ok(!self.backtest_records(ticker, date, date)?.is_empty())
    }

    /// Inserts or replaces rows keyed by (date, ticker, analyst).
    fn store_analyst_signals(&self, records: &[AnalystSignalRecord]) -> Result<(), HedgeError>;

    fn analyst_signals(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AnalystSignalRecord>, HedgeError>;

    /// Upserts the stock and logs one mention at `at`, refreshing its rolling mention count.
    fn record_mention(
        &self,
        ticker: &str,
        name: &str,
        at: DateTime<Utc>,
        window_days: i64,
    ) -> Result<StockRecord, HedgeError>;

    fn stocks(&self) -> Result<Vec<StockRecord>, HedgeError>;

    /// Tickers ordered by rolling mention count, highest first.
    fn hot_stocks(&self, limit: usize) -> Result<Vec<String>, HedgeError>;

    /// Recomputes every stock's mention count over the trailing window.
    fn recount_mentions(
        &self,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Result<Vec<StockRecord>, HedgeError>;

    /// Confirms the backing tables accept writes.
    fn verify(&self) -> Result<(), HedgeError>;
}
