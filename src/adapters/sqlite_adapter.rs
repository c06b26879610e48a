//! SQLite record store.

use crate::domain::error::HedgeError;
use crate::domain::records::{AnalystSignalRecord, BacktestRecord, StockRecord, hot_tickers};
use crate::ports::record_store_port::RecordStore;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rand::Rng;
use rusqlite::{Row, params};
use tracing::{debug, info};

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> HedgeError {
    HedgeError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> HedgeError {
    HedgeError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn conversion_error(len: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(len, rusqlite::types::Type::Text, Box::new(e))
}

fn read_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| conversion_error(text.len(), e))
}

fn read_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(text.len(), e))
}

fn read_optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => read_timestamp(row, idx).map(Some),
        None => Ok(None),
    }
}

fn backtest_row(row: &Row<'_>) -> rusqlite::Result<BacktestRecord> {
    Ok(BacktestRecord {
        date: read_date(row, 0)?,
        ticker: row.get(1)?,
        action: row.get(2)?,
        quantity: row.get(3)?,
        price: row.get(4)?,
        shares_owned: row.get(5)?,
        position_value: row.get(6)?,
        bullish_count: row.get(7)?,
        bearish_count: row.get(8)?,
        neutral_count: row.get(9)?,
        total_value: row.get(10)?,
        return_pct: row.get(11)?,
        cash_balance: row.get(12)?,
        total_position_value: row.get(13)?,
    })
}

fn stock_row(row: &Row<'_>) -> rusqlite::Result<StockRecord> {
    Ok(StockRecord {
        ticker: row.get(0)?,
        name: row.get(1)?,
        created_at: read_timestamp(row, 2)?,
        updated_at: read_timestamp(row, 3)?,
        last_mentioned: read_optional_timestamp(row, 4)?,
        mention_count_7d: row.get(5)?,
    })
}

const STOCK_COLUMNS: &str =
    "ticker, name, created_at, updated_at, last_mentioned, mention_count_7d";

impl SqliteAdapter {
    pub fn new(path: &str, pool_size: u32) -> Result<Self, HedgeError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, HedgeError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, HedgeError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), HedgeError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS backtest_records (
                    date TEXT NOT NULL,
                    ticker TEXT NOT NULL,
                    action TEXT NOT NULL,
                    quantity INTEGER NOT NULL,
                    price REAL NOT NULL,
                    shares_owned INTEGER NOT NULL,
                    position_value REAL NOT NULL,
                    bullish_count INTEGER NOT NULL,
                    bearish_count INTEGER NOT NULL,
                    neutral_count INTEGER NOT NULL,
                    total_value REAL NOT NULL,
                    return_pct REAL NOT NULL,
                    cash_balance REAL NOT NULL,
                    total_position_value REAL NOT NULL,
                    PRIMARY KEY (date, ticker)
                );
                CREATE TABLE IF NOT EXISTS analyst_signals (
                    date TEXT NOT NULL,
                    ticker TEXT NOT NULL,
                    analyst TEXT NOT NULL,
                    signal TEXT NOT NULL,
                    confidence REAL NOT NULL,
                    PRIMARY KEY (date, ticker, analyst)
                );
                CREATE TABLE IF NOT EXISTS stocks (
                    ticker TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    last_mentioned TEXT,
                    mention_count_7d INTEGER NOT NULL DEFAULT 0
                );
                CREATE TABLE IF NOT EXISTS stock_mentions (
                    ticker TEXT NOT NULL,
                    mentioned_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_backtest_ticker ON backtest_records(ticker);
                CREATE INDEX IF NOT EXISTS idx_mentions_ticker ON stock_mentions(ticker, mentioned_at);",
            )
            .map_err(query_error)
    }

    fn delete_backtest_record(&self, date: NaiveDate, ticker: &str) -> Result<(), HedgeError> {
        self.conn()?
            .execute(
                "DELETE FROM backtest_records WHERE date = ?1 AND ticker = ?2",
                params![date_str(date), ticker],
            )
            .map_err(query_error)?;
        Ok(())
    }

    fn mention_count(
        conn: &rusqlite::Connection,
        ticker: &str,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Result<u32, HedgeError> {
        let cutoff = (now - Duration::days(window_days)).to_rfc3339();
        conn.query_row(
            "SELECT COUNT(*) FROM stock_mentions WHERE ticker = ?1 AND mentioned_at > ?2",
            params![ticker, cutoff],
            |row| row.get(0),
        )
        .map_err(query_error)
    }
}

impl RecordStore for SqliteAdapter {
    fn store_backtest_record(&self, record: &BacktestRecord) -> Result<(), HedgeError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO backtest_records (
                    date, ticker, action, quantity, price, shares_owned, position_value,
                    bullish_count, bearish_count, neutral_count, total_value, return_pct,
                    cash_balance, total_position_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    date_str(record.date),
                    record.ticker,
                    record.action,
                    record.quantity,
                    record.price,
                    record.shares_owned,
                    record.position_value,
                    record.bullish_count,
                    record.bearish_count,
                    record.neutral_count,
                    record.total_value,
                    record.return_pct,
                    record.cash_balance,
                    record.total_position_value
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }

    fn backtest_records(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BacktestRecord>, HedgeError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, ticker, action, quantity, price, shares_owned, position_value,
                        bullish_count, bearish_count, neutral_count, total_value, return_pct,
                        cash_balance, total_position_value
                 FROM backtest_records
                 WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![ticker, date_str(start), date_str(end)], backtest_row)
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn store_analyst_signals(&self, records: &[AnalystSignalRecord]) -> Result<(), HedgeError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        for record in records {
            tx.execute(
                "INSERT OR REPLACE INTO analyst_signals (date, ticker, analyst, signal, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    date_str(record.date),
                    record.ticker,
                    record.analyst,
                    record.signal,
                    record.confidence
                ],
            )
            .map_err(query_error)?;
        }
        tx.commit().map_err(query_error)
    }

    fn analyst_signals(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AnalystSignalRecord>, HedgeError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, ticker, analyst, signal, confidence FROM analyst_signals
                 WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC, analyst ASC",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![ticker, date_str(start), date_str(end)], |row| {
                Ok(AnalystSignalRecord {
                    date: read_date(row, 0)?,
                    ticker: row.get(1)?,
                    analyst: row.get(2)?,
                    signal: row.get(3)?,
                    confidence: row.get(4)?,
                })
            })
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn record_mention(
        &self,
        ticker: &str,
        name: &str,
        at: DateTime<Utc>,
        window_days: i64,
    ) -> Result<StockRecord, HedgeError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        let stamp = at.to_rfc3339();
        tx.execute(
            "INSERT INTO stocks (ticker, name, created_at, updated_at, last_mentioned, mention_count_7d)
             VALUES (?1, ?2, ?3, ?3, ?3, 0)
             ON CONFLICT(ticker) DO UPDATE SET
                updated_at = excluded.updated_at,
                last_mentioned = MAX(COALESCE(stocks.last_mentioned, ''), excluded.last_mentioned)",
            params![ticker, name, stamp],
        )
        .map_err(query_error)?;
        tx.execute(
            "INSERT INTO stock_mentions (ticker, mentioned_at) VALUES (?1, ?2)",
            params![ticker, stamp],
        )
        .map_err(query_error)?;
        let count = Self::mention_count(&tx, ticker, at, window_days)?;
        tx.execute(
            "UPDATE stocks SET mention_count_7d = ?2 WHERE ticker = ?1",
            params![ticker, count],
        )
        .map_err(query_error)?;
        let record = tx
            .query_row(
                &format!("SELECT {STOCK_COLUMNS} FROM stocks WHERE ticker = ?1"),
                params![ticker],
                stock_row,
            )
            .map_err(query_error)?;
        tx.commit().map_err(query_error)?;
        debug!(ticker, count, "mention recorded");
        Ok(record)
    }

    fn stocks(&self) -> Result<Vec<StockRecord>, HedgeError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {STOCK_COLUMNS} FROM stocks ORDER BY ticker ASC"))
            .map_err(query_error)?;
        let rows = stmt.query_map([], stock_row).map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn hot_stocks(&self, limit: usize) -> Result<Vec<String>, HedgeError> {
        Ok(hot_tickers(&self.stocks()?, limit))
    }

    fn recount_mentions(
        &self,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Result<Vec<StockRecord>, HedgeError> {
        let tickers: Vec<String> = self.stocks()?.into_iter().map(|s| s.ticker).collect();
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        let stamp = now.to_rfc3339();
        for ticker in &tickers {
            let count = Self::mention_count(&tx, ticker, now, window_days)?;
            tx.execute(
                "UPDATE stocks SET mention_count_7d = ?2, updated_at = ?3 WHERE ticker = ?1",
                params![ticker, count, stamp],
            )
            .map_err(query_error)?;
        }
        tx.commit().map_err(query_error)?;
        drop(conn);
        info!(stocks = tickers.len(), "mention counts updated");
        self.stocks()
    }

    fn verify(&self) -> Result<(), HedgeError> {
        let tag = format!("TEST_{}", rand::thread_rng().gen_range(1000..10000));
        let probe = BacktestRecord::probe(&tag);
        self.store_backtest_record(&probe)?;
        let found = self.has_backtest_record(probe.date, &tag)?;
        self.delete_backtest_record(probe.date, &tag)?;
        if !found {
            return Err(HedgeError::Database {
                reason: format!("probe record {tag} was not readable after insert"),
            });
        }
        let stocks: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM stocks", [], |row| row.get(0))
            .map_err(query_error)?;
        info!(probe = %tag, stocks, "sqlite store verified");
        Ok(())
    }
}
