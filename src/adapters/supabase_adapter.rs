//! Supabase record store over the PostgREST API.
//!
//! Writes are upserts (`Prefer: resolution=merge-duplicates`) keyed by each
//! table's natural key; reads use PostgREST filter syntax.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::credentials::Secret;
use super::http::{build_client, join_url, json_response, transport_error};
use crate::domain::error::HedgeError;
use crate::domain::records::{
    AnalystSignalRecord, BacktestRecord, StockMention, StockRecord, count_recent_mentions,
};
use crate::ports::record_store_port::RecordStore;

const SERVICE: &str = "supabase";

pub struct SupabaseAdapter {
    client: Client,
    url: String,
    key: Secret,
}

fn store_error(err: HedgeError) -> HedgeError {
    match err {
        HedgeError::Api { reason, .. } => HedgeError::Database { reason },
        other => other,
    }
}

fn rows<T: DeserializeOwned>(body: Value) -> Result<Vec<T>, HedgeError> {
    match body {
        Value::Null => Ok(Vec::new()),
        other => serde_json::from_value(other).map_err(|e| HedgeError::DatabaseQuery {
            reason: format!("unexpected row shape: {e}"),
        }),
    }
}

impl SupabaseAdapter {
    pub fn new(url: &Secret, key: Secret) -> Result<Self, HedgeError> {
        Ok(SupabaseAdapter {
            client: build_client(SERVICE)?,
            url: url.expose().to_string(),
            key,
        })
    }

    fn table_url(&self, table: &str) -> String {
        join_url(&self.url, &format!("/rest/v1/{table}"))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.key.expose())
            .bearer_auth(self.key.expose())
    }

    fn send(&self, request: RequestBuilder) -> Result<Value, HedgeError> {
        let response = self
            .authorized(request)
            .send()
            .map_err(|e| transport_error(SERVICE, e))?;
        json_response(SERVICE, response).map_err(store_error)
    }

    fn upsert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        on_conflict: &str,
        body: &T,
    ) -> Result<(), HedgeError> {
        self.send(
            self.client
                .post(self.table_url(table))
                .query(&[("on_conflict", on_conflict)])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(body),
        )?;
        Ok(())
    }

    fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>, HedgeError> {
        let body = self.send(
            self.client
                .get(self.table_url(table))
                .query(&[("select", "*")])
                .query(filters),
        )?;
        rows(body)
    }

    fn stock(&self, ticker: &str) -> Result<Option<StockRecord>, HedgeError> {
        Ok(self
            .select::<StockRecord>("stocks", &[("ticker", format!("eq.{ticker}"))])?
            .into_iter()
            .next())
    }

    fn mentions_since(
        &self,
        ticker: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<StockMention>, HedgeError> {
        self.select(
            "stock_mentions",
            &[
                ("ticker", format!("eq.{ticker}")),
                ("mentioned_at", format!("gt.{}", cutoff.to_rfc3339())),
            ],
        )
    }
}

impl RecordStore for SupabaseAdapter {
    fn store_backtest_record(&self, record: &BacktestRecord) -> Result<(), HedgeError> {
        self.upsert("backtest_records", "date,ticker", record)
    }

    fn backtest_records(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BacktestRecord>, HedgeError> {
        self.select(
            "backtest_records",
            &[
                ("ticker", format!("eq.{ticker}")),
                ("date", format!("gte.{start}")),
                ("date", format!("lte.{end}")),
                ("order", "date.asc".to_string()),
            ],
        )
    }

    fn store_analyst_signals(&self, records: &[AnalystSignalRecord]) -> Result<(), HedgeError> {
        if records.is_empty() {
            return Ok(());
        }
        self.upsert("analyst_signals", "date,ticker,analyst", records)
    }

    fn analyst_signals(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AnalystSignalRecord>, HedgeError> {
        self.select(
            "analyst_signals",
            &[
                ("ticker", format!("eq.{ticker}")),
                ("date", format!("gte.{start}")),
                ("date", format!("lte.{end}")),
                ("order", "date.asc,analyst.asc".to_string()),
            ],
        )
    }

    fn record_mention(
        &self,
        ticker: &str,
        name: &str,
        at: DateTime<Utc>,
        window_days: i64,
    ) -> Result<StockRecord, HedgeError> {
        let existing = self.stock(ticker)?;
        self.send(
            self.client
                .post(self.table_url("stock_mentions"))
                .header("Prefer", "return=minimal")
                .json(&json!({ "ticker": ticker, "mentioned_at": at })),
        )?;
        let mentions = self.mentions_since(ticker, at - Duration::days(window_days))?;
        let record = StockRecord {
            ticker: ticker.to_string(),
            name: name.to_string(),
            created_at: existing.as_ref().map(|s| s.created_at).unwrap_or(at),
            updated_at: at,
            last_mentioned: Some(
                existing
                    .as_ref()
                    .and_then(|s| s.last_mentioned)
                    .map_or(at, |prev| prev.max(at)),
            ),
            mention_count_7d: count_recent_mentions(&mentions, ticker, at, window_days),
        };
        self.upsert("stocks", "ticker", &record)?;
        debug!(ticker, count = record.mention_count_7d, "mention recorded");
        Ok(record)
    }

    fn stocks(&self) -> Result<Vec<StockRecord>, HedgeError> {
        self.select("stocks", &[("order", "ticker.asc".to_string())])
    }

    fn hot_stocks(&self, limit: usize) -> Result<Vec<String>, HedgeError> {
        let hot: Vec<StockRecord> = self.select(
            "stocks",
            &[
                ("order", "mention_count_7d.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        Ok(hot.into_iter().map(|s| s.ticker).collect())
    }

    fn recount_mentions(
        &self,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Result<Vec<StockRecord>, HedgeError> {
        let cutoff = now - Duration::days(window_days);
        let mut updated = Vec::new();
        for stock in self.stocks()? {
            let mentions = self.mentions_since(&stock.ticker, cutoff)?;
            let record = StockRecord {
                mention_count_7d: count_recent_mentions(&mentions, &stock.ticker, now, window_days),
                updated_at: now,
                ..stock
            };
            self.upsert("stocks", "ticker", &record)?;
            updated.push(record);
        }
        info!(stocks = updated.len(), "mention counts updated");
        Ok(updated)
    }

    fn verify(&self) -> Result<(), HedgeError> {
        let tag = format!("TEST_{}", rand::thread_rng().gen_range(1000..10000));
        let probe = BacktestRecord::probe(&tag);
        self.store_backtest_record(&probe)?;
        let found = self.has_backtest_record(probe.date, &tag)?;
        self.send(
            self.client
                .delete(self.table_url("backtest_records"))
                .query(&[("date", format!("eq.{}", probe.date)), ("ticker", format!("eq.{tag}"))]),
        )?;
        if !found {
            return Err(HedgeError::Database {
                reason: format!("probe record {tag} was not readable after upsert"),
            });
        }
        info!(probe = %tag, "supabase store verified");
        Ok(())
    }
}
