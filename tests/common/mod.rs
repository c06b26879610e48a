#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, Utc};
use hedgebot::domain::error::HedgeError;
use hedgebot::domain::financials::{
    CompanyNews, FinancialMetrics, InsiderTrade, LineItem, NewsSentiment,
};
use hedgebot::domain::order::{Account, BrokerPosition, OrderReceipt, OrderRequest, Quote};
use hedgebot::domain::price::{PriceBar, business_days};
use hedgebot::domain::records::{
    AnalystSignalRecord, BacktestRecord, StockMention, StockRecord, count_recent_mentions,
    hot_tickers,
};
use hedgebot::ports::broker_port::BrokerPort;
use hedgebot::ports::fundamentals_port::FundamentalsSource;
use hedgebot::ports::llm_port::LlmPort;
use hedgebot::ports::price_port::PriceSource;
use hedgebot::ports::record_store_port::RecordStore;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn tickers(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

/// One flat close per ticker on every business day.
pub struct MockPrices {
    pub closes: HashMap<String, f64>,
    pub calls: Cell<usize>,
}

impl MockPrices {
    pub fn new() -> Self {
        Self {
            closes: HashMap::new(),
            calls: Cell::new(0),
        }
    }

    pub fn with_close(mut self, ticker: &str, close: f64) -> Self {
        self.closes.insert(ticker.to_string(), close);
        self
    }
}

impl PriceSource for MockPrices {
    fn prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, HedgeError> {
        self.calls.set(self.calls.get() + 1);
        let Some(&close) = self.closes.get(ticker) else {
            return Err(HedgeError::NoData {
                ticker: ticker.to_string(),
            });
        };
        Ok(business_days(start, end)
            .into_iter()
            .map(|date| PriceBar {
                ticker: ticker.to_string(),
                date,
                open: close,
                high: close,
                low: close,
                close,
                volume: 10_000,
            })
            .collect())
    }
}

/// Canned fundamentals: news sentiment per ticker, optional metrics and line items.
#[derive(Default)]
pub struct MockFundamentals {
    pub news: HashMap<String, Vec<NewsSentiment>>,
    pub insider_shares: HashMap<String, Vec<f64>>,
    pub metrics: HashMap<String, Vec<FinancialMetrics>>,
    pub line_items: HashMap<String, Vec<LineItem>>,
    pub market_caps: HashMap<String, f64>,
}

impl MockFundamentals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_news(mut self, ticker: &str, sentiment: NewsSentiment, count: usize) -> Self {
        self.news
            .entry(ticker.to_string())
            .or_default()
            .extend(std::iter::repeat_n(sentiment, count));
        self
    }

    pub fn with_insider_trades(mut self, ticker: &str, shares: &[f64]) -> Self {
        self.insider_shares
            .insert(ticker.to_string(), shares.to_vec());
        self
    }
}

impl FundamentalsSource for MockFundamentals {
    fn financial_metrics(
        &self,
        ticker: &str,
        _end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<FinancialMetrics>, HedgeError> {
        let mut rows = self.metrics.get(ticker).cloned().unwrap_or_default();
        rows.truncate(limit);
        Ok(rows)
    }

    fn line_items(
        &self,
        ticker: &str,
        _end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<LineItem>, HedgeError> {
        let mut rows = self.line_items.get(ticker).cloned().unwrap_or_default();
        rows.truncate(limit);
        Ok(rows)
    }

    fn market_cap(&self, ticker: &str, _end_date: NaiveDate) -> Result<Option<f64>, HedgeError> {
        Ok(self.market_caps.get(ticker).copied())
    }

    fn insider_trades(
        &self,
        ticker: &str,
        _start_date: Option<NaiveDate>,
        end_date: NaiveDate,
        _limit: usize,
    ) -> Result<Vec<InsiderTrade>, HedgeError> {
        Ok(self
            .insider_shares
            .get(ticker)
            .map(|shares| {
                shares
                    .iter()
                    .map(|&s| InsiderTrade {
                        ticker: ticker.to_string(),
                        name: Some("Insider".into()),
                        title: Some("Director".into()),
                        is_board_director: Some(true),
                        transaction_date: Some(end_date),
                        transaction_shares: Some(s),
                        transaction_price_per_share: Some(10.0),
                        transaction_value: Some(s * 10.0),
                        shares_owned_before_transaction: None,
                        shares_owned_after_transaction: None,
                        filing_date: end_date,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn company_news(
        &self,
        ticker: &str,
        _start_date: Option<NaiveDate>,
        end_date: NaiveDate,
        _limit: usize,
    ) -> Result<Vec<CompanyNews>, HedgeError> {
        Ok(self
            .news
            .get(ticker)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .map(|(i, &sentiment)| CompanyNews {
                        ticker: ticker.to_string(),
                        title: format!("{ticker} headline {i}"),
                        author: "Reporter".into(),
                        source: "Wire".into(),
                        date: end_date,
                        url: format!("https://news.test/{ticker}/{i}"),
                        sentiment: Some(sentiment),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Answers the portfolio manager with `manager` and analysts with `analyst`.
pub struct MockLlm {
    pub manager: Result<Value, String>,
    pub analyst: Value,
    pub prompts: RefCell<Vec<String>>,
}

impl MockLlm {
    pub fn new(manager: Value) -> Self {
        Self {
            manager: Ok(manager),
            analyst: serde_json::json!({
                "signal": "neutral",
                "confidence": 50.0,
                "reasoning": "fairly priced"
            }),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            manager: Err(reason.to_string()),
            ..Self::new(Value::Null)
        }
    }
}

impl LlmPort for MockLlm {
    fn complete_json(&self, system: &str, user: &str) -> Result<Value, HedgeError> {
        self.prompts.borrow_mut().push(user.to_string());
        if system.contains("portfolio manager") {
            self.manager.clone().map_err(|reason| HedgeError::Llm { reason })
        } else {
            Ok(self.analyst.clone())
        }
    }
}

/// Broker with a fixed account, positions and price; records submitted orders.
pub struct MockBroker {
    pub account: Account,
    pub positions: Vec<BrokerPosition>,
    pub price: f64,
    pub reject: Option<String>,
    pub submitted: RefCell<Vec<OrderRequest>>,
}

impl MockBroker {
    pub fn new(cash: f64, price: f64) -> Self {
        Self {
            account: Account {
                status: "ACTIVE".into(),
                cash,
                buying_power: cash * 2.0,
                equity: cash,
            },
            positions: Vec::new(),
            price,
            reject: None,
            submitted: RefCell::new(Vec::new()),
        }
    }

    pub fn with_position(mut self, symbol: &str, qty: i64) -> Self {
        self.positions.push(BrokerPosition {
            symbol: symbol.into(),
            qty,
            avg_entry_price: self.price,
            cost_basis: qty as f64 * self.price,
            market_value: qty as f64 * self.price,
        });
        self
    }
}

impl BrokerPort for MockBroker {
    fn account(&self) -> Result<Account, HedgeError> {
        Ok(self.account.clone())
    }

    fn positions(&self) -> Result<Vec<BrokerPosition>, HedgeError> {
        Ok(self.positions.clone())
    }

    fn latest_trade_price(&self, _symbol: &str) -> Result<f64, HedgeError> {
        Ok(self.price)
    }

    fn latest_quote(&self, _symbol: &str) -> Result<Quote, HedgeError> {
        Ok(Quote {
            bid_price: self.price - 0.01,
            ask_price: self.price,
        })
    }

    fn submit_order(&self, order: &OrderRequest) -> Result<OrderReceipt, HedgeError> {
        if let Some(reason) = &self.reject {
            return Err(HedgeError::Broker {
                reason: reason.clone(),
            });
        }
        self.submitted.borrow_mut().push(order.clone());
        Ok(OrderReceipt {
            id: format!("order-{}", self.submitted.borrow().len()),
            status: "accepted".into(),
            filled_qty: None,
            filled_avg_price: None,
        })
    }
}

/// In-memory record store with the same upsert keys as the database tables.
#[derive(Default)]
pub struct MemoryStore {
    pub backtests: RefCell<Vec<BacktestRecord>>,
    pub signals: RefCell<Vec<AnalystSignalRecord>>,
    pub stocks: RefCell<Vec<StockRecord>>,
    pub mentions: RefCell<Vec<StockMention>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn store_backtest_record(&self, record: &BacktestRecord) -> Result<(), HedgeError> {
        let mut rows = self.backtests.borrow_mut();
        rows.retain(|r| !(r.date == record.date && r.ticker == record.ticker));
        rows.push(record.clone());
        Ok(())
    }

    fn backtest_records(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BacktestRecord>, HedgeError> {
        Ok(self
            .backtests
            .borrow()
            .iter()
            .filter(|r| r.ticker == ticker && r.date >= start && r.date <= end)
            .cloned()
            .collect())
    }

    fn store_analyst_signals(&self, records: &[AnalystSignalRecord]) -> Result<(), HedgeError> {
        let mut rows = self.signals.borrow_mut();
        for record in records {
            rows.retain(|r| {
                !(r.date == record.date && r.ticker == record.ticker && r.analyst == record.analyst)
            });
            rows.push(record.clone());
        }
        Ok(())
    }

    fn analyst_signals(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AnalystSignalRecord>, HedgeError> {
        Ok(self
            .signals
            .borrow()
            .iter()
            .filter(|r| r.ticker == ticker && r.date >= start && r.date <= end)
            .cloned()
            .collect())
    }

    fn record_mention(
        &self,
        ticker: &str,
        name: &str,
        at: DateTime<Utc>,
        window_days: i64,
    ) -> Result<StockRecord, HedgeError> {
        self.mentions.borrow_mut().push(StockMention {
            ticker: ticker.to_string(),
            mentioned_at: at,
        });
        let count = count_recent_mentions(&self.mentions.borrow(), ticker, at, window_days);
        let mut stocks = self.stocks.borrow_mut();
        let stock = match stocks.iter_mut().find(|s| s.ticker == ticker) {
            Some(s) => s,
            None => {
                stocks.push(StockRecord {
                    ticker: ticker.to_string(),
                    name: name.to_string(),
                    created_at: at,
                    updated_at: at,
                    last_mentioned: None,
                    mention_count_7d: 0,
                });
                stocks.last_mut().unwrap()
            }
        };
        stock.last_mentioned = Some(at);
        stock.updated_at = at;
        stock.mention_count_7d = count;
        Ok(stock.clone())
    }

    fn stocks(&self) -> Result<Vec<StockRecord>, HedgeError> {
        Ok(self.stocks.borrow().clone())
    }

    fn hot_stocks(&self, limit: usize) -> Result<Vec<String>, HedgeError> {
        Ok(hot_tickers(&self.stocks.borrow(), limit))
    }

    fn recount_mentions(
        &self,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Result<Vec<StockRecord>, HedgeError> {
        let mentions = self.mentions.borrow();
        for stock in self.stocks.borrow_mut().iter_mut() {
            stock.mention_count_7d =
                count_recent_mentions(&mentions, &stock.ticker, now, window_days);
            stock.updated_at = now;
        }
        self.stocks()
    }

    fn verify(&self) -> Result<(), HedgeError> {
        let probe = BacktestRecord::probe("memory");
        self.store_backtest_record(&probe)?;
        self.backtests.borrow_mut().retain(|r| r.ticker != probe.ticker);
        Ok(())
    }
}

pub fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}
