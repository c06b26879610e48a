//! In-memory memoisation in front of any price and fundamentals source.
//!
//! A lookup that finds cached rows for the requested window is answered from
//! memory; otherwise the source is called and its rows merged into the cache.

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::domain::error::HedgeError;
use crate::domain::financials::{CompanyNews, FinancialMetrics, InsiderTrade, LineItem};
use crate::domain::price::PriceBar;
use crate::ports::fundamentals_port::FundamentalsSource;
use crate::ports::price_port::PriceSource;

#[derive(Default)]
struct Store {
    prices: HashMap<String, BTreeMap<NaiveDate, PriceBar>>,
    metrics: HashMap<String, BTreeMap<NaiveDate, FinancialMetrics>>,
    line_items: HashMap<String, BTreeMap<NaiveDate, LineItem>>,
    market_caps: HashMap<String, Option<f64>>,
    insider_trades: HashMap<String, Vec<InsiderTrade>>,
    news: HashMap<String, Vec<CompanyNews>>,
}

pub struct MarketCache<'a> {
    prices: &'a dyn PriceSource,
    fundamentals: &'a dyn FundamentalsSource,
    store: RefCell<Store>,
}

impl<'a> MarketCache<'a> {
    pub fn new(prices: &'a dyn PriceSource, fundamentals: &'a dyn FundamentalsSource) -> Self {
        MarketCache {
            prices,
            fundamentals,
            store: RefCell::new(Store::default()),
        }
    }
}

fn in_window(date: NaiveDate, start: Option<NaiveDate>, end: NaiveDate) -> bool {
    start.is_none_or(|s| date >= s) && date <= end
}

/// Newest-first rows up to `end`, at most `limit`.
fn newest<T: Clone>(rows: Option<&BTreeMap<NaiveDate, T>>, end: NaiveDate, limit: usize) -> Vec<T> {
    rows.map(|m| m.range(..=end).rev().take(limit).map(|(_, v)| v.clone()).collect())
        .unwrap_or_default()
}

impl PriceSource for MarketCache<'_> {
    fn prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, HedgeError> {
        if let Some(cached) = self.store.borrow().prices.get(ticker) {
            let hit: Vec<PriceBar> = cached.range(start..=end).map(|(_, b)| b.clone()).collect();
            if !hit.is_empty() {
                return Ok(hit);
            }
        }
        debug!(ticker, %start, %end, "price cache miss");
        let fetched = self.prices.prices(ticker, start, end)?;
        let mut store = self.store.borrow_mut();
        let entry = store.prices.entry(ticker.to_string()).or_default();
        for bar in &fetched {
            entry.insert(bar.date, bar.clone());
        }
        Ok(fetched)
    }
}

impl FundamentalsSource for MarketCache<'_> {
    fn financial_metrics(
        &self,
        ticker: &str,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<FinancialMetrics>, HedgeError> {
        let hit = newest(self.store.borrow().metrics.get(ticker), end_date, limit);
        if !hit.is_empty() {
            return Ok(hit);
        }
        let fetched = self.fundamentals.financial_metrics(ticker, end_date, limit)?;
        let mut store = self.store.borrow_mut();
        let entry = store.metrics.entry(ticker.to_string()).or_default();
        for m in &fetched {
            entry.insert(m.report_period, m.clone());
        }
        Ok(fetched)
    }

    fn line_items(
        &self,
        ticker: &str,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<LineItem>, HedgeError> {
        let hit = newest(self.store.borrow().line_items.get(ticker), end_date, limit);
        if !hit.is_empty() {
            return Ok(hit);
        }
        let fetched = self.fundamentals.line_items(ticker, end_date, limit)?;
        let mut store = self.store.borrow_mut();
        let entry = store.line_items.entry(ticker.to_string()).or_default();
        for item in &fetched {
            entry.insert(item.report_period, item.clone());
        }
        Ok(fetched)
    }

    fn market_cap(&self, ticker: &str, end_date: NaiveDate) -> Result<Option<f64>, HedgeError> {
        if let Some(cap) = self.store.borrow().market_caps.get(ticker) {
            return Ok(*cap);
        }
        let cap = self.fundamentals.market_cap(ticker, end_date)?;
        self.store
            .borrow_mut()
            .market_caps
            .insert(ticker.to_string(), cap);
        Ok(cap)
    }

    fn insider_trades(
        &self,
        ticker: &str,
        start_date: Option<NaiveDate>,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<InsiderTrade>, HedgeError> {
        if let Some(cached) = self.store.borrow().insider_trades.get(ticker) {
            let hit: Vec<InsiderTrade> = cached
                .iter()
                .filter(|t| in_window(t.effective_date(), start_date, end_date))
                .take(limit)
                .cloned()
                .collect();
            if !hit.is_empty() {
                return Ok(hit);
            }
        }
        let fetched = self
            .fundamentals
            .insider_trades(ticker, start_date, end_date, limit)?;
        let mut store = self.store.borrow_mut();
        let entry = store.insider_trades.entry(ticker.to_string()).or_default();
        for t in &fetched {
            if !entry.contains(t) {
                entry.push(t.clone());
            }
        }
        entry.sort_by(|a, b| b.effective_date().cmp(&a.effective_date()));
        Ok(fetched)
    }

    fn company_news(
        &self,
        ticker: &str,
        start_date: Option<NaiveDate>,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<CompanyNews>, HedgeError> {
        if let Some(cached) = self.store.borrow().news.get(ticker) {
            let hit: Vec<CompanyNews> = cached
                .iter()
                .filter(|n| in_window(n.date, start_date, end_date))
                .take(limit)
                .cloned()
                .collect();
            if !hit.is_empty() {
                return Ok(hit);
            }
        }
        let fetched = self
            .fundamentals
            .company_news(ticker, start_date, end_date, limit)?;
        let mut store = self.store.borrow_mut();
        let entry = store.news.entry(ticker.to_string()).or_default();
        for n in &fetched {
            if !entry.iter().any(|e| e.url == n.url && e.title == n.title && e.date == n.date) {
                entry.push(n.clone());
            }
        }
        entry.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[derive(Default)]
    struct Counting {
        price_calls: Cell<usize>,
        news_calls: Cell<usize>,
        cap_calls: Cell<usize>,
        line_calls: Cell<usize>,
    }

    impl PriceSource for Counting {
        fn prices(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>, HedgeError> {
            self.price_calls.set(self.price_calls.get() + 1);
            Ok(crate::domain::price::business_days(start, end)
                .into_iter()
                .map(|date| PriceBar {
                    ticker: ticker.into(),
                    date,
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1,
                })
                .collect())
        }
    }

    impl FundamentalsSource for Counting {
        fn financial_metrics(&self, _: &str, _: NaiveDate, _: usize) -> Result<Vec<FinancialMetrics>, HedgeError> {
            Ok(Vec::new())
        }
        fn line_items(&self, ticker: &str, _: NaiveDate, _: usize) -> Result<Vec<LineItem>, HedgeError> {
            self.line_calls.set(self.line_calls.get() + 1);
            Ok(vec![LineItem {
                ticker: ticker.into(),
                report_period: d("2023-12-31"),
                net_income: Some(1e6),
                ..Default::default()
            }])
        }
        fn market_cap(&self, _: &str, _: NaiveDate) -> Result<Option<f64>, HedgeError> {
            self.cap_calls.set(self.cap_calls.get() + 1);
            Ok(Some(1e9))
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
            ticker: &str,
            _: Option<NaiveDate>,
            end: NaiveDate,
            _: usize,
        ) -> Result<Vec<CompanyNews>, HedgeError> {
            self.news_calls.set(self.news_calls.get() + 1);
            Ok(vec![CompanyNews {
                ticker: ticker.into(),
                title: "t".into(),
                author: "a".into(),
                source: "s".into(),
                date: end,
                url: "u".into(),
                sentiment: None,
            }])
        }
    }

    #[test]
    fn window_inside_prefetch_is_served_from_cache() {
        let source = Counting::default();
        let cache = MarketCache::new(&source, &source);
        cache.prices("AAPL", d("2024-01-01"), d("2024-03-31")).unwrap();
        let window = cache.prices("AAPL", d("2024-02-01"), d("2024-02-29")).unwrap();
        assert_eq!(source.price_calls.get(), 1);
        assert_eq!(window.first().unwrap().date, d("2024-02-01"));
        assert!(window.iter().all(|b| b.date <= d("2024-02-29")));
    }

    #[test]
    fn window_outside_cache_calls_source() {
        let source = Counting::default();
        let cache = MarketCache::new(&source, &source);
        cache.prices("AAPL", d("2024-01-01"), d("2024-01-31")).unwrap();
        cache.prices("AAPL", d("2024-05-01"), d("2024-05-31")).unwrap();
        cache.prices("MSFT", d("2024-01-01"), d("2024-01-31")).unwrap();
        assert_eq!(source.price_calls.get(), 3);
    }

    #[test]
    fn news_and_market_cap_are_memoised() {
        let source = Counting::default();
        let cache = MarketCache::new(&source, &source);
        cache.company_news("AAPL", None, d("2024-01-10"), 10).unwrap();
        let again = cache.company_news("AAPL", Some(d("2024-01-01")), d("2024-01-31"), 10).unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(source.news_calls.get(), 1);

        cache.market_cap("AAPL", d("2024-01-10")).unwrap();
        cache.market_cap("AAPL", d("2024-02-10")).unwrap();
        assert_eq!(source.cap_calls.get(), 1);
    }

    #[test]
    fn backtest_prefetch_warms_line_items() {
        use crate::domain::backtest::{prefetch, BacktestConfig};

        let source = Counting::default();
        let cache = MarketCache::new(&source, &source);
        let config = BacktestConfig::new(vec!["AAPL".into()], d("2024-01-02"), d("2024-01-05"));
        prefetch(&cache, &cache, &config);
        assert_eq!(source.line_calls.get(), 1);

        for day in crate::domain::price::business_days(config.start_date, config.end_date) {
            let items = cache.line_items("AAPL", day, 5).unwrap();
            assert_eq!(items.len(), 1);
        }
        assert_eq!(source.line_calls.get(), 1);
    }
}
