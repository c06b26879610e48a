//! Alpha Vantage market data: daily prices, statements, insider trades and news.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::credentials::Secret;
use super::http::{build_client, join_url, json_response, transport_error};
use crate::domain::error::HedgeError;
use crate::domain::financials::{
    fcf_per_share, growth, is_board_director, parse_amount, parse_number, safe_ratio,
    sentiment_label, ttm_depreciation, ttm_sum, CompanyNews, FinancialMetrics, InsiderTrade,
    LineItem,
};
use crate::domain::price::PriceBar;
use crate::ports::fundamentals_port::FundamentalsSource;
use crate::ports::price_port::PriceSource;

const SERVICE: &str = "alpha_vantage";
const NEWS_LIMIT: usize = 200;

pub struct AlphaVantageAdapter {
    client: Client,
    base_url: String,
    api_key: Secret,
}

impl AlphaVantageAdapter {
    pub fn new(base_url: &str, api_key: Secret) -> Result<Self, HedgeError> {
        Ok(AlphaVantageAdapter {
            client: build_client(SERVICE)?,
            base_url: base_url.to_string(),
            api_key,
        })
    }

    fn query(&self, function: &str, params: &[(&str, &str)]) -> Result<Value, HedgeError> {
        debug!(function, ?params, "alpha vantage request");
        let response = self
            .client
            .get(join_url(&self.base_url, "query"))
            .query(&[("function", function)])
            .query(params)
            .query(&[("apikey", self.api_key.expose())])
            .send()
            .map_err(|e| transport_error(SERVICE, e))?;
        let body = json_response(SERVICE, response)?;
        check_payload(&body)?;
        Ok(body)
    }

    fn symbol_query(&self, function: &str, ticker: &str) -> Result<Value, HedgeError> {
        self.query(function, &[("symbol", ticker)])
    }
}

/// Alpha Vantage reports failures inside a 200 response.
fn check_payload(body: &Value) -> Result<(), HedgeError> {
    if let Some(msg) = body.get("Error Message").and_then(Value::as_str) {
        return Err(HedgeError::Api {
            service: SERVICE.to_string(),
            reason: msg.to_string(),
        });
    }
    for key in ["Note", "Information"] {
        if let Some(msg) = body.get(key).and_then(Value::as_str) {
            return Err(HedgeError::RateLimited {
                service: SERVICE.to_string(),
                message: msg.to_string(),
            });
        }
    }
    Ok(())
}

fn field(v: &Value, key: &str) -> Option<f64> {
    v.get(key).and_then(Value::as_str).and_then(parse_number)
}

fn amount(v: &Value, key: &str) -> Option<f64> {
    v.get(key).and_then(Value::as_str).and_then(parse_amount)
}

fn text(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "None")
        .map(str::to_string)
}

fn report_date(v: &Value) -> Option<NaiveDate> {
    v.get("fiscalDateEnding")
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

/// Reports under `key`, newest first, paired with their fiscal end date.
fn reports<'a>(statement: &'a Value, key: &str) -> Vec<(NaiveDate, &'a Value)> {
    let mut out: Vec<(NaiveDate, &Value)> = statement
        .get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|r| report_date(r).map(|d| (d, r))).collect())
        .unwrap_or_default();
    out.sort_by(|a, b| b.0.cmp(&a.0));
    out
}

fn matching<'a>(list: &[(NaiveDate, &'a Value)], date: NaiveDate) -> Option<&'a Value> {
    list.iter().find(|(d, _)| *d == date).map(|(_, r)| *r)
}

fn parse_day(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.get(..10)?, "%Y-%m-%d").ok()
}

/// Daily bars within `[start, end]`, oldest first.
pub fn parse_daily_prices(
    ticker: &str,
    body: &Value,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<PriceBar> {
    let Some(series) = body.get("Time Series (Daily)").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut bars: Vec<PriceBar> = series
        .iter()
        .filter_map(|(date, values)| {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            if date < start || date > end {
                return None;
            }
            let bar = PriceBar {
                ticker: ticker.to_string(),
                date,
                open: field(values, "1. open")?,
                high: field(values, "2. high")?,
                low: field(values, "3. low")?,
                close: field(values, "4. close")?,
                volume: field(values, "5. volume").unwrap_or(0.0) as i64,
            };
            Some(bar)
        })
        .collect();
    bars.sort_by_key(|b| b.date);
    bars
}

pub struct Statements<'a> {
    pub overview: &'a Value,
    pub income: &'a Value,
    pub balance: &'a Value,
    pub cash_flow: &'a Value,
}

/// Quarterly metrics up to `end`, newest first.
pub fn parse_financial_metrics(
    ticker: &str,
    s: &Statements<'_>,
    end: NaiveDate,
    limit: usize,
) -> Vec<FinancialMetrics> {
    let income = reports(s.income, "quarterlyReports");
    let balance = reports(s.balance, "quarterlyReports");
    let cash = reports(s.cash_flow, "quarterlyReports");
    let eligible: Vec<(NaiveDate, &Value)> =
        income.into_iter().filter(|(d, _)| *d <= end).take(limit).collect();

    eligible
        .iter()
        .enumerate()
        .map(|(i, (date, report))| {
            let bs = matching(&balance, *date).unwrap_or(&Value::Null);
            let cf = matching(&cash, *date).unwrap_or(&Value::Null);
            let prev = eligible.get(i + 1);
            let prev_bs = prev.and_then(|(d, _)| matching(&balance, *d));

            let revenue = field(report, "totalRevenue");
            let net_income = field(report, "netIncome");
            let equity = field(bs, "totalShareholderEquity");

            FinancialMetrics {
                ticker: ticker.to_string(),
                report_period: *date,
                period: "ttm".to_string(),
                currency: "USD".to_string(),
                return_on_equity: safe_ratio(net_income, equity),
                net_margin: safe_ratio(net_income, revenue),
                operating_margin: safe_ratio(field(report, "operatingIncome"), revenue),
                revenue_growth: growth(revenue, prev.and_then(|(_, r)| field(r, "totalRevenue"))),
                earnings_growth: growth(net_income, prev.and_then(|(_, r)| field(r, "netIncome"))),
                book_value_growth: growth(
                    equity,
                    prev_bs.and_then(|b| field(b, "totalShareholderEquity")),
                ),
                market_cap: field(s.overview, "MarketCapitalization"),
                price_to_earnings_ratio: field(s.overview, "PERatio"),
                price_to_book_ratio: field(s.overview, "PriceToBookRatio"),
                price_to_sales_ratio: field(s.overview, "PriceToSalesRatioTTM"),
                current_ratio: safe_ratio(
                    field(bs, "totalCurrentAssets"),
                    field(bs, "totalCurrentLiabilities"),
                ),
                debt_to_equity: safe_ratio(field(bs, "totalLiabilities"), equity),
                earnings_per_share: field(report, "reportedEPS"),
                free_cash_flow_per_share: fcf_per_share(
                    field(cf, "operatingCashflow"),
                    field(cf, "capitalExpenditures"),
                    field(bs, "commonStockSharesOutstanding"),
                ),
            }
        })
        .collect()
}

/// Annual periods up to `end`, each with trailing-twelve-month flows from the
/// quarters ending on or before that period.
pub fn parse_line_items(
    ticker: &str,
    s: &Statements<'_>,
    end: NaiveDate,
    limit: usize,
) -> Vec<LineItem> {
    let annual = reports(s.balance, "annualReports");
    let q_income = reports(s.income, "quarterlyReports");
    let q_cash = reports(s.cash_flow, "quarterlyReports");
    let shares = field(s.overview, "SharesOutstanding");

    let trailing = |list: &[(NaiveDate, &Value)], upto: NaiveDate, key: &str, n: usize| {
        list.iter()
            .filter(|(d, _)| *d <= upto)
            .take(n)
            .map(|(_, r)| amount(r, key))
            .collect::<Vec<Option<f64>>>()
    };

    annual
        .iter()
        .filter(|(d, _)| *d <= end)
        .take(limit)
        .map(|(date, report)| LineItem {
            ticker: ticker.to_string(),
            report_period: *date,
            capital_expenditure: ttm_sum(&trailing(&q_cash, *date, "capitalExpenditures", 4)),
            depreciation_and_amortization: ttm_depreciation(&trailing(
                &q_income,
                *date,
                "depreciationAndAmortization",
                5,
            )),
            net_income: ttm_sum(&trailing(&q_income, *date, "netIncome", 4)),
            outstanding_shares: shares,
            total_assets: amount(report, "totalAssets"),
            total_liabilities: amount(report, "totalLiabilities"),
        })
        .collect()
}

/// Signed share count: disposals (`"D"`) are negative.
fn signed_shares(row: &Value) -> Option<f64> {
    let shares = field(row, "shares")?.abs();
    match text(row, "acquisition_or_disposal").as_deref() {
        Some("D") => Some(-shares),
        _ => Some(shares),
    }
}

/// Insider trades from an `INSIDER_TRANSACTIONS` body in the window, newest first.
///
/// Rows without a transaction date are only kept when no `start` is given.
pub fn parse_insider_trades(
    ticker: &str,
    body: &Value,
    start: Option<NaiveDate>,
    end: NaiveDate,
    limit: usize,
) -> Vec<InsiderTrade> {
    let Some(rows) = body.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut trades: Vec<InsiderTrade> = rows
        .iter()
        .filter_map(|t| {
            let transaction_date = text(t, "transaction_date").and_then(|d| parse_day(&d));
            match transaction_date {
                Some(d) if start.is_some_and(|s| d < s) || d > end => return None,
                None if start.is_some() => return None,
                _ => {}
            }
            let shares = signed_shares(t);
            let price = field(t, "share_price");
            let title = text(t, "executive_title");
            Some(InsiderTrade {
                ticker: ticker.to_string(),
                name: text(t, "executive"),
                is_board_director: is_board_director(title.as_deref()),
                title,
                transaction_date,
                transaction_shares: shares,
                transaction_price_per_share: price,
                transaction_value: shares.zip(price).map(|(s, p)| s * p),
                shares_owned_before_transaction: None,
                shares_owned_after_transaction: None,
                filing_date: transaction_date.unwrap_or(end),
            })
        })
        .collect();
    trades.sort_by(|a, b| b.effective_date().cmp(&a.effective_date()));
    trades.truncate(limit);
    trades
}

fn parse_published(value: &str) -> Option<NaiveDate> {
    chrono::NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M"))
        .map(|dt| dt.date())
        .ok()
        .or_else(|| parse_day(value))
}

/// News items mentioning `ticker` in the window, newest first, labelled by the ticker's own score.
pub fn parse_company_news(
    ticker: &str,
    body: &Value,
    start: Option<NaiveDate>,
    end: NaiveDate,
    limit: usize,
) -> Vec<CompanyNews> {
    let Some(feed) = body.get("feed").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut news: Vec<CompanyNews> = feed
        .iter()
        .filter_map(|item| {
            let mention = item
                .get("ticker_sentiment")
                .and_then(Value::as_array)?
                .iter()
                .find(|ts| ts.get("ticker").and_then(Value::as_str) == Some(ticker))?;
            let date = text(item, "time_published").and_then(|t| parse_published(&t))?;
            if start.is_some_and(|s| date < s) || date > end {
                return None;
            }
            let author = item
                .get("authors")
                .and_then(Value::as_array)
                .and_then(|a| a.first())
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string();
            Some(CompanyNews {
                ticker: ticker.to_string(),
                title: text(item, "title").unwrap_or_default(),
                author,
                source: text(item, "source").unwrap_or_default(),
                date,
                url: text(item, "url").unwrap_or_default(),
                sentiment: field(mention, "ticker_sentiment_score").map(sentiment_label),
            })
        })
        .collect();
    news.sort_by(|a, b| b.date.cmp(&a.date));
    news.truncate(limit);
    news
}

impl PriceSource for AlphaVantageAdapter {
    fn prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, HedgeError> {
        let body = self.query(
            "TIME_SERIES_DAILY",
            &[("symbol", ticker), ("outputsize", "full")],
        )?;
        let bars = parse_daily_prices(ticker, &body, start, end);
        if bars.is_empty() {
            warn!(ticker, %start, %end, "no daily prices in range");
        }
        Ok(bars)
    }
}

impl AlphaVantageAdapter {
    fn statements(&self, ticker: &str) -> Result<[Value; 4], HedgeError> {
        Ok([
            self.symbol_query("OVERVIEW", ticker)?,
            self.symbol_query("INCOME_STATEMENT", ticker)?,
            self.symbol_query("BALANCE_SHEET", ticker)?,
            self.symbol_query("CASH_FLOW", ticker)?,
        ])
    }
}

impl FundamentalsSource for AlphaVantageAdapter {
    fn financial_metrics(
        &self,
        ticker: &str,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<FinancialMetrics>, HedgeError> {
        let [overview, income, balance, cash_flow] = self.statements(ticker)?;
        let s = Statements {
            overview: &overview,
            income: &income,
            balance: &balance,
            cash_flow: &cash_flow,
        };
        Ok(parse_financial_metrics(ticker, &s, end_date, limit))
    }

    fn line_items(
        &self,
        ticker: &str,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<LineItem>, HedgeError> {
        let [overview, income, balance, cash_flow] = self.statements(ticker)?;
        let s = Statements {
            overview: &overview,
            income: &income,
            balance: &balance,
            cash_flow: &cash_flow,
        };
        Ok(parse_line_items(ticker, &s, end_date, limit))
    }

    fn market_cap(&self, ticker: &str, _end_date: NaiveDate) -> Result<Option<f64>, HedgeError> {
        let overview = self.symbol_query("OVERVIEW", ticker)?;
        Ok(field(&overview, "MarketCapitalization"))
    }

    fn insider_trades(
        &self,
        ticker: &str,
        start_date: Option<NaiveDate>,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<InsiderTrade>, HedgeError> {
        let body = self.symbol_query("INSIDER_TRANSACTIONS", ticker)?;
        Ok(parse_insider_trades(ticker, &body, start_date, end_date, limit))
    }

    fn company_news(
        &self,
        ticker: &str,
        start_date: Option<NaiveDate>,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<CompanyNews>, HedgeError> {
        let fetch = limit.min(NEWS_LIMIT).to_string();
        let body = self.query(
            "NEWS_SENTIMENT",
            &[("tickers", ticker), ("sort", "LATEST"), ("limit", fetch.as_str())],
        )?;
        Ok(parse_company_news(ticker, &body, start_date, end_date, limit))
    }
}
