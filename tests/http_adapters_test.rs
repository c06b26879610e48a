//! HTTP adapters against a local mock server.

use chrono::NaiveDate;
use hedgebot::adapters::alpaca_adapter::AlpacaAdapter;
use hedgebot::adapters::alpha_vantage_adapter::AlphaVantageAdapter;
use hedgebot::adapters::credentials::Secret;
use hedgebot::adapters::openai_adapter::OpenAiAdapter;
use hedgebot::adapters::sec_ticker_adapter::SecTickerAdapter;
use hedgebot::adapters::slack_adapter::SlackAdapter;
use hedgebot::adapters::supabase_adapter::SupabaseAdapter;
use hedgebot::domain::error::HedgeError;
use hedgebot::domain::order::{OrderRequest, OrderSide};
use hedgebot::ports::broker_port::BrokerPort;
use hedgebot::ports::llm_port::LlmPort;
use hedgebot::ports::notifier_port::Notifier;
use hedgebot::ports::price_port::PriceSource;
use hedgebot::ports::record_store_port::RecordStore;
use hedgebot::ports::ticker_directory_port::TickerDirectory;
use httpmock::prelude::*;
use serde_json::json;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

mod alpha_vantage {
    use super::*;

    #[test]
    fn daily_prices_are_windowed_and_sorted() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/query")
                .query_param("function", "TIME_SERIES_DAILY")
                .query_param("symbol", "AAPL")
                .query_param("apikey", "av-key");
            then.status(200).json_body(json!({
                "Meta Data": {"2. Symbol": "AAPL"},
                "Time Series (Daily)": {
                    "2024-01-04": {"1. open": "181.0", "2. high": "182.0", "3. low": "180.0", "4. close": "181.9", "5. volume": "71983600"},
                    "2024-01-03": {"1. open": "184.2", "2. high": "185.8", "3. low": "183.4", "4. close": "184.2", "5. volume": "58414500"},
                    "2023-12-29": {"1. open": "193.9", "2. high": "194.4", "3. low": "191.7", "4. close": "192.5", "5. volume": "42628800"}
                }
            }));
        });

        let adapter = AlphaVantageAdapter::new(&server.base_url(), Secret::new("av-key")).unwrap();
        let bars = adapter.prices("AAPL", d("2024-01-01"), d("2024-01-31")).unwrap();

        mock.assert();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, d("2024-01-03"));
        assert_eq!(bars[1].close, 181.9);
        assert_eq!(bars[1].volume, 71_983_600);
    }

    #[test]
    fn rate_limit_note_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/query");
            then.status(200).json_body(json!({
                "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."
            }));
        });

        let adapter = AlphaVantageAdapter::new(&server.base_url(), Secret::new("av-key")).unwrap();
        let err = adapter.prices("AAPL", d("2024-01-01"), d("2024-01-31")).unwrap_err();
        assert!(matches!(err, HedgeError::RateLimited { .. }));
        assert!(!err.to_string().contains("av-key"));
    }
}

mod openai {
    use super::*;

    #[test]
    fn completion_content_is_parsed_as_json() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-test")
                .json_body_partial(r#"{"model": "gpt-4o", "response_format": {"type": "json_object"}}"#);
            then.status(200).json_body(json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "{\"signal\": \"bullish\", \"confidence\": 80}"}
                }]
            }));
        });

        let adapter = OpenAiAdapter::new(&server.base_url(), "gpt-4o", Secret::new("sk-test")).unwrap();
        let value = adapter.complete_json("system", "user").unwrap();

        mock.assert();
        assert_eq!(value["signal"], "bullish");
        assert_eq!(value["confidence"], 80);
    }

    #[test]
    fn server_error_is_a_model_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(500).body("overloaded");
        });

        let adapter = OpenAiAdapter::new(&server.base_url(), "gpt-4o", Secret::new("sk-test")).unwrap();
        let err = adapter.complete_json("system", "user").unwrap_err();
        match err {
            HedgeError::Llm { reason } => assert!(reason.contains("overloaded")),
            other => panic!("expected llm error, got {other:?}"),
        }
    }
}

mod alpaca {
    use super::*;

    fn adapter(server: &MockServer) -> AlpacaAdapter {
        AlpacaAdapter::new(
            &server.base_url(),
            &server.base_url(),
            Secret::new("key-id"),
            Secret::new("secret-key"),
        )
        .unwrap()
    }

    #[test]
    fn account_request_carries_key_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v2/account")
                .header("APCA-API-KEY-ID", "key-id")
                .header("APCA-API-SECRET-KEY", "secret-key");
            then.status(200).json_body(json!({
                "status": "ACTIVE",
                "cash": "2500.50",
                "buying_power": "5001.00",
                "equity": "3100.00"
            }));
        });

        let account = adapter(&server).account().unwrap();

        mock.assert();
        assert_eq!(account.cash, 2500.5);
        assert_eq!(account.buying_power, 5001.0);
        assert_eq!(account.equity, 3100.0);
    }

    #[test]
    fn limit_order_is_sent_with_string_fields() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v2/orders").json_body(json!({
                "symbol": "AAPL",
                "qty": "5",
                "side": "buy",
                "type": "limit",
                "time_in_force": "day",
                "limit_price": "187.50"
            }));
            then.status(200)
                .json_body(json!({"id": "b0b6dd9d", "status": "accepted"}));
        });

        let receipt = adapter(&server)
            .submit_order(&OrderRequest::limit("AAPL", 5, OrderSide::Buy, 187.5))
            .unwrap();

        mock.assert();
        assert_eq!(receipt.id, "b0b6dd9d");
        assert_eq!(receipt.status, "accepted");
    }

    #[test]
    fn missing_position_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v2/positions/TSLA");
            then.status(404)
                .json_body(json!({"code": 40410000, "message": "position does not exist"}));
        });

        assert_eq!(adapter(&server).position("TSLA").unwrap(), None);
    }

    #[test]
    fn rejected_order_is_a_broker_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v2/orders");
            then.status(403)
                .json_body(json!({"message": "insufficient buying power"}));
        });

        let err = adapter(&server)
            .submit_order(&OrderRequest::market("AAPL", 5, OrderSide::Buy))
            .unwrap_err();
        assert!(matches!(err, HedgeError::Broker { .. }));
        assert!(err.to_string().contains("insufficient buying power"));
    }
}

mod supabase {
    use super::*;

    fn adapter(server: &MockServer) -> SupabaseAdapter {
        SupabaseAdapter::new(&Secret::new(server.base_url()), Secret::new("service-key")).unwrap()
    }

    #[test]
    fn hot_stocks_orders_by_mention_count() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/stocks")
                .header("apikey", "service-key")
                .header("authorization", "Bearer service-key")
                .query_param("order", "mention_count_7d.desc")
                .query_param("limit", "2");
            then.status(200).json_body(json!([
                {"ticker": "GME", "name": "GameStop Corp.", "created_at": "2024-01-01T00:00:00Z",
                 "updated_at": "2024-01-08T00:00:00Z", "last_mentioned": "2024-01-08T00:00:00Z", "mention_count_7d": 12},
                {"ticker": "TSLA", "name": "Tesla, Inc.", "created_at": "2024-01-01T00:00:00Z",
                 "updated_at": "2024-01-08T00:00:00Z", "last_mentioned": null, "mention_count_7d": 4}
            ]));
        });

        let hot = adapter(&server).hot_stocks(2).unwrap();

        mock.assert();
        assert_eq!(hot, vec!["GME", "TSLA"]);
    }

    #[test]
    fn failed_upsert_is_a_database_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/rest/v1/backtest_records")
                .query_param("on_conflict", "date,ticker");
            then.status(401).json_body(json!({"message": "Invalid API key"}));
        });

        let record = hedgebot::domain::records::BacktestRecord::probe("TEST_1");
        let err = adapter(&server).store_backtest_record(&record).unwrap_err();
        assert!(matches!(err, HedgeError::Database { .. }));
    }
}

mod notifications_and_directory {
    use super::*;

    #[test]
    fn slack_posts_text_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/services/T000/B000")
                .json_body(json!({"text": "hot stocks counted"}));
            then.status(200).body("ok");
        });

        let slack = SlackAdapter::new(Secret::new(server.url("/services/T000/B000"))).unwrap();
        slack.notify("hot stocks counted").unwrap();
        mock.assert();
    }

    #[test]
    fn slack_failure_is_an_api_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/hook");
            then.status(404).body("no_service");
        });

        let slack = SlackAdapter::new(Secret::new(server.url("/hook"))).unwrap();
        assert!(matches!(slack.notify("x"), Err(HedgeError::Api { .. })));
    }

    #[test]
    fn sec_directory_is_downloaded_once() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/files/company_tickers.json");
            then.status(200).json_body(json!({
                "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
                "1": {"cik_str": 1318605, "ticker": "TSLA", "title": "Tesla, Inc."}
            }));
        });

        let directory =
            SecTickerAdapter::new(&server.url("/files/company_tickers.json"), "/nonexistent/sec.json")
                .unwrap();
        let companies = directory.companies().unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(directory.company_name("tsla").unwrap(), "Tesla, Inc.");
        assert_eq!(mock.hits(), 1);
    }
}
