//! Alpaca trading and market-data REST client.
//!
//! Alpaca encodes most numbers as strings, so every numeric field goes
//! through [`number`].

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::credentials::Secret;
use super::http::{build_client, join_url, json_response, transport_error};
use crate::domain::error::HedgeError;
use crate::domain::order::{
    Account, BrokerPosition, OrderReceipt, OrderRequest, OrderSide, OrderType, Quote, TimeInForce,
};
use crate::ports::broker_port::BrokerPort;

const SERVICE: &str = "alpaca";

pub struct AlpacaAdapter {
    client: Client,
    trading_url: String,
    data_url: String,
    key_id: Secret,
    secret_key: Secret,
}

fn number(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn required_number(value: &Value, key: &str) -> Result<f64, HedgeError> {
    number(value, key).ok_or_else(|| HedgeError::Broker {
        reason: format!("response is missing numeric field '{key}'"),
    })
}

fn text(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn parse_account(value: &Value) -> Result<Account, HedgeError> {
    let cash = required_number(value, "cash")?;
    Ok(Account {
        status: text(value, "status"),
        cash,
        buying_power: number(value, "buying_power").unwrap_or(cash),
        equity: number(value, "equity").unwrap_or(cash),
    })
}

pub fn parse_position(value: &Value) -> Result<BrokerPosition, HedgeError> {
    let symbol = text(value, "symbol");
    if symbol.is_empty() {
        return Err(HedgeError::Broker {
            reason: "position without symbol".into(),
        });
    }
    let qty = required_number(value, "qty")?;
    let avg_entry_price = number(value, "avg_entry_price").unwrap_or(0.0);
    Ok(BrokerPosition {
        symbol,
        qty: qty.trunc() as i64,
        avg_entry_price,
        cost_basis: number(value, "cost_basis").unwrap_or(qty * avg_entry_price),
        market_value: number(value, "market_value").unwrap_or(0.0),
    })
}

pub fn parse_receipt(value: &Value) -> Result<OrderReceipt, HedgeError> {
    let id = text(value, "id");
    if id.is_empty() {
        return Err(HedgeError::Broker {
            reason: "order response without id".into(),
        });
    }
    Ok(OrderReceipt {
        id,
        status: text(value, "status"),
        filled_qty: number(value, "filled_qty"),
        filled_avg_price: number(value, "filled_avg_price"),
    })
}

/// Order body in Alpaca's wire shape: quantities and prices as strings.
pub fn order_body(order: &OrderRequest) -> Value {
    let side = match order.side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    };
    let order_type = match order.order_type {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
    };
    let time_in_force = match order.time_in_force {
        TimeInForce::Day => "day",
        TimeInForce::Gtc => "gtc",
    };
    let mut body = json!({
        "symbol": order.symbol,
        "qty": order.qty.to_string(),
        "side": side,
        "type": order_type,
        "time_in_force": time_in_force,
    });
    if let Some(price) = order.limit_price {
        body["limit_price"] = Value::String(format!("{price:.2}"));
    }
    body
}

impl AlpacaAdapter {
    pub fn new(
        trading_url: &str,
        data_url: &str,
        key_id: Secret,
        secret_key: Secret,
    ) -> Result<Self, HedgeError> {
        Ok(AlpacaAdapter {
            client: build_client(SERVICE)?,
            trading_url: trading_url.to_string(),
            data_url: data_url.to_string(),
            key_id,
            secret_key,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("APCA-API-KEY-ID", self.key_id.expose())
            .header("APCA-API-SECRET-KEY", self.secret_key.expose())
    }

    fn get(&self, base: &str, path: &str) -> Result<Value, HedgeError> {
        let response = self
            .authorized(self.client.get(join_url(base, path)))
            .send()
            .map_err(|e| transport_error(SERVICE, e))?;
        json_response(SERVICE, response).map_err(broker_error)
    }
}

fn broker_error(err: HedgeError) -> HedgeError {
    match err {
        HedgeError::Api { reason, .. } => HedgeError::Broker { reason },
        other => other,
    }
}

impl BrokerPort for AlpacaAdapter {
    fn account(&self) -> Result<Account, HedgeError> {
        parse_account(&self.get(&self.trading_url, "/v2/account")?)
    }

    fn positions(&self) -> Result<Vec<BrokerPosition>, HedgeError> {
        let body = self.get(&self.trading_url, "/v2/positions")?;
        body.as_array()
            .map(|rows| rows.iter().map(parse_position).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn position(&self, symbol: &str) -> Result<Option<BrokerPosition>, HedgeError> {
        let response = self
            .authorized(
                self.client
                    .get(join_url(&self.trading_url, &format!("/v2/positions/{symbol}"))),
            )
            .send()
            .map_err(|e| transport_error(SERVICE, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(symbol, "no open position");
            return Ok(None);
        }
        let body = json_response(SERVICE, response).map_err(broker_error)?;
        parse_position(&body).map(Some)
    }

    fn latest_trade_price(&self, symbol: &str) -> Result<f64, HedgeError> {
        let body = self.get(&self.data_url, &format!("/v2/stocks/{symbol}/trades/latest"))?;
        let trade = body.get("trade").unwrap_or(&Value::Null);
        let price = required_number(trade, "p")?;
        if price <= 0.0 {
            return Err(HedgeError::Broker {
                reason: format!("non-positive trade price for {symbol}"),
            });
        }
        Ok(price)
    }

    fn latest_quote(&self, symbol: &str) -> Result<Quote, HedgeError> {
        let body = self.get(&self.data_url, &format!("/v2/stocks/{symbol}/quotes/latest"))?;
        let quote = body.get("quote").unwrap_or(&Value::Null);
        Ok(Quote {
            bid_price: number(quote, "bp").unwrap_or(0.0),
            ask_price: required_number(quote, "ap")?,
        })
    }

    fn submit_order(&self, order: &OrderRequest) -> Result<OrderReceipt, HedgeError> {
        order.validate()?;
        let response = self
            .authorized(self.client.post(join_url(&self.trading_url, "/v2/orders")))
            .json(&order_body(order))
            .send()
            .map_err(|e| transport_error(SERVICE, e))?;
        let receipt = parse_receipt(&json_response(SERVICE, response).map_err(broker_error)?)?;
        info!(order = %order, id = %receipt.id, status = %receipt.status, "order submitted");
        Ok(receipt)
    }
}
