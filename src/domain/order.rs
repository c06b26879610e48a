//! Broker-facing order and account types.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::HedgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
    Gtc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub qty: i64,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<f64>,
}

impl OrderRequest {
    pub fn market(symbol: &str, qty: i64, side: OrderSide) -> Self {
        OrderRequest {
            symbol: symbol.to_string(),
            qty,
            side,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Day,
            limit_price: None,
        }
    }

    pub fn limit(symbol: &str, qty: i64, side: OrderSide, limit_price: f64) -> Self {
        OrderRequest {
            order_type: OrderType::Limit,
            limit_price: Some(round_cents(limit_price)),
            ..OrderRequest::market(symbol, qty, side)
        }
    }

    /// Rejects orders the broker would refuse outright.
    pub fn validate(&self) -> Result<(), HedgeError> {
        if self.qty <= 0 {
            return Err(HedgeError::invalid_input(format!(
                "order for {} has non-positive quantity {}",
                self.symbol, self.qty
            )));
        }
        match (self.order_type, self.limit_price) {
            (OrderType::Limit, None) => Err(HedgeError::invalid_input(format!(
                "limit order for {} is missing a limit price",
                self.symbol
            ))),
            (OrderType::Limit, Some(p)) if p <= 0.0 => Err(HedgeError::invalid_input(format!(
                "limit order for {} has non-positive limit price",
                self.symbol
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        };
        match (self.order_type, self.limit_price) {
            (OrderType::Limit, Some(p)) => write!(f, "{side} {} {} @ {p:.2} limit", self.qty, self.symbol),
            _ => write!(f, "{side} {} {} @ market", self.qty, self.symbol),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub id: String,
    pub status: String,
    pub filled_qty: Option<f64>,
    pub filled_avg_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub status: String,
    pub cash: f64,
    pub buying_power: f64,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub qty: i64,
    pub avg_entry_price: f64,
    pub cost_basis: f64,
    pub market_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid_price: f64,
    pub ask_price: f64,
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_price_rounded_to_cents() {
        let order = OrderRequest::limit("AAPL", 5, OrderSide::Buy, 187.23456);
        assert_eq!(order.limit_price, Some(187.23));
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.time_in_force, TimeInForce::Day);
    }

    #[test]
    fn limit_without_price_is_rejected() {
        let mut order = OrderRequest::limit("AAPL", 5, OrderSide::Sell, 10.0);
        order.limit_price = None;
        assert!(order.validate().is_err());
        assert!(OrderRequest::market("AAPL", 0, OrderSide::Buy).validate().is_err());
        assert!(OrderRequest::market("AAPL", 1, OrderSide::Buy).validate().is_ok());
    }

    #[test]
    fn wire_form_matches_broker_fields() {
        let order = OrderRequest::market("MSFT", 3, OrderSide::Sell);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["type"], "market");
        assert_eq!(json["side"], "sell");
        assert_eq!(json["time_in_force"], "day");
        assert!(json.get("limit_price").is_none());
    }

    #[test]
    fn display_is_readable() {
        let order = OrderRequest::limit("AAPL", 2, OrderSide::Buy, 99.5);
        assert_eq!(order.to_string(), "BUY 2 AAPL @ 99.50 limit");
    }
}
