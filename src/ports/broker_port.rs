//! Brokerage account and order routing port.

use crate::domain::error::HedgeError;
use crate::domain::order::{Account, BrokerPosition, OrderReceipt, OrderRequest, Quote};

pub trait BrokerPort {
    fn account(&self) -> Result<Account, HedgeError>;

    fn positions(&self) -> Result<Vec<BrokerPosition>, HedgeError>;

    /// Open position in `symbol`, `None` when flat.
    fn position(&self, symbol: &str) -> Result<Option<BrokerPosition>, HedgeError> {
        Ok(self.positions()?.into_iter().find(|p| p.symbol == symbol))
    }

    fn latest_trade_price(&self, symbol: &str) -> Result<f64, HedgeError>;

    fn latest_quote(&self, symbol: &str) -> Result<Quote, HedgeError>;

    fn submit_order(&self, order: &OrderRequest) -> Result<OrderReceipt, HedgeError>;
}
