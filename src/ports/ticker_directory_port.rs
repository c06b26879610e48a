//! Listed-company directory port.

use std::collections::HashMap;

use crate::domain::error::HedgeError;

pub trait TickerDirectory {
    /// Upper-case ticker to company name.
    fn companies(&self) -> Result<HashMap<String, String>, HedgeError>;
}
