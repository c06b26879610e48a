//! Daily price access port.

use chrono::NaiveDate;

use crate::domain::error::HedgeError;
use crate::domain::price::PriceBar;

pub trait PriceSource {
    /// Bars in `[start, end]`, oldest first.
    fn prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, HedgeError>;
}
