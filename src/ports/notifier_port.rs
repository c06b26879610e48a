//! Outbound notification port.

use crate::domain::error::HedgeError;

pub trait Notifier {
    fn notify(&self, message: &str) -> Result<(), HedgeError>;
}
