//! Language model port.

use serde_json::Value;

use crate::domain::error::HedgeError;

pub trait LlmPort {
    /// Sends a system and user message and returns the reply parsed as a JSON object.
    fn complete_json(&self, system: &str, user: &str) -> Result<Value, HedgeError>;
}
