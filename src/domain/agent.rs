//! Shared context handed to every analyst, plus the structured language-model call.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::ports::fundamentals_port::FundamentalsSource;
use crate::ports::llm_port::LlmPort;
use crate::ports::price_port::PriceSource;

pub struct AgentContext<'a> {
    pub tickers: &'a [String],
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub prices: &'a dyn PriceSource,
    pub fundamentals: &'a dyn FundamentalsSource,
    pub llm: Option<&'a dyn LlmPort>,
    pub llm_retries: u32,
}

/// Asks the model for a JSON answer of type `T`, retrying on transport or shape errors.
///
/// Returns `None` once every attempt has failed; callers substitute their own default.
pub fn ask_structured<T: DeserializeOwned>(
    llm: &dyn LlmPort,
    system: &str,
    user: &str,
    attempts: u32,
) -> Option<T> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        let reply = llm
            .complete_json(system, user)
            .and_then(|value| serde_json::from_value::<T>(value).map_err(Into::into));
        match reply {
            Ok(parsed) => return Some(parsed),
            Err(e) => {
                warn!(attempt, attempts, error = %e, "language model call failed");
            }
        }
    }
    debug!("giving up on language model after {attempts} attempts");
    None
}
