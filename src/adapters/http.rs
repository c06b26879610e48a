//! Shared blocking HTTP plumbing for the API adapters.

use reqwest::blocking::{Client, Response};
use serde_json::Value;
use std::time::Duration;

use crate::domain::error::HedgeError;

const TIMEOUT: Duration = Duration::from_secs(30);
pub const USER_AGENT: &str = concat!("hedgebot/", env!("CARGO_PKG_VERSION"));

pub fn build_client(service: &str) -> Result<Client, HedgeError> {
    Client::builder()
        .timeout(TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| transport_error(service, e))
}

/// Transport failure with the request URL stripped, since query strings may carry keys.
pub fn transport_error(service: &str, err: reqwest::Error) -> HedgeError {
    HedgeError::Http {
        service: service.to_string(),
        reason: err.without_url().to_string(),
    }
}

/// Parses a successful response as JSON; any other status becomes an API error.
pub fn json_response(service: &str, response: Response) -> Result<Value, HedgeError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(HedgeError::RateLimited {
            service: service.to_string(),
            message: format!("status {status}"),
        });
    }
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(HedgeError::Api {
            service: service.to_string(),
            reason: format!("status {status}: {}", truncate(&body, 300)),
        });
    }
    if status == reqwest::StatusCode::NO_CONTENT {
        return Ok(Value::Null);
    }
    let text = response.text().map_err(|e| transport_error(service, e))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| HedgeError::Api {
        service: service.to_string(),
        reason: format!("invalid json: {e}"),
    })
}

pub fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Joins a configured base URL and a path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
