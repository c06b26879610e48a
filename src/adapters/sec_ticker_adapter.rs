//! SEC company ticker directory with a local fallback file.

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use super::http::{build_client, json_response, transport_error};
use crate::domain::error::HedgeError;
use crate::ports::ticker_directory_port::TickerDirectory;

const SERVICE: &str = "sec";

#[derive(Debug, Deserialize)]
struct CompanyEntry {
    ticker: String,
    title: String,
}

pub struct SecTickerAdapter {
    client: Client,
    url: String,
    fallback_path: PathBuf,
    loaded: OnceCell<HashMap<String, String>>,
}

/// Parses the `{"0": {"cik_str", "ticker", "title"}, ...}` document into ticker -> name.
pub fn parse_company_tickers(value: Value) -> Result<HashMap<String, String>, HedgeError> {
    let entries: HashMap<String, CompanyEntry> =
        serde_json::from_value(value).map_err(|e| HedgeError::Api {
            service: SERVICE.into(),
            reason: format!("unexpected company tickers shape: {e}"),
        })?;
    Ok(entries
        .into_values()
        .map(|e| (e.ticker.to_uppercase(), e.title))
        .collect())
}

impl SecTickerAdapter {
    pub fn new(url: &str, fallback_path: impl Into<PathBuf>) -> Result<Self, HedgeError> {
        Ok(SecTickerAdapter {
            client: build_client(SERVICE)?,
            url: url.to_string(),
            fallback_path: fallback_path.into(),
            loaded: OnceCell::new(),
        })
    }

    fn fetch_remote(&self) -> Result<HashMap<String, String>, HedgeError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| transport_error(SERVICE, e))?;
        parse_company_tickers(json_response(SERVICE, response)?)
    }

    fn load_fallback(&self) -> Result<HashMap<String, String>, HedgeError> {
        let text = fs::read_to_string(&self.fallback_path)?;
        parse_company_tickers(serde_json::from_str(&text)?)
    }

    /// Company name for a ticker, `"Unknown"` when the directory lacks it.
    pub fn company_name(&self, ticker: &str) -> Result<String, HedgeError> {
        Ok(self
            .companies()?
            .get(&ticker.to_uppercase())
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string()))
    }
}

impl TickerDirectory for SecTickerAdapter {
    fn companies(&self) -> Result<HashMap<String, String>, HedgeError> {
        if let Some(cached) = self.loaded.get() {
            return Ok(cached.clone());
        }
        let companies = match self.fetch_remote() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, fallback = %self.fallback_path.display(), "sec ticker download failed");
                self.load_fallback()?
            }
        };
        Ok(self.loaded.get_or_init(|| companies).clone())
    }
}
