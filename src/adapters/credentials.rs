//! API credentials read from the environment.
//!
//! Secret values never appear in `Debug` output or log lines; diagnostics
//! only say whether a variable is set and how long it is.

use std::fmt;

use crate::domain::error::HedgeError;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const FINANCIAL_DATASETS_API_KEY: &str = "FINANCIAL_DATASETS_API_KEY";
pub const ALPHA_VANTAGE_API_KEY: &str = "ALPHA_VANTAGE_API_KEY";
pub const SUPABASE_URL: &str = "SUPABASE_URL";
pub const SUPABASE_SERVICE_KEY: &str = "SUPABASE_SERVICE_KEY";
pub const ALPACA_API_KEY: &str = "ALPACA_API_KEY";
pub const ALPACA_API_SECRET: &str = "ALPACA_API_SECRET";
pub const APCA_API_KEY_ID: &str = "APCA_API_KEY_ID";
pub const APCA_API_SECRET_KEY: &str = "APCA_API_SECRET_KEY";
pub const SLACK_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";

/// A credential value that refuses to print itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<redacted, {} chars>)", self.0.len())
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<Secret>,
    pub financial_datasets_api_key: Option<Secret>,
    pub alpha_vantage_api_key: Option<Secret>,
    pub supabase_url: Option<Secret>,
    pub supabase_service_key: Option<Secret>,
    pub alpaca_api_key: Option<Secret>,
    pub alpaca_api_secret: Option<Secret>,
    pub slack_webhook_url: Option<Secret>,
}

/// Presence of one variable, safe to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub variable: &'static str,
    pub present: bool,
    pub length: usize,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the set from any name-to-value lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(Secret)
        };
        Credentials {
            openai_api_key: get(OPENAI_API_KEY),
            financial_datasets_api_key: get(FINANCIAL_DATASETS_API_KEY),
            alpha_vantage_api_key: get(ALPHA_VANTAGE_API_KEY),
            supabase_url: get(SUPABASE_URL),
            supabase_service_key: get(SUPABASE_SERVICE_KEY),
            alpaca_api_key: get(ALPACA_API_KEY).or_else(|| get(APCA_API_KEY_ID)),
            alpaca_api_secret: get(ALPACA_API_SECRET).or_else(|| get(APCA_API_SECRET_KEY)),
            slack_webhook_url: get(SLACK_WEBHOOK_URL),
        }
    }

    fn require<'a>(value: &'a Option<Secret>, variable: &str) -> Result<&'a Secret, HedgeError> {
        value.as_ref().ok_or_else(|| HedgeError::MissingCredential {
            variable: variable.to_string(),
        })
    }

    pub fn alpha_vantage(&self) -> Result<&Secret, HedgeError> {
        Self::require(&self.alpha_vantage_api_key, ALPHA_VANTAGE_API_KEY)
    }

    pub fn alpaca(&self) -> Result<(&Secret, &Secret), HedgeError> {
        Ok((
            Self::require(&self.alpaca_api_key, ALPACA_API_KEY)?,
            Self::require(&self.alpaca_api_secret, ALPACA_API_SECRET)?,
        ))
    }

    pub fn supabase(&self) -> Result<(&Secret, &Secret), HedgeError> {
        Ok((
            Self::require(&self.supabase_url, SUPABASE_URL)?,
            Self::require(&self.supabase_service_key, SUPABASE_SERVICE_KEY)?,
        ))
    }

    pub fn status(&self) -> Vec<CredentialStatus> {
        [
            (OPENAI_API_KEY, &self.openai_api_key),
            (FINANCIAL_DATASETS_API_KEY, &self.financial_datasets_api_key),
            (ALPHA_VANTAGE_API_KEY, &self.alpha_vantage_api_key),
            (SUPABASE_URL, &self.supabase_url),
            (SUPABASE_SERVICE_KEY, &self.supabase_service_key),
            (ALPACA_API_KEY, &self.alpaca_api_key),
            (ALPACA_API_SECRET, &self.alpaca_api_secret),
            (SLACK_WEBHOOK_URL, &self.slack_webhook_url),
        ]
        .into_iter()
        .map(|(variable, value)| CredentialStatus {
            variable,
            present: value.is_some(),
            length: value.as_ref().map(Secret::len).unwrap_or(0),
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn creds(vars: &[(&str, &str)]) -> Credentials {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Credentials::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn debug_output_never_contains_values() {
        let c = creds(&[(OPENAI_API_KEY, "sk-very-secret"), (ALPACA_API_SECRET, "hunter2")]);
        let shown = format!("{c:?}");
        assert!(!shown.contains("sk-very-secret"));
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("redacted"));
        assert_eq!(format!("{}", c.alpaca().unwrap().1), "<redacted>");
    }

    #[test]
    fn alpaca_falls_back_to_apca_names() {
        let c = creds(&[(APCA_API_KEY_ID, "id"), (APCA_API_SECRET_KEY, "secret")]);
        let (key, secret) = c.alpaca().unwrap();
        assert_eq!(key.expose(), "id");
        assert_eq!(secret.expose(), "secret");
    }

    #[test]
    fn blank_values_are_missing() {
        let c = creds(&[(ALPHA_VANTAGE_API_KEY, "   ")]);
        match c.alpha_vantage() {
            Err(HedgeError::MissingCredential { variable }) => {
                assert_eq!(variable, ALPHA_VANTAGE_API_KEY)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn status_reports_presence_and_length_only() {
        let c = creds(&[(SLACK_WEBHOOK_URL, "https://hooks.example/abc")]);
        let slack = c
            .status()
            .into_iter()
            .find(|s| s.variable == SLACK_WEBHOOK_URL)
            .unwrap();
        assert!(slack.present);
        assert_eq!(slack.length, 25);
        assert!(c.status().iter().filter(|s| s.variable != SLACK_WEBHOOK_URL).all(|s| !s.present));
    }
}
