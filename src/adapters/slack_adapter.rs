//! Slack incoming-webhook notifier.

use reqwest::blocking::Client;
use serde_json::json;
use tracing::debug;

use super::credentials::Secret;
use super::http::{build_client, transport_error, truncate};
use crate::domain::error::HedgeError;
use crate::ports::notifier_port::Notifier;

const SERVICE: &str = "slack";

pub struct SlackAdapter {
    client: Client,
    webhook_url: Secret,
}

impl SlackAdapter {
    pub fn new(webhook_url: Secret) -> Result<Self, HedgeError> {
        Ok(SlackAdapter {
            client: build_client(SERVICE)?,
            webhook_url,
        })
    }
}

impl Notifier for SlackAdapter {
    fn notify(&self, message: &str) -> Result<(), HedgeError> {
        let response = self
            .client
            .post(self.webhook_url.expose())
            .json(&json!({ "text": message }))
            .send()
            .map_err(|e| transport_error(SERVICE, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(HedgeError::Api {
                service: SERVICE.into(),
                reason: format!("status {status}: {}", truncate(&body, 200)),
            });
        }
        debug!(chars = message.len(), "slack message sent");
        Ok(())
    }
}

/// Notifier used when no webhook is configured; messages only reach the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> Result<(), HedgeError> {
        tracing::info!(message, "notification (no slack webhook configured)");
        Ok(())
    }
}
