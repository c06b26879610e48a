//! Chat-completions client answering in JSON mode.

use reqwest::blocking::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::credentials::Secret;
use super::http::{build_client, join_url, json_response, transport_error, truncate};
use crate::domain::error::HedgeError;
use crate::ports::llm_port::LlmPort;

const SERVICE: &str = "openai";

pub struct OpenAiAdapter {
    client: Client,
    base_url: String,
    model: String,
    api_key: Secret,
}

impl OpenAiAdapter {
    pub fn new(base_url: &str, model: &str, api_key: Secret) -> Result<Self, HedgeError> {
        Ok(OpenAiAdapter {
            client: build_client(SERVICE)?,
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Pulls `choices[0].message.content` out of a completion and parses it as JSON.
pub fn parse_completion(body: &Value) -> Result<Value, HedgeError> {
    let content = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| HedgeError::Llm {
            reason: "completion has no message content".into(),
        })?;
    serde_json::from_str(content.trim()).map_err(|e| HedgeError::Llm {
        reason: format!("content is not json ({e}): {}", truncate(content, 200)),
    })
}

impl LlmPort for OpenAiAdapter {
    fn complete_json(&self, system: &str, user: &str) -> Result<Value, HedgeError> {
        let body = json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });
        debug!(model = %self.model, prompt_chars = user.len(), "requesting completion");
        let response = self
            .client
            .post(join_url(&self.base_url, "/v1/chat/completions"))
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .map_err(|e| transport_error(SERVICE, e))?;
        let payload = json_response(SERVICE, response).map_err(|e| match e {
            HedgeError::Api { reason, .. } => HedgeError::Llm { reason },
            other => other,
        })?;
        parse_completion(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_content() {
        let body = json!({
            "choices": [{ "message": { "content": "{\"signal\": \"bullish\", \"confidence\": 80}" } }]
        });
        let value = parse_completion(&body).unwrap();
        assert_eq!(value["signal"], "bullish");
        assert_eq!(value["confidence"], 80);
    }

    #[test]
    fn non_json_content_is_llm_error() {
        let body = json!({ "choices": [{ "message": { "content": "sure, here you go" } }] });
        assert!(matches!(parse_completion(&body), Err(HedgeError::Llm { .. })));
    }

    #[test]
    fn missing_choices_is_llm_error() {
        assert!(matches!(parse_completion(&json!({})), Err(HedgeError::Llm { .. })));
    }
}
