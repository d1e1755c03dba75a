//! Transport layer for structured chat completions.
//!
//! [`ChatClient`] abstracts the remote chat-completion service so the
//! diagnostic operations can be exercised against a mock in tests. The
//! production implementation speaks the OpenAI-compatible wire format with a
//! `json_schema` response format, so the returned content is a JSON document
//! matching the declared schema (or the call fails and is retried upstream).

use std::error::Error;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::sentinel::probe::SHARED_HTTP_CLIENT;

/// Hard timeout on one chat completion round trip.
const CHAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sampling temperature for diagnostic calls. Kept low: verdicts should be
/// reproducible, not creative.
const CHAT_TEMPERATURE: f64 = 0.1;

/// Completion budget per diagnostic response.
const CHAT_MAX_TOKENS: u32 = 1024;

/// Error type for chat transport failures.
#[derive(Debug, Clone)]
pub struct LlmError {
    message: String,
}

impl LlmError {
    pub fn new(message: impl Into<String>) -> Self {
        LlmError {
            message: message.into(),
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "llm error: {}", self.message)
    }
}

impl Error for LlmError {}

/// Trait defining the interface to the chat-completion service.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send one structured completion: stable system prompt first, dynamic
    /// user context last, output constrained by `schema`. Returns the raw
    /// content of the first choice.
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<String, LlmError>;

    /// Identifier of the upstream model (for logging).
    fn model_name(&self) -> &str;
}

/// Production [`ChatClient`] for OpenAI-compatible endpoints.
pub struct OpenAiCompatClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        OpenAiCompatClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: SHARED_HTTP_CLIENT.clone(),
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiCompatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<String, LlmError> {
        // Message order is a contract: the stable system prompt goes first so
        // the provider can cache the shared prefix across calls.
        let body = json!({
            "model": self.model,
            "temperature": CHAT_TEMPERATURE,
            "max_tokens": CHAT_MAX_TOKENS,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_content }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": schema_name,
                    "strict": true,
                    "schema": schema
                }
            }
        });

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(CHAT_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::new(format!("POST {}: {}", url, e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| LlmError::new(format!("reading response: {}", e)))?;

        if !status.is_success() {
            if log::log_enabled!(log::Level::Error) {
                log::error!("chat completion HTTP {} from {}: {}", status, url, text);
            }
            return Err(LlmError::new(format!("HTTP {} from {}", status, url)));
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| LlmError::new(format!("invalid JSON envelope: {}", e)))?;

        if let Some(usage) = parsed.get("usage") {
            log::debug!("chat completion usage: {}", usage);
        }

        parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::new("no choices in response"))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
