//! Groq language backend
//!
//! Client for Groq's OpenAI-compatible chat completions API. Requests carry a
//! bounded timeout; transient failures (network, timeout, rate limit) are
//! retried with exponential backoff before surfacing to the caller.

use super::{LLMError, LanguageBackend, Message};
use crate::config::LlmConfig;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum request attempts (initial call plus retries)
const MAX_ATTEMPTS: u32 = 3;

/// Initial retry backoff; doubles per attempt up to [`MAX_BACKOFF`]
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

pub struct GroqBackend {
    config: LlmConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GroqBackend {
    /// Create a backend from configuration. The API key is read from the
    /// environment variable named in the config.
    pub fn new(config: LlmConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            api_key,
            client,
        }
    }

    async fn request_once(&self, messages: &[Message]) -> super::Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| {
                LLMError::AuthenticationFailed(format!(
                    "environment variable {} is not set",
                    self.config.api_key_env
                ))
            })?;

        let url = format!("{}/chat/completions", self.config.base_url);

        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content
                })
            })
            .collect();

        let payload = json!({
            "model": self.config.model,
            "messages": api_messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => LLMError::AuthenticationFailed(text),
                429 => LLMError::RateLimitExceeded,
                _ => LLMError::InvalidRequest(text),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::MalformedResponse(e.to_string()))?;

        let content = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| {
                LLMError::MalformedResponse("no message content in response".to_string())
            })?;

        if content.is_empty() {
            return Err(LLMError::MalformedResponse("empty content".to_string()));
        }

        Ok(content.to_string())
    }
}

#[async_trait]
impl LanguageBackend for GroqBackend {
    fn name(&self) -> &str {
        "groq"
    }

    async fn check_health(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, messages: &[Message]) -> super::Result<String> {
        let mut backoff = INITIAL_BACKOFF;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.request_once(messages).await {
                Ok(content) => {
                    debug!(attempt, chars = content.len(), "Backend response received");
                    return Ok(content);
                }
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %e, "Transient backend failure, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(e) => return Err(e),
            }
        }

        Err(LLMError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    #[tokio::test]
    async fn test_missing_api_key_is_auth_failure() {
        let config = LlmConfig {
            api_key_env: "YOJANA_TEST_NO_SUCH_KEY".to_string(),
            ..Default::default()
        };
        let backend = GroqBackend::new(config);

        assert!(!backend.check_health().await);
        let err = backend
            .request_once(&[Message::user("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::AuthenticationFailed(_)));
    }
}
