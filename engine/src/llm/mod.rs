//! Language backend abstraction layer
//!
//! This module provides the narrow interface the agent uses for natural
//! language understanding and generation. The `LanguageBackend` trait defines
//! the contract; `groq` implements it over an OpenAI-compatible chat
//! completions API. Backend output destined for structured use is validated
//! against a strict schema at this boundary — ad hoc shapes never flow into
//! the executor.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod groq;
pub mod prompts;

/// Result type for language backend operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during language backend operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl LLMError {
    /// Whether a retry with backoff may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LLMError::NetworkError(_) | LLMError::Timeout | LLMError::RateLimitExceeded
        )
    }
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (system, user, assistant)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message
    System,

    /// User message
    User,

    /// Assistant message
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Language backend trait that all providers must implement
#[async_trait]
pub trait LanguageBackend: Send + Sync {
    /// Returns the name of the backend (e.g., "groq")
    fn name(&self) -> &str;

    /// Generate a free-text response for the given conversation
    ///
    /// # Errors
    /// Returns an `LLMError` on timeout, network failure, or an unusable
    /// response body.
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Check if the backend is currently configured and available.
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Parse backend output into a typed value, validating at the boundary.
///
/// Accepts raw JSON, a fenced ```json block, or an object embedded in prose.
/// Anything that does not match the expected schema is a
/// `MalformedResponse`.
pub fn parse_structured<T: DeserializeOwned>(content: &str) -> Result<T> {
    let json = extract_json_object(content)
        .ok_or_else(|| LLMError::MalformedResponse("no JSON object in output".to_string()))?;

    serde_json::from_str(json).map_err(|e| LLMError::MalformedResponse(e.to_string()))
}

/// Locate the first parseable JSON object in backend output.
///
/// Handles three formats:
/// 1. The entire content is a JSON object
/// 2. A fenced code block (with or without trailing prose)
/// 3. An object embedded in prose — scans for `{` and matches braces
pub fn extract_json_object(content: &str) -> Option<&str> {
    let trimmed = content.trim();

    if trimmed.starts_with('{') {
        if let Some(candidate) = extract_balanced_object(trimmed) {
            if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                return Some(candidate);
            }
        }
    }

    if let Some(inner) = extract_fenced_block(trimmed) {
        let inner = inner.trim();
        if let Some(candidate) = extract_balanced_object(inner) {
            if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                return Some(candidate);
            }
        }
    }

    if let Some(pos) = trimmed.find('{') {
        let candidate = extract_balanced_object(&trimmed[pos..])?;
        if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
            return Some(candidate);
        }
    }

    None
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
fn extract_fenced_block(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_object(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
