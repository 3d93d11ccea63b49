//! LLM error types.

use anima_core::AnimaError;
use thiserror::Error;

/// Errors that can occur during completion and embedding calls.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// LLM response was not valid JSON.
    #[error("Failed to parse LLM response as JSON: {0}")]
    ParseError(String),

    /// LLM response did not match expected schema.
    #[error("LLM output schema validation failed: {0}")]
    SchemaValidation(String),

    /// Request timed out.
    #[error("LLM request timed out after {0}ms")]
    Timeout(u64),

    /// LLM provider is unavailable.
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    /// All retry attempts exhausted.
    #[error("All LLM retry attempts exhausted after {attempts} tries: {last_error}")]
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },

    /// Configuration error.
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Whether another attempt may succeed.
    ///
    /// Transport failures and provider-side errors are retried; anything
    /// about the *content* of a response is not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Unavailable(_) => true,
            Self::RequestFailed(msg) => !is_client_error(msg),
            Self::ParseError(_)
            | Self::SchemaValidation(_)
            | Self::RetriesExhausted { .. }
            | Self::ConfigError(_) => false,
        }
    }
}

/// 4xx statuses other than 408 and 429 will fail the same way again.
fn is_client_error(msg: &str) -> bool {
    msg.split_whitespace()
        .find_map(|w| w.parse::<u16>().ok())
        .is_some_and(|code| (400..500).contains(&code) && code != 408 && code != 429)
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else if err.is_connect() {
            LlmError::Unavailable(err.to_string())
        } else {
            LlmError::RequestFailed(err.to_string())
        }
    }
}

impl From<LlmError> for AnimaError {
    fn from(err: LlmError) -> Self {
        AnimaError::Embedding(err.to_string())
    }
}
