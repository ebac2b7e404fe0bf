//! Core types and traits for LLM completion

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error types that can occur while talking to an LLM
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Request timed out
    #[error("timeout after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Rate limited by the provider
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit { retry_after: Option<Duration> },

    /// Authentication failed
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Network error or server-side failure
    #[error("network error: {message}")]
    Network { message: String },

    /// Failed to parse response
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Request rejected by the API
    #[error("request rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl LlmError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout { .. } | LlmError::RateLimit { .. } | LlmError::Network { .. }
        )
    }

    /// Get suggested retry delay for rate limit errors
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }

    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    pub fn rate_limit(retry_after: Option<Duration>) -> Self {
        Self::RateLimit { retry_after }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Text of a completion plus what the API reported about it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub stop_reason: Option<String>,
    pub duration: Duration,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

impl LlmResponse {
    pub fn new(text: String, duration: Duration) -> Self {
        Self {
            text,
            model: None,
            stop_reason: None,
            duration,
            usage: None,
        }
    }

    /// True when generation hit `max_tokens`, so any JSON is likely cut off
    pub fn is_truncated(&self) -> bool {
        self.stop_reason.as_deref() == Some("max_tokens")
    }
}

/// A single-turn completion request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,

    /// Replaces the client's configured system prompt
    pub system_prompt: Option<String>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// A completion backend
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Client name for logs
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_retryable() {
        assert!(LlmError::timeout(Duration::from_secs(30)).is_retryable());
        assert!(LlmError::rate_limit(None).is_retryable());
        assert!(LlmError::network("connection reset").is_retryable());

        assert!(!LlmError::auth("invalid key").is_retryable());
        assert!(!LlmError::parse("invalid json").is_retryable());
        assert!(
            !LlmError::Rejected {
                status: 400,
                body: "bad".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_retry_after_only_for_rate_limit() {
        let err = LlmError::rate_limit(Some(Duration::from_secs(7)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(LlmError::network("x").retry_after(), None);
    }

    #[test]
    fn test_request_system_prompt_override() {
        let request = LlmRequest::new("List platforms");
        assert!(request.system_prompt.is_none());

        let request = request.with_system_prompt("Be terse");
        assert_eq!(request.prompt, "List platforms");
        assert_eq!(request.system_prompt.as_deref(), Some("Be terse"));
    }

    #[test]
    fn test_truncated_response() {
        let mut response = LlmResponse::new("{\"results\": [".into(), Duration::from_secs(1));
        assert!(!response.is_truncated());
        response.stop_reason = Some("max_tokens".into());
        assert!(response.is_truncated());
        response.stop_reason = Some("end_turn".into());
        assert!(!response.is_truncated());
    }
}
