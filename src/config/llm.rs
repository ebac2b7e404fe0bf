//! Configuration for the Claude messages client

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that provides accurate, up-to-date JSON data about online platforms for making money.";

/// Settings for the LLM used by `update-platforms`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Messages endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Maximum tokens in the completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Timeout in seconds for one request
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Maximum retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// System prompt sent with every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_max_tokens() -> u32 {
    8000
}

fn default_temperature() -> f32 {
    0.4
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000 // 1 second
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_url: default_api_url(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal() {
        let config: LlmConfig = toml::from_str("").unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 8000);
        assert_eq!(config.timeout, 300);
        assert_eq!(config.max_retries, 3);
        assert!((config.temperature - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            model = "claude-sonnet-4-20250514"
            api_url = "http://localhost:9999/v1/messages"
            max_tokens = 4000
            temperature = 0.0
            timeout = 60
            max_retries = 5
            retry_delay_ms = 2000
        "#;
        let config: LlmConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.model, "claude-sonnet-4-20250514");
        assert_eq!(config.api_url, "http://localhost:9999/v1/messages");
        assert_eq!(config.max_tokens, 4000);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay_ms, 2000);
    }

    #[test]
    fn test_reject_unknown_fields() {
        let result: Result<LlmConfig, _> = toml::from_str(r#"unknown_field = "value""#);
        assert!(result.is_err());
    }
}
