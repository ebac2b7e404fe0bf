//! LLM completion module
//!
//! Provides the Claude messages client used to discover platforms, a retry
//! wrapper with exponential backoff, and JSON recovery for model output.
//!
//! # Example
//!
//! ```ignore
//! use crate::llm::{LlmClient, LlmRequest, create_client};
//!
//! let client = create_client(&config.llm, api_key)?;
//! let response = client.complete(&LlmRequest::new("List platforms")).await?;
//! let json = extract_json(&response.text);
//! ```

mod claude;
mod output_parser;
mod retry;
mod types;

pub use claude::ClaudeClient;
pub use output_parser::extract_json;
pub use retry::{RetryClient, RetryPolicy, with_retry};
pub use types::{LlmClient, LlmError, LlmRequest, LlmResponse};

use crate::config::LlmConfig;

/// Create the Claude client wrapped with the configured retry policy
pub fn create_client(
    config: &LlmConfig,
    api_key: &str,
) -> Result<RetryClient<ClaudeClient>, LlmError> {
    let client = ClaudeClient::from_config(config, api_key)?;
    Ok(with_retry(client, RetryPolicy::from_config(config)))
}
