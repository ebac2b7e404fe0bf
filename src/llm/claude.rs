//! Claude messages API client

use super::types::{LlmClient, LlmError, LlmRequest, LlmResponse, TokenUsage};
use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Claude messages API
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    name: String,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: Option<String>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

impl ClaudeClient {
    /// Create a client from config and an API key
    pub fn from_config(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::config("API key is empty"));
        }

        let timeout = Duration::from_secs(config.timeout);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: "claude".into(),
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system_prompt: config.system_prompt.clone(),
            timeout,
            client,
        })
    }

    /// Map HTTP status to LlmError
    fn map_http_error(&self, status: reqwest::StatusCode, retry_after: Option<Duration>, body: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::auth(format!("HTTP {}: {}", status, body)),
            429 => LlmError::rate_limit(retry_after),
            408 | 504 => LlmError::timeout(self.timeout),
            400..=499 => LlmError::Rejected {
                status: status.as_u16(),
                body: body.to_string(),
            },
            // 529 is Anthropic's "overloaded"
            _ => LlmError::network(format!("HTTP {}: {}", status, body)),
        }
    }
}

/// Parse a `retry-after` header given in seconds
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[async_trait]
impl LlmClient for ClaudeClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();

        let system = request
            .system_prompt
            .as_deref()
            .unwrap_or(&self.system_prompt);

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        debug!(
            model = %self.model,
            prompt_chars = request.prompt.len(),
            "calling messages API"
        );

        let send = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send();

        let response = match send.await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(LlmError::timeout(start.elapsed())),
            Err(e) if e.is_connect() => {
                return Err(LlmError::network(format!("connection failed: {}", e)));
            }
            Err(e) => return Err(LlmError::network(format!("request failed: {}", e))),
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(self.map_http_error(status, retry_after, &body));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::parse(format!("failed to parse response: {}", e)))?;

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind.as_deref().is_none_or(|k| k == "text"))
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        debug!(response_chars = text.len(), "messages API returned");

        Ok(LlmResponse {
            text,
            model: parsed.model,
            stop_reason: parsed.stop_reason,
            duration: start.elapsed(),
            usage: parsed.usage.map(|usage| TokenUsage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            }),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
