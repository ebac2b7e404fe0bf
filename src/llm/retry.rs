//! Retry wrapper with exponential backoff

use super::types::{LlmClient, LlmError, LlmRequest, LlmResponse};
use crate::config::LlmConfig;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// When and how long to wait between attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each one after
    pub base_delay: Duration,

    pub max_delay: Duration,

    /// Stretch each delay by a random 0-25%
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_delay_ms),
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if self.jitter {
            delay.mul_f64(1.0 + rand::rng().random_range(0.0..=0.25))
        } else {
            delay
        }
    }
}

/// Wrapper that adds retry logic to any completion client
pub struct RetryClient<T: LlmClient> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: LlmClient> RetryClient<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<T: LlmClient + 'static> LlmClient for RetryClient<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut attempt = 0;

        loop {
            match self.inner.complete(request).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() || attempt >= self.policy.max_retries => {
                    return Err(e);
                }
                Err(e) => {
                    // Prefer the server-specified delay
                    let delay = e
                        .retry_after()
                        .unwrap_or_else(|| self.policy.backoff(attempt));

                    warn!(
                        client = self.inner.name(),
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        ?delay,
                        error = %e,
                        "completion failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Create a retry client with a custom policy
pub fn with_retry<T: LlmClient + 'static>(client: T, policy: RetryPolicy) -> RetryClient<T> {
    RetryClient::new(client, policy)
}
