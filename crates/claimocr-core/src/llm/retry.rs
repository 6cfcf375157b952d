//! Bounded retry with exponential backoff around any LLM client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::LlmError;
use crate::extraction::ExtractionPrompt;
use crate::models::config::RetryConfig;

use super::{LlmClient, RawModelText};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Retries transient failures of the wrapped client.
///
/// Only `ServiceUnavailable` is retried.
pub struct RetryingClient {
    inner: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LlmClient for RetryingClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn complete(&self, prompt: &ExtractionPrompt) -> Result<RawModelText, LlmError> {
        let mut attempt = 1;
        loop {
            match self.inner.complete(prompt).await {
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        self.inner.name(),
                        attempt,
                        self.policy.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::PromptBuilder;
    use crate::llm::test_support::ScriptedClient;
    use crate::ocr::OcrText;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    fn prompt() -> ExtractionPrompt {
        PromptBuilder::new().build(&OcrText::empty())
    }

    fn unavailable() -> Result<String, LlmError> {
        Err(LlmError::ServiceUnavailable("503".to_string()))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(1_500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(1_500));
        assert_eq!(policy.backoff(40), Duration::from_millis(1_500));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let inner = Arc::new(ScriptedClient::new(vec![
            unavailable(),
            unavailable(),
            Ok("{}".to_string()),
        ]));
        let client = RetryingClient::new(inner.clone(), policy(3));

        let reply = client.complete(&prompt()).await.unwrap();

        assert_eq!(reply.text, "{}");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let inner = Arc::new(ScriptedClient::new(vec![unavailable()]));
        let client = RetryingClient::new(inner.clone(), policy(2));

        let err = client.complete(&prompt()).await.unwrap_err();

        assert!(matches!(err, LlmError::ServiceUnavailable(_)));
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_auth_or_quota() {
        for error in [
            LlmError::Authentication("bad key".to_string()),
            LlmError::QuotaExceeded("limit".to_string()),
        ] {
            let inner = Arc::new(ScriptedClient::new(vec![Err(error)]));
            let client = RetryingClient::new(inner.clone(), policy(5));

            assert!(client.complete(&prompt()).await.is_err());
            assert_eq!(inner.calls(), 1);
        }
    }
}
