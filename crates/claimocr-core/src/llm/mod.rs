//! LLM extraction clients.
//!
//! Each client sends one prompt and returns the model's text reply. Clients
//! never retry on their own; wrap one in [`RetryingClient`] for a bounded
//! retry policy.

mod gemini;
mod openai;
mod retry;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use retry::{RetryPolicy, RetryingClient};

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::info;

use crate::error::{ConfigError, LlmError};
use crate::extraction::ExtractionPrompt;
use crate::models::config::{LlmConfig, LlmProvider};

/// Text returned by the model for one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawModelText {
    /// Reply text, unmodified.
    pub text: String,
    /// Model that produced it.
    pub model: String,
    /// Round-trip latency in milliseconds.
    pub latency_ms: u64,
}

/// A generative text-completion service.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Configured model identifier.
    fn model(&self) -> &str;

    /// Send the prompt and return the reply text.
    async fn complete(&self, prompt: &ExtractionPrompt) -> Result<RawModelText, LlmError>;
}

/// Build the client described by the configuration.
///
/// Fails with [`ConfigError::MissingApiKey`] when no key is available; callers
/// treat that as fatal at startup.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, ConfigError> {
    let api_key = config.require_api_key()?.to_string();

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::new(config, api_key)?),
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(config, api_key)?),
    };

    info!(
        "Using {} model {} at {}",
        client.name(),
        client.model(),
        config.effective_endpoint()
    );

    if config.retry.max_attempts > 1 {
        let policy = RetryPolicy::from(&config.retry);
        return Ok(Arc::new(RetryingClient::new(client, policy)));
    }

    Ok(client)
}

/// HTTP client with the configured request timeout.
fn http_client(config: &LlmConfig) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| ConfigError::Invalid {
            key: "llm".to_string(),
            reason: format!("failed to create HTTP client: {}", e),
        })
}

/// Map a non-success HTTP status to the error taxonomy.
pub(crate) fn error_for_status(status: StatusCode, body: String) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Authentication(body),
        StatusCode::TOO_MANY_REQUESTS => LlmError::QuotaExceeded(body),
        _ if body.contains("RESOURCE_EXHAUSTED") => LlmError::QuotaExceeded(body),
        // Gemini reports a bad key as 400 INVALID_ARGUMENT
        _ if body.contains("API_KEY_INVALID") || body.contains("API key not valid") => {
            LlmError::Authentication(body)
        }
        StatusCode::REQUEST_TIMEOUT => LlmError::ServiceUnavailable(body),
        s if s.is_server_error() => LlmError::ServiceUnavailable(format!("HTTP {}: {}", s, body)),
        s => LlmError::Api {
            status: s.as_u16(),
            body,
        },
    }
}

/// Map a transport failure (connect, timeout, body decode) to the error taxonomy.
pub(crate) fn error_for_transport(err: reqwest::Error) -> LlmError {
    if err.is_decode() {
        LlmError::InvalidResponse(err.to_string())
    } else if err.is_timeout() {
        LlmError::ServiceUnavailable(format!("request timed out: {}", err))
    } else {
        LlmError::ServiceUnavailable(err.to_string())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Client replaying a queue of canned results, then repeating the last one.
    pub struct ScriptedClient {
        replies: Mutex<Vec<Result<String, LlmError>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn replying(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }

        async fn complete(&self, prompt: &ExtractionPrompt) -> Result<RawModelText, LlmError> {
            self.prompts.lock().unwrap().push(prompt.as_str().to_string());
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.len() > 1 {
                replies.pop().unwrap()
            } else {
                match replies.last().unwrap() {
                    Ok(text) => Ok(text.clone()),
                    Err(e) => Err(clone_error(e)),
                }
            };
            reply.map(|text| RawModelText {
                text,
                model: "scripted-model".to_string(),
                latency_ms: 0,
            })
        }
    }

    fn clone_error(err: &LlmError) -> LlmError {
        match err {
            LlmError::Authentication(m) => LlmError::Authentication(m.clone()),
            LlmError::ServiceUnavailable(m) => LlmError::ServiceUnavailable(m.clone()),
            LlmError::QuotaExceeded(m) => LlmError::QuotaExceeded(m.clone()),
            LlmError::Api { status, body } => LlmError::Api {
                status: *status,
                body: body.clone(),
            },
            LlmError::InvalidResponse(m) => LlmError::InvalidResponse(m.clone()),
        }
    }
}
