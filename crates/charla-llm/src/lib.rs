//! Completion client for an OpenAI-compatible chat-completions endpoint.
//!
//! The orchestrator depends on the [`CompletionBackend`] trait, not on the
//! HTTP client directly, so tests and the relay deployment can substitute
//! their own backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use charla_core::config::LlmConfig;
use charla_core::error::CharlaError;
use charla_core::types::PromptMessage;

/// Returned when the endpoint answers 2xx but carries no content.
pub const EMPTY_COMPLETION_PLACEHOLDER: &str = "I could not generate a response.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything able to turn an ordered message list into a reply string.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, CharlaError>;
}

// Wire shapes for the chat-completions endpoint.

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// HTTP client for the completion endpoint, bearer-token authenticated.
pub struct CompletionClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl CompletionClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Pull the reply text out of a 2xx body.
    ///
    /// A present-but-empty `content` degrades to the fixed placeholder; a
    /// body that is not valid JSON propagates as a provider error since
    /// there is no safe placeholder reply to invent.
    fn extract_content(body: &str) -> Result<String, CharlaError> {
        let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
            CharlaError::Provider {
                status: 200,
                message: format!("unparseable completion body: {}", e),
            }
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content);

        Ok(match content {
            Some(text) if !text.is_empty() => text,
            _ => EMPTY_COMPLETION_PLACEHOLDER.to_string(),
        })
    }

    /// Extract the provider-reported message from a non-2xx error body,
    /// falling back to a generic message when the body is unparseable.
    fn extract_error_message(body: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .and_then(|e| e.message)
            .unwrap_or_else(|| "completion request failed".to_string())
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, CharlaError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/chat/completions", self.api_url);
        debug!(model = %self.model, messages = messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CharlaError::Timeout("completion request".to_string())
                } else {
                    CharlaError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CharlaError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = Self::extract_error_message(&body);
            error!(status = status.as_u16(), %message, "Completion request rejected");
            return Err(CharlaError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        Self::extract_content(&body)
    }
}
