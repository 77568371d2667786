//! Uniform LLM completion interface.
//!
//! The orchestrator only sees [`LlmClient`]; each provider module turns a
//! [`CompletionRequest`] into its own HTTP call.

pub mod gemini;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::error;
use reqwest::{RequestBuilder, Response, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::config::Provider;
use crate::error::{Result, SubtitleError};

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// One completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
    pub cancellation: CancellationToken,
}

/// Completion text plus usage accounting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Normalized to OpenAI vocabulary: `stop`, `length`, ...
    pub finish_reason: Option<String>,
}

impl Completion {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// The provider cut the output short at the token limit
    pub fn is_truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name for logs and cache entries
    fn provider(&self) -> Provider;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

/// Client for the configured provider
pub fn create_client(provider: Provider) -> Arc<dyn LlmClient> {
    match provider {
        Provider::OpenAi => Arc::new(OpenAiClient::new()),
        Provider::Gemini => Arc::new(GeminiClient::new()),
    }
}

/// Send a request, racing it against the cancellation token and the timeout
pub(crate) async fn send_request(
    builder: RequestBuilder,
    timeout: Duration,
    cancellation: &CancellationToken,
) -> Result<Response> {
    tokio::select! {
        _ = cancellation.cancelled() => Err(SubtitleError::Cancelled),
        result = builder.timeout(timeout).send() => result.map_err(|e| transport_error(e, timeout)),
    }
}

/// Read the body of a response, consuming it.
///
/// The request timeout set in [`send_request`] also covers the body.
pub(crate) async fn read_body(
    response: Response,
    timeout: Duration,
    cancellation: &CancellationToken,
) -> Result<String> {
    tokio::select! {
        _ = cancellation.cancelled() => Err(SubtitleError::Cancelled),
        result = response.text() => result.map_err(|e| transport_error(e, timeout)),
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> SubtitleError {
    if e.is_timeout() {
        SubtitleError::NetworkTimeout(timeout.as_millis() as u64)
    } else {
        SubtitleError::Network(e.to_string())
    }
}

/// Map a non-success HTTP status onto the error taxonomy
pub(crate) fn status_error(provider: Provider, status: StatusCode, body: &str) -> SubtitleError {
    error!("{} API error: HTTP {}, body: {}", provider.as_str(), status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SubtitleError::Configuration(format!(
            "Invalid {} API key (status {}): {}",
            provider.as_str(),
            status,
            body
        )),
        _ => SubtitleError::Network(format!("{} API error (status {}): {}", provider.as_str(), status, body)),
    }
}
