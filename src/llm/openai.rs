//! OpenAI chat completions client.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Provider;
use crate::error::{Result, SubtitleError};
use crate::llm::{read_body, send_request, status_error, Completion, CompletionRequest, LlmClient};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// Chat message structure for OpenAI API
#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

// OpenAI API request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

// OpenAI API response
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

pub struct OpenAiClient {
    client: Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the client at a proxy or compatible endpoint
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

fn into_completion(completion: ChatCompletion) -> Result<Completion> {
    let usage = completion.usage;
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| SubtitleError::ResponseFormat("OpenAI response contained no choices".to_string()))?;

    Ok(Completion {
        content: choice.message.content,
        prompt_tokens: usage.as_ref().map_or(0, |u| u.prompt_tokens),
        completion_tokens: usage.as_ref().map_or(0, |u| u.completion_tokens),
        finish_reason: choice.finish_reason,
    })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: request.user_prompt.clone(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        debug!("Sending translation request to OpenAI API (model {})", request.model);
        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", request.api_key))
            .header("Content-Type", "application/json")
            .json(&body);

        let response = send_request(builder, request.timeout, &request.cancellation).await?;
        let status = response.status();
        debug!("OpenAI API response status: {}", status);

        let text = read_body(response, request.timeout, &request.cancellation).await?;
        if !status.is_success() {
            return Err(status_error(Provider::OpenAi, status, &text));
        }

        let completion: ChatCompletion = serde_json::from_str(&text)
            .map_err(|e| SubtitleError::ResponseFormat(format!("Unexpected OpenAI response: {}", e)))?;
        into_completion(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_with_usage() {
        let json = r#"{
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "WEBVTT\n" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 80, "total_tokens": 200 }
        }"#;
        let completion = into_completion(serde_json::from_str(json).unwrap()).unwrap();
        assert_eq!(completion.content, "WEBVTT\n");
        assert_eq!(completion.prompt_tokens, 120);
        assert_eq!(completion.completion_tokens, 80);
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_empty_choices_is_format_error() {
        let json = r#"{ "choices": [] }"#;
        let result = into_completion(serde_json::from_str(json).unwrap());
        assert!(matches!(result, Err(SubtitleError::ResponseFormat(_))));
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let client = OpenAiClient::with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }
}
