//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Provider;
use crate::error::{Result, SubtitleError};
use crate::llm::{read_body, send_request, status_error, Completion, CompletionRequest, LlmClient};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_finish_reason(reason: &str) -> String {
    match reason {
        "STOP" => "stop".to_string(),
        "MAX_TOKENS" => "length".to_string(),
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => "content_filter".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

fn into_completion(response: GenerateResponse) -> Result<Completion> {
    let usage = response.usage_metadata;
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| SubtitleError::ResponseFormat("Gemini response contained no candidates".to_string()))?;

    let content = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
        .unwrap_or_default();

    Ok(Completion {
        content,
        prompt_tokens: usage.as_ref().map_or(0, |u| u.prompt_token_count),
        completion_tokens: usage.as_ref().map_or(0, |u| u.candidates_token_count),
        finish_reason: candidate.finish_reason.as_deref().map(normalize_finish_reason),
    })
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: request.system_prompt.clone(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: request.user_prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        };

        debug!("Sending translation request to Gemini API (model {})", request.model);
        let builder = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, request.model))
            .header("x-goog-api-key", &request.api_key)
            .json(&body);

        let response = send_request(builder, request.timeout, &request.cancellation).await?;
        let status = response.status();
        debug!("Gemini API response status: {}", status);

        let text = read_body(response, request.timeout, &request.cancellation).await?;
        if !status.is_success() {
            return Err(status_error(Provider::Gemini, status, &text));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| SubtitleError::ResponseFormat(format!("Unexpected Gemini response: {}", e)))?;
        into_completion(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parts_are_joined() {
        let json = r#"{
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "WEBVTT\n\n" }, { "text": "00:00:00.000 --> 00:00:01.000\nHola" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 40, "candidatesTokenCount": 12, "totalTokenCount": 52 }
        }"#;
        let completion = into_completion(serde_json::from_str(json).unwrap()).unwrap();
        assert!(completion.content.ends_with("Hola"));
        assert_eq!(completion.prompt_tokens, 40);
        assert_eq!(completion.completion_tokens, 12);
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_max_tokens_maps_to_length() {
        let json = r#"{ "candidates": [{ "content": { "parts": [] }, "finishReason": "MAX_TOKENS" }] }"#;
        let completion = into_completion(serde_json::from_str(json).unwrap()).unwrap();
        assert!(completion.is_truncated());
        assert_eq!(completion.total_tokens(), 0);
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let body = GenerateRequest {
            system_instruction: Content { role: None, parts: vec![Part { text: "sys".into() }] },
            contents: vec![],
            generation_config: GenerationConfig { temperature: 0.3, max_output_tokens: 100 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("systemInstruction").is_some());
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 100);
        assert!(json["systemInstruction"].get("role").is_none());
    }
}
