// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Google Gemini client implementation.
//!
//! This module provides an [`LlmClient`] implementation backed by the
//! Gemini `generateContent` REST API.
//!
//! # Features
//!
//! - Single-shot completions and multi-turn chat
//! - Tool catalogs rendered into the system instruction
//! - Thinking disabled for low-latency tool selection
//!
//! # API Reference
//!
//! See [Gemini API](https://ai.google.dev/api/generate-content) for details.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::LlmError;
use crate::mcp::ToolDescriptor;
use crate::types::{LlmClient, Message, Role};

/// Default API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Google Gemini client.
///
/// Implements the [`LlmClient`] trait over the `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a new Gemini client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Gemini API key
    /// * `model` - Model identifier (e.g., "gemini-2.5-flash")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the `generateContent` endpoint URL for the configured model.
    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Build the request body for the Generate Content API.
    fn build_request(
        &self,
        system_prompt: Option<&str>,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> GenerateRequest {
        let system_instruction = system_prompt.map(|prompt| {
            let text = if tools.is_empty() {
                prompt.to_string()
            } else {
                format!("{prompt}\n\n{}", render_tools(tools))
            };
            ApiContent {
                role: None,
                parts: vec![ApiPart { text }],
            }
        });

        let contents = history.iter().map(ApiContent::from).collect();

        GenerateRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                thinking_config: ThinkingConfig { thinking_budget: 0 },
            },
        }
    }

    /// Send a request and extract the response text.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        debug!(model = %self.model, turns = request.contents.len(), "Sending generate request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(DEFAULT_TIMEOUT_SECS * 1000)
                } else {
                    LlmError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(handle_error_response(status.as_u16(), &error_text));
        }

        let api_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        extract_text(api_response)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = self.build_request(None, &[Message::user(prompt)], &[]);
        self.generate(&request).await
    }

    async fn chat(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<String, LlmError> {
        let request = self.build_request(Some(system_prompt), history, tools);
        self.generate(&request).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Render the tool catalog into a system-instruction section.
///
/// The model sees each tool's name, description, and parameter schema in
/// compact JSON so it can produce matching argument objects.
fn render_tools(tools: &[ToolDescriptor]) -> String {
    let mut rendered = String::from("Available tools:");
    for tool in tools {
        rendered.push_str(&format!(
            "\n- {}: {}\n  parameters: {}",
            tool.name, tool.description, tool.schema
        ));
    }
    rendered
}

/// Map an error response body to an [`LlmError`].
fn handle_error_response(status_code: u16, body: &str) -> LlmError {
    // Try to parse as JSON error
    if let Ok(error) = serde_json::from_str::<ApiError>(body) {
        LlmError::api(error.error.message, status_code)
    } else {
        LlmError::api(body.to_string(), status_code)
    }
}

/// Pull the first candidate's text out of a response.
fn extract_text(response: GenerateResponse) -> Result<String, LlmError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::ParseError("response contained no candidates".to_string()))?;
    let content = candidate
        .content
        .ok_or_else(|| LlmError::ParseError("candidate contained no content".to_string()))?;

    let text: String = content
        .parts
        .into_iter()
        .map(|part| part.text)
        .collect();
    Ok(text)
}

// ============================================================================
// API Types
// ============================================================================

/// Request body for the Generate Content API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    contents: Vec<ApiContent>,
    generation_config: GenerationConfig,
}

/// A content turn: an optional role plus text parts.
#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

/// API response format.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

/// API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Type Conversions
// ============================================================================

impl From<&Message> for ApiContent {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "model",
            // The API has no system turn role; fold into the user side.
            Role::System => "user",
        };

        Self {
            role: Some(role.to_string()),
            parts: vec![ApiPart {
                text: msg.content.clone(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;
    use serde_json::json;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(
            name,
            "Latest closing price for a ticker",
            json!({"type": "object", "properties": {"ticker": {"type": "string"}}}),
            Url::parse("http://localhost:8080/mcp").unwrap(),
        )
    }

    #[test]
    fn test_client_creation() {
        let client = GeminiClient::new("test-key", "gemini-2.5-flash");
        assert_eq!(client.model(), "gemini-2.5-flash");
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_base_url_override() {
        let client =
            GeminiClient::new("test-key", "gemini-2.5-flash").with_base_url("http://localhost:9999");
        assert_eq!(
            client.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_message_conversion_roles() {
        let user: ApiContent = (&Message::user("hi")).into();
        assert_eq!(user.role.as_deref(), Some("user"));
        assert_eq!(user.parts[0].text, "hi");

        let assistant: ApiContent = (&Message::assistant("hello")).into();
        assert_eq!(assistant.role.as_deref(), Some("model"));

        let system: ApiContent = (&Message::system("be brief")).into();
        assert_eq!(system.role.as_deref(), Some("user"));
    }

    #[test]
    fn test_build_request_embeds_tools() {
        let client = GeminiClient::new("test-key", "gemini-2.5-flash");
        let request = client.build_request(
            Some("Pick a tool."),
            &[Message::user("price of AAPL?")],
            &[descriptor("getPrice")],
        );

        let instruction = request.system_instruction.unwrap();
        let text = &instruction.parts[0].text;
        assert!(text.starts_with("Pick a tool."));
        assert!(text.contains("getPrice"));
        assert!(text.contains("Latest closing price"));
        assert!(text.contains("\"ticker\""));
    }

    #[test]
    fn test_build_request_without_tools_keeps_prompt_bare() {
        let client = GeminiClient::new("test-key", "gemini-2.5-flash");
        let request = client.build_request(Some("Pick a tool."), &[Message::user("hi")], &[]);

        let instruction = request.system_instruction.unwrap();
        assert_eq!(instruction.parts[0].text, "Pick a tool.");
    }

    #[test]
    fn test_request_serialization_shape() {
        let client = GeminiClient::new("test-key", "gemini-2.5-flash");
        let request = client.build_request(Some("sys"), &[Message::user("hi")], &[]);
        let value = serde_json::to_value(&request).unwrap();

        assert!(value.get("systemInstruction").is_some());
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(
            value["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            0
        );
    }

    #[test]
    fn test_extract_text() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "{\"completed\": "}, {"text": "true}"}]
                }
            }]
        }))
        .unwrap();

        assert_eq!(extract_text(response).unwrap(), "{\"completed\": true}");
    }

    #[test]
    fn test_extract_text_no_candidates() {
        let response: GenerateResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        let err = extract_text(response).unwrap_err();
        assert!(matches!(err, LlmError::ParseError(_)));
    }

    #[test]
    fn test_handle_error_response_json_body() {
        let body = r#"{"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = handle_error_response(429, body);
        match err {
            LlmError::ApiError {
                message,
                status_code,
            } => {
                assert_eq!(message, "Resource has been exhausted");
                assert_eq!(status_code, Some(429));
            }
            other => panic!("Expected ApiError, got {other:?}"),
        }
    }

    #[test]
    fn test_handle_error_response_plain_body() {
        let err = handle_error_response(502, "Bad Gateway");
        match err {
            LlmError::ApiError { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("Expected ApiError, got {other:?}"),
        }
    }
}
