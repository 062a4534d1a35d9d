//! Model completion client over the Anthropic Messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default API origin.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(
        "Anthropic API key not found. Please set ANTHROPIC_API_KEY environment variable or configure it."
    )]
    MissingApiKey,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Error payload returned by the API. `kind` is the API error type,
    /// e.g. `authentication_error`.
    #[error("{kind}: {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of a `POST /v1/messages` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub messages: Vec<Message>,
}

/// Content block of a reply. Only text is interpreted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

impl MessageResponse {
    /// Text of the first text-typed content block.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
    }
}

/// Sends one completion request and returns the reply.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &MessageRequest) -> Result<MessageResponse, QueryError>;
}

/// HTTP client for the Anthropic Messages API.
pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Point the client at another origin (proxies, gateways).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn complete(&self, request: &MessageRequest) -> Result<MessageResponse, QueryError> {
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let json: serde_json::Value = resp.json().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &json));
        }

        Ok(resp.json().await?)
    }
}

/// Build a [`QueryError::Api`] from an error payload such as
/// `{"type":"error","error":{"type":"authentication_error","message":"..."}}`.
fn api_error(status: u16, json: &serde_json::Value) -> QueryError {
    let kind = json
        .pointer("/error/type")
        .and_then(|v| v.as_str())
        .unwrap_or("api_error");
    let message = json
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP status {status}"));
    QueryError::Api {
        status,
        kind: kind.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = MessageRequest {
            model: "claude-3-sonnet-20240229".into(),
            max_tokens: 4000,
            temperature: 0.7,
            messages: vec![Message::user("hi")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_tokens"], 4000);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_response_first_text_skips_other_blocks() {
        let response: MessageResponse = serde_json::from_str(
            r#"{
                "id": "msg_1",
                "content": [
                    {"type": "tool_use", "id": "t1", "name": "bash", "input": {}},
                    {"type": "text", "text": "hello"},
                    {"type": "text", "text": "second"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(response.first_text(), Some("hello"));
    }

    #[test]
    fn test_response_without_text() {
        let response: MessageResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert_eq!(response.first_text(), None);
    }

    #[test]
    fn test_api_error_payload() {
        let json = serde_json::json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        });
        let err = api_error(401, &json);
        assert_eq!(err.to_string(), "authentication_error: invalid x-api-key");

        let err = api_error(502, &serde_json::Value::Null);
        assert_eq!(err.to_string(), "api_error: HTTP status 502");
    }
}
