// src/services/gateway.rs
use crate::errors::ShotlistError;
use crate::models::ImageAttachment;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(attachment: &ImageAttachment) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: attachment.to_url(),
            },
        }
    }
}

/// Plain text for text-only calls, a list of parts for multimodal ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }

    /// Concatenated text of the message, ignoring image parts.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn image_count(&self) -> usize {
        match &self.content {
            MessageContent::Text(_) => 0,
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|part| matches!(part, ContentPart::ImageUrl { .. }))
                .count(),
        }
    }
}

/// A chat-completion service. Implementations hold no credential; the
/// caller passes one on every call.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(
        &self,
        model: &str,
        messages: &[ChatMessage],
        credential: &str,
        json_mode: bool,
    ) -> Result<String, ShotlistError>;
}

/// Client for an OpenAI-compatible chat-completions gateway.
pub struct GatewayClient {
    endpoint: String,
    timeout: Duration,
    client: Client,
}

impl GatewayClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            client: Client::new(),
        }
    }

    fn timeout_error(&self) -> ShotlistError {
        ShotlistError::Timeout(self.timeout.as_secs())
    }

    async fn post(
        &self,
        model: &str,
        body: &Value,
        credential: &str,
    ) -> Result<String, ShotlistError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.timeout_error()
                } else {
                    ShotlistError::Network(format!("Gateway request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ShotlistError::Gateway {
                status: status.as_u16(),
                body: error_text,
            });
        }

        // A success status without a readable completion is a transport fault.
        let result: Value = response
            .json()
            .await
            .map_err(|_| ShotlistError::EmptyResponse(model.to_string()))?;

        completion_text(&result).ok_or_else(|| ShotlistError::EmptyResponse(model.to_string()))
    }
}

#[async_trait]
impl ChatTransport for GatewayClient {
    async fn send(
        &self,
        model: &str,
        messages: &[ChatMessage],
        credential: &str,
        json_mode: bool,
    ) -> Result<String, ShotlistError> {
        let body = request_body(model, messages, json_mode);
        debug!(
            "Sending {} message(s) to {} (json_mode={})",
            messages.len(),
            model,
            json_mode
        );

        match tokio::time::timeout(self.timeout, self.post(model, &body, credential)).await {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error()),
        }
    }
}

pub fn request_body(model: &str, messages: &[ChatMessage], json_mode: bool) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages,
    });
    if json_mode {
        body["response_format"] = json!({ "type": "json_object" });
    }
    body
}

/// Text of the first choice. Some gateways return content as a list of
/// parts; their text is joined. Blank content counts as absent.
pub fn completion_text(result: &Value) -> Option<String> {
    let content = &result["choices"][0]["message"]["content"];

    let text = match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .join(""),
        _ => return None,
    };

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
