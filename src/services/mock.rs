// src/services/mock.rs
use crate::errors::ShotlistError;
use crate::services::gateway::{ChatMessage, ChatTransport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub credential: String,
    pub json_mode: bool,
}

impl RecordedCall {
    pub fn user_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == crate::services::gateway::Role::User)
            .map(|m| m.text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Scripted transport: replies in order and records every call.
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<String, ShotlistError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new(responses: Vec<Result<String, ShotlistError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, model: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.model == model)
            .count()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send(
        &self,
        model: &str,
        messages: &[ChatMessage],
        credential: &str,
        json_mode: bool,
    ) -> Result<String, ShotlistError> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            messages: messages.to_vec(),
            credential: credential.to_string(),
            json_mode,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ShotlistError::EmptyResponse(model.to_string())))
    }
}
