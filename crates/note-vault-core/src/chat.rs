//! Chat-completion capability used by the answer synthesizer.
//!
//! The OpenAI-compatible implementation lives in the `note-vault` app
//! crate; [`DisabledChat`] models an unconfigured backend.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A single, non-streaming completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Generates text from a list of messages in one round trip.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4-turbo-preview"`).
    fn model_name(&self) -> &str;

    /// Whether the backend has credentials and an endpoint.
    fn is_configured(&self) -> bool;

    /// Run the completion and return the assistant message text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// A chat backend that is never configured.
pub struct DisabledChat;

#[async_trait]
impl ChatBackend for DisabledChat {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<String> {
        Err(Error::ai_service("chat backend is disabled"))
    }
}
