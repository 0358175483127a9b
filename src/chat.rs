//! OpenAI-compatible chat completion backend.
//!
//! Sends `POST {url}/chat/completions` with the request's messages,
//! `max_tokens` and `temperature`, and returns the first choice's message
//! content. Single attempt, no streaming.

use std::sync::Arc;

use async_trait::async_trait;
use note_vault_core::chat::{ChatBackend, ChatRequest, DisabledChat};
use note_vault_core::{Error, Result};

use crate::config::ChatConfig;
use crate::embedding::http_client;

pub struct OpenAIChatBackend {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAIChatBackend {
    pub fn new(config: &ChatConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: config.base_url(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAIChatBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let Some(api_key) = &self.api_key else {
            return Err(Error::ai_service("OPENAI_API_KEY not set"));
        };

        let body = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ai_service(format!("chat request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::ai_service(format!(
                "chat API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::ai_service(format!("invalid chat response: {}", e)))?;
        parse_chat_response(&json)
    }
}

/// `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::ai_service("invalid chat response: missing message content"))
}

pub fn create_chat_backend(config: &ChatConfig) -> anyhow::Result<Arc<dyn ChatBackend>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledChat)),
        "openai" => Ok(Arc::new(OpenAIChatBackend::new(config)?)),
        other => anyhow::bail!("Unknown chat provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_chat_response() {
        let body = json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "See [1]."}}]
        });
        assert_eq!(parse_chat_response(&body).unwrap(), "See [1].");
        assert!(parse_chat_response(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_create_chat_backend() {
        let disabled = create_chat_backend(&ChatConfig::default()).unwrap();
        assert!(!disabled.is_configured());

        let config = ChatConfig {
            provider: "openai".into(),
            api_key: Some("test-key".into()),
            ..Default::default()
        };
        let backend = create_chat_backend(&config).unwrap();
        assert!(backend.is_configured());
        assert_eq!(backend.model_name(), "gpt-4-turbo-preview");
    }
}
