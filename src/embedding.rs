//! Network embedding providers.
//!
//! Implements [`EmbeddingProvider`] from `note-vault-core` for:
//! - **[`OpenAIProvider`]**: `POST {url}/embeddings` with a bearer key.
//! - **[`OllamaProvider`]**: `POST {url}/api/embed` on a local Ollama.
//!
//! Each call is a single round trip with the configured timeout. There is
//! no retry; a failed call surfaces as [`Error::AiService`] and the caller
//! decides what to do (indexing stores `NULL`, search reports the error).
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use note_vault::config::EmbeddingConfig;
//! # use note_vault::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use note_vault_core::embedding::{check_dims, DisabledProvider, EmbeddingProvider};
use note_vault_core::{Error, Result};

use crate::config::EmbeddingConfig;

pub(crate) fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

// ============ OpenAI Provider ============

pub struct OpenAIProvider {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    dims: usize,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: config.base_url(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let Some(api_key) = &self.api_key else {
            return Err(Error::ai_service(format!(
                "OPENAI_API_KEY not set (batch_size={})",
                texts.len()
            )));
        };

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::ai_service(format!(
                    "OpenAI request failed (batch_size={}): {}",
                    texts.len(),
                    e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::ai_service(format!(
                "OpenAI API error {} (batch_size={}): {}",
                status,
                texts.len(),
                body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::ai_service(format!("invalid OpenAI response: {}", e)))?;
        let embeddings = parse_openai_response(&json)?;
        check_count(&embeddings, texts.len())?;
        check_dims(&embeddings, self.dims)?;
        Ok(embeddings)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::ai_service("invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::ai_service("invalid OpenAI response: missing embedding"))?;
        indexed.push((index, to_f32_vec(embedding)?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Requires Ollama to be running with the configured model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: config.base_url(),
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    fn is_configured(&self) -> bool {
        true
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::ai_service(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::ai_service(format!(
                "Ollama API error {} (batch_size={}): {}",
                status,
                texts.len(),
                body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::ai_service(format!("invalid Ollama response: {}", e)))?;
        let embeddings = parse_ollama_response(&json)?;
        check_count(&embeddings, texts.len())?;
        check_dims(&embeddings, self.dims)?;
        Ok(embeddings)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::ai_service("invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|item| {
            let values = item.as_array().ok_or_else(|| {
                Error::ai_service("invalid Ollama response: embedding is not an array")
            })?;
            to_f32_vec(values)
        })
        .collect()
}

fn to_f32_vec(values: &[serde_json::Value]) -> Result<Vec<f32>> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| Error::ai_service("invalid embedding response: non-numeric value"))
        })
        .collect()
}

fn check_count(embeddings: &[Vec<f32>], expected: usize) -> Result<()> {
    if embeddings.len() != expected {
        return Err(Error::ai_service(format!(
            "expected {} embeddings, got {}",
            expected,
            embeddings.len()
        )));
    }
    Ok(())
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
///
/// A missing OpenAI key is not an error here; the provider reports
/// `is_configured() == false` and fails on use.
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => anyhow::bail!("Unknown embedding provider: {}", other),
    }
}
