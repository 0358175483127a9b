//! TOML configuration for the `vault` binary.
//!
//! Loaded once at startup by [`load_config`]. Every section except `[db]`
//! is optional and falls back to the defaults below. Credentials never live
//! in the file: `OPENAI_API_KEY` is read from the environment and attached
//! to the `[embedding]` and `[chat]` sections after parsing.
//!
//! ```toml
//! [db]
//! path = "./data/vault.sqlite"
//!
//! [embedding]
//! provider = "openai"          # disabled | openai | ollama
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [chat]
//! provider = "openai"          # disabled | openai
//! model = "gpt-4-turbo-preview"
//!
//! [retrieval]
//! top_k = 5
//! vector_search = "auto"       # auto | enabled | disabled
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// API base override, e.g. `http://localhost:11434` for Ollama.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    /// Notes per request when backfilling with `vault embed pending`.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            url: None,
            timeout_secs: default_embedding_timeout_secs(),
            batch_size: default_batch_size(),
            api_key: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_batch_size() -> usize {
    64
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Enabled, and for OpenAI a non-empty API key is present.
    pub fn is_configured(&self) -> bool {
        self.is_enabled() && (self.provider != "openai" || has_key(&self.api_key))
    }

    /// API base URL, without a trailing slash.
    pub fn base_url(&self) -> String {
        let url = match (&self.url, self.provider.as_str()) {
            (Some(url), _) => url.as_str(),
            (None, "ollama") => "http://localhost:11434",
            (None, _) => "https://api.openai.com/v1",
        };
        url.trim_end_matches('/').to_string()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_chat_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            url: None,
            timeout_secs: default_chat_timeout_secs(),
            api_key: None,
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4-turbo-preview".to_string()
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_chat_timeout_secs() -> u64 {
    60
}

impl ChatConfig {
    pub fn is_configured(&self) -> bool {
        self.provider == "openai" && has_key(&self.api_key)
    }

    pub fn base_url(&self) -> String {
        self.url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
            .trim_end_matches('/')
            .to_string()
    }
}

fn has_key(key: &Option<String>) -> bool {
    key.as_deref().is_some_and(|k| !k.trim().is_empty())
}

/// Whether the SQLite store advertises nearest-neighbour search.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorSearchMode {
    /// Enabled exactly when an embedding provider is configured.
    #[default]
    Auto,
    Enabled,
    Disabled,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    #[serde(default = "default_keyword_pool_factor")]
    pub keyword_pool_factor: usize,
    #[serde(default)]
    pub vector_search: VectorSearchMode,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            keyword_pool_factor: default_keyword_pool_factor(),
            vector_search: VectorSearchMode::Auto,
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_top_k() -> usize {
    20
}
fn default_keyword_pool_factor() -> usize {
    3
}

impl RetrievalConfig {
    pub fn vector_enabled(&self, embedding: &EmbeddingConfig) -> bool {
        match self.vector_search {
            VectorSearchMode::Auto => embedding.is_configured(),
            VectorSearchMode::Enabled => true,
            VectorSearchMode::Disabled => false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Pretty,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvaluationConfig {
    #[serde(default = "default_eval_base_url")]
    pub base_url: String,
    #[serde(default = "default_eval_k")]
    pub k: usize,
    #[serde(default = "default_eval_output")]
    pub output: PathBuf,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            base_url: default_eval_base_url(),
            k: default_eval_k(),
            output: default_eval_output(),
        }
    }
}

fn default_eval_base_url() -> String {
    "http://localhost:8001".to_string()
}
fn default_eval_k() -> usize {
    5
}
fn default_eval_output() -> PathBuf {
    PathBuf::from("evaluation_results.json")
}

impl Config {
    /// Attach credentials from the process environment.
    pub fn apply_env(&mut self) {
        let key = std::env::var(OPENAI_API_KEY_ENV).ok();
        self.embedding.api_key = key.clone();
        self.chat.api_key = key;
    }

    pub fn validate(&self) -> Result<()> {
        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }
        if self.embedding.dims == 0 {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.chat.provider.as_str() {
            "disabled" | "openai" => {}
            other => bail!(
                "Unknown chat provider: '{}'. Must be disabled or openai.",
                other
            ),
        }
        if self.chat.max_tokens == 0 {
            bail!("chat.max_tokens must be > 0");
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            bail!("chat.temperature must be in [0.0, 2.0]");
        }

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.max_top_k < self.retrieval.top_k {
            bail!("retrieval.max_top_k must be >= retrieval.top_k");
        }
        if self.retrieval.keyword_pool_factor < 1 {
            bail!("retrieval.keyword_pool_factor must be >= 1");
        }

        if self.evaluation.k < 1 {
            bail!("evaluation.k must be >= 1");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.apply_env();
    config.validate()?;

    Ok(config)
}
