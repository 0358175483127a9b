use std::sync::Arc;

use anyhow::{bail, Result};
use serde::Serialize;

use note_vault_core::embedding::EmbeddingProvider;
use note_vault_core::models::{RetrievalResult, UserId};
use note_vault_core::search::{RetrievalBackend, RetrievalEngine};

use crate::config::Config;
use crate::embedding;
use crate::sqlite_store::SqliteStore;

/// Open the store and build a retrieval engine whose backend comes from
/// the store's capability probe.
pub async fn open_engine(config: &Config) -> Result<RetrievalEngine> {
    let embedder = embedding::create_provider(&config.embedding)?;
    open_engine_with(config, embedder).await
}

pub async fn open_engine_with(
    config: &Config,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<RetrievalEngine> {
    let store = SqliteStore::open(config, embedder.as_ref()).await?;
    Ok(RetrievalEngine::detect(Arc::new(store), embedder)
        .await
        .with_keyword_pool_factor(config.retrieval.keyword_pool_factor))
}

/// `top_k` from the CLI, or the configured default, within `1..=max_top_k`.
pub fn resolve_top_k(config: &Config, requested: Option<usize>) -> Result<usize> {
    let top_k = requested.unwrap_or(config.retrieval.top_k);
    if top_k < 1 || top_k > config.retrieval.max_top_k {
        bail!(
            "--top-k must be between 1 and {} (got {})",
            config.retrieval.max_top_k,
            top_k
        );
    }
    Ok(top_k)
}

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    backend: RetrievalBackend,
    results: &'a [RetrievalResult],
}

pub async fn run_search(
    config: &Config,
    query: &str,
    owner: UserId,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let top_k = resolve_top_k(config, top_k)?;
    let engine = open_engine(config).await?;
    let results = engine.search(query, owner, top_k).await?;

    if json {
        let output = SearchOutput {
            query,
            backend: engine.backend(),
            results: &results,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("backend: {}", engine.backend());
    println!();
    for (i, result) in results.iter().enumerate() {
        let date = result
            .updated_at
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        println!("{}. [{:.2}] {}", i + 1, result.similarity, result.title);
        println!("    updated: {}", date);
        if !result.tags.is_empty() {
            println!("    tags: {}", result.tags.join(", "));
        }
        println!(
            "    excerpt: \"{}\"",
            result.excerpt.replace('\n', " ").trim()
        );
        println!("    id: {}", result.note_id);
        println!();
    }

    Ok(())
}
