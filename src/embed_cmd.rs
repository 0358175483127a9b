//! `vault embed pending`: backfill notes that have no embedding.

use anyhow::{bail, Result};

use note_vault_core::store::NoteStore;

use crate::config::Config;
use crate::embedding;
use crate::sqlite_store::SqliteStore;

/// Counts from one backfill run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackfillStats {
    pub pending: usize,
    pub embedded: usize,
    pub failed: usize,
}

pub async fn run_embed_pending(
    config: &Config,
    limit: Option<usize>,
    batch_size_override: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let store = SqliteStore::open(config, provider.as_ref()).await?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);
    if batch_size == 0 {
        bail!("--batch-size must be > 0");
    }

    let pending = store.notes_missing_embedding(limit).await?;

    if dry_run {
        println!("embed pending (dry-run)");
        println!("  notes needing embeddings: {}", pending.len());
        store.pool().close().await;
        return Ok(());
    }

    if pending.is_empty() {
        println!("embed pending");
        println!("  all notes up to date");
        store.pool().close().await;
        return Ok(());
    }

    let mut stats = BackfillStats {
        pending: pending.len(),
        ..Default::default()
    };

    for batch in pending.chunks(batch_size) {
        let texts: Vec<String> = batch
            .iter()
            .map(|note| note.embedding_text().trim().to_string())
            .collect();

        match provider.embed_batch(&texts).await {
            Ok(vectors) => {
                for (note, vector) in batch.iter().zip(vectors.iter()) {
                    store.save_embedding(note.id, Some(vector.as_slice())).await?;
                    stats.embedded += 1;
                }
            }
            Err(e) => {
                tracing::warn!(
                    event = "embedding_failed",
                    batch_size = batch.len(),
                    error = %e,
                );
                stats.failed += batch.len();
            }
        }
    }

    println!("embed pending");
    println!("  total pending: {}", stats.pending);
    println!("  embedded: {}", stats.embedded);
    println!("  failed: {}", stats.failed);

    store.pool().close().await;
    Ok(())
}
