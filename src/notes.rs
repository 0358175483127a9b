//! `vault add` / `vault edit`: write a note and embed it.

use anyhow::{bail, Result};

use note_vault_core::indexing::{index_note, IndexOutcome};
use note_vault_core::models::{NoteId, UserId};

use crate::config::Config;
use crate::embedding;
use crate::sqlite_store::{NoteUpdate, SqliteStore};

pub async fn run_add(
    config: &Config,
    owner: UserId,
    title: &str,
    content: &str,
    tags: Vec<String>,
) -> Result<()> {
    if title.trim().is_empty() {
        bail!("--title must not be empty");
    }

    let embedder = embedding::create_provider(&config.embedding)?;
    let store = SqliteStore::open(config, embedder.as_ref()).await?;

    let note = store.insert_note(owner, title, content, &tags).await?;
    let outcome = index_note(&store, embedder.as_ref(), &note).await?;

    println!("added note {}", note.id);
    print_outcome(outcome);

    store.pool().close().await;
    Ok(())
}

pub async fn run_edit(
    config: &Config,
    id: NoteId,
    owner: UserId,
    update: NoteUpdate,
) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update. Pass --title, --content, --tag or --clear-tags.");
    }
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        bail!("--title must not be empty");
    }

    let embedder = embedding::create_provider(&config.embedding)?;
    let store = SqliteStore::open(config, embedder.as_ref()).await?;

    let Some(note) = store.update_note(id, owner, &update).await? else {
        bail!("Note {} not found", id);
    };

    println!("updated note {}", note.id);
    if update.changes_text() {
        let outcome = index_note(&store, embedder.as_ref(), &note).await?;
        print_outcome(outcome);
    }

    store.pool().close().await;
    Ok(())
}

fn print_outcome(outcome: IndexOutcome) {
    match outcome {
        IndexOutcome::Embedded { dims } => println!("  embedded: yes ({} dims)", dims),
        IndexOutcome::Unembedded => println!("  embedded: no"),
    }
}
