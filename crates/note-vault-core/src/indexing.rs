//! Embed-on-write for notes.
//!
//! Called right after a note is created or its title/content changes.
//! An AI-service failure here is not an error: the note keeps a `NULL`
//! embedding and simply stays out of vector retrieval until a backfill
//! succeeds. Store failures still propagate.

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::models::Note;
use crate::store::NoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The embedding was generated and saved.
    Embedded { dims: usize },
    /// Embedding failed; the note was saved without one.
    Unembedded,
}

impl IndexOutcome {
    pub fn is_embedded(&self) -> bool {
        matches!(self, IndexOutcome::Embedded { .. })
    }
}

/// Embed `note`'s title and content and store the vector.
pub async fn index_note(
    store: &dyn NoteStore,
    embedder: &dyn EmbeddingProvider,
    note: &Note,
) -> Result<IndexOutcome> {
    let text = note.embedding_text();
    match embedder.embed_text(text.trim()).await {
        Ok(vector) => {
            store.save_embedding(note.id, Some(&vector)).await?;
            tracing::info!(event = "embedding_generated", note_id = note.id, dims = vector.len());
            Ok(IndexOutcome::Embedded { dims: vector.len() })
        }
        Err(e @ (Error::AiService(_) | Error::Validation(_))) => {
            tracing::warn!(
                event = "embedding_failed",
                note_id = note.id,
                text_length = text.chars().count(),
                error = %e,
            );
            store.save_embedding(note.id, None).await?;
            Ok(IndexOutcome::Unembedded)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledProvider;
    use crate::store::memory::InMemoryStore;

    #[tokio::test]
    async fn test_failed_embedding_is_not_fatal() {
        let store = InMemoryStore::new();
        let note = store.insert(1, "Title", "Body", &[]);
        store.save_embedding(note.id, Some(&[0.5, 0.5])).await.unwrap();

        let outcome = index_note(&store, &DisabledProvider, &note).await.unwrap();
        assert_eq!(outcome, IndexOutcome::Unembedded);
        assert!(store.get(note.id).unwrap().embedding.is_none());
    }
}
