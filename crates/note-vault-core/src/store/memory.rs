//! In-memory [`NoteStore`] implementation for tests and embedding-free use.
//!
//! Notes live in a `Vec` behind `std::sync::RwLock`. Nearest-neighbour
//! search is brute-force cosine distance over the owner's embedded notes.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::embedding::cosine_distance;
use crate::models::{Note, NoteId, UserId};

use super::{NoteFilter, NoteOrder, NoteStore};

/// In-memory store. Vector support can be switched off to exercise the
/// keyword-fallback retrieval path.
pub struct InMemoryStore {
    notes: RwLock<Vec<Note>>,
    vector_search: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            notes: RwLock::new(Vec::new()),
            vector_search: true,
        }
    }

    /// A store that reports no nearest-neighbour capability.
    pub fn without_vector_search() -> Self {
        Self {
            vector_search: false,
            ..Self::new()
        }
    }

    /// Insert a note with fresh timestamps and return it.
    pub fn insert(&self, owner: UserId, title: &str, content: &str, tags: &[&str]) -> Note {
        self.insert_at(owner, title, content, tags, Utc::now())
    }

    /// Insert a note with explicit `created_at`/`updated_at`.
    pub fn insert_at(
        &self,
        owner: UserId,
        title: &str,
        content: &str,
        tags: &[&str],
        at: DateTime<Utc>,
    ) -> Note {
        let mut notes = self.notes.write().unwrap();
        let id = notes.iter().map(|n| n.id).max().unwrap_or(0) + 1;
        let note = Note {
            id,
            owner_id: owner,
            title: title.to_string(),
            content: content.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            embedding: None,
            created_at: at,
            updated_at: at,
        };
        notes.push(note.clone());
        note
    }

    pub fn get(&self, id: NoteId) -> Option<Note> {
        self.notes.read().unwrap().iter().find(|n| n.id == id).cloned()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filter(note: &Note, filter: &NoteFilter) -> bool {
    if let Some(tag) = &filter.tag {
        if !note.tags.iter().any(|t| t == tag) {
            return false;
        }
    }
    match filter.has_embedding {
        Some(want) => note.has_embedding() == want,
        None => true,
    }
}

#[async_trait]
impl NoteStore for InMemoryStore {
    async fn find_notes_by_owner(
        &self,
        owner: UserId,
        filter: &NoteFilter,
        order: NoteOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Note>> {
        let notes = self.notes.read().unwrap();
        let mut selected: Vec<Note> = notes
            .iter()
            .filter(|n| n.owner_id == owner && matches_filter(n, filter))
            .cloned()
            .collect();
        match order {
            NoteOrder::UpdatedDesc => {
                selected.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)))
            }
            NoteOrder::CreatedDesc => {
                selected.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
            }
        }
        Ok(selected
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn nearest_by_embedding(
        &self,
        owner: UserId,
        query_vec: &[f32],
        limit: i64,
    ) -> Result<Vec<(Note, f64)>> {
        if !self.vector_search {
            return Err(anyhow!("vector search is not available on this store"));
        }
        let notes = self.notes.read().unwrap();
        let mut scored: Vec<(Note, f64)> = notes
            .iter()
            .filter(|n| n.owner_id == owner)
            .filter_map(|n| {
                let e = n.embedding.as_ref()?;
                if e.len() != query_vec.len() {
                    tracing::debug!(event = "embedding_dims_mismatch", note_id = n.id, dims = e.len());
                    return None;
                }
                Some((n.clone(), cosine_distance(query_vec, e)))
            })
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit.max(0) as usize);
        Ok(scored)
    }

    async fn save_embedding(&self, note_id: NoteId, embedding: Option<&[f32]>) -> Result<()> {
        let mut notes = self.notes.write().unwrap();
        let note = notes
            .iter_mut()
            .find(|n| n.id == note_id)
            .ok_or_else(|| anyhow!("note {} not found", note_id))?;
        note.embedding = embedding.map(|e| e.to_vec());
        Ok(())
    }

    async fn supports_vector_search(&self) -> bool {
        self.vector_search
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_find_notes_filters_by_owner_and_orders_by_recency() {
        let store = InMemoryStore::new();
        let t0 = Utc::now();
        store.insert_at(1, "old", "a", &[], t0);
        store.insert_at(2, "other owner", "b", &[], t0 + Duration::seconds(5));
        store.insert_at(1, "new", "c", &[], t0 + Duration::seconds(10));

        let notes = store
            .find_notes_by_owner(1, &NoteFilter::default(), NoteOrder::UpdatedDesc, 10, 0)
            .await
            .unwrap();
        let titles: Vec<&str> = notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_find_notes_limit_offset_and_filters() {
        let store = InMemoryStore::new();
        let a = store.insert(1, "a", "x", &["rust"]);
        store.insert(1, "b", "y", &[]);
        store.save_embedding(a.id, Some(&[1.0, 0.0])).await.unwrap();

        let tagged = store
            .find_notes_by_owner(
                1,
                &NoteFilter {
                    tag: Some("rust".into()),
                    has_embedding: None,
                },
                NoteOrder::CreatedDesc,
                10,
                0,
            )
            .await
            .unwrap();
        assert_eq!(tagged.len(), 1);

        let missing = store
            .find_notes_by_owner(
                1,
                &NoteFilter {
                    tag: None,
                    has_embedding: Some(false),
                },
                NoteOrder::UpdatedDesc,
                10,
                0,
            )
            .await
            .unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].title, "b");

        let page = store
            .find_notes_by_owner(1, &NoteFilter::default(), NoteOrder::UpdatedDesc, 1, 1)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn test_nearest_skips_unembedded_and_foreign_notes() {
        let store = InMemoryStore::new();
        let near = store.insert(1, "near", "x", &[]);
        let far = store.insert(1, "far", "y", &[]);
        store.insert(1, "unembedded", "z", &[]);
        let foreign = store.insert(2, "foreign", "w", &[]);
        store.save_embedding(near.id, Some(&[1.0, 0.0])).await.unwrap();
        store.save_embedding(far.id, Some(&[0.0, 1.0])).await.unwrap();
        store.save_embedding(foreign.id, Some(&[1.0, 0.0])).await.unwrap();

        let hits = store.nearest_by_embedding(1, &[1.0, 0.1], 10).await.unwrap();
        let titles: Vec<&str> = hits.iter().map(|(n, _)| n.title.as_str()).collect();
        assert_eq!(titles, vec!["near", "far"]);
        assert!(hits[0].1 <= hits[1].1);
    }

    #[tokio::test]
    async fn test_nearest_skips_vectors_of_another_length() {
        let store = InMemoryStore::new();
        let old = store.insert(1, "old model", "x", &[]);
        let current = store.insert(1, "current model", "y", &[]);
        store.save_embedding(old.id, Some(&[1.0, 0.0, 0.0])).await.unwrap();
        store.save_embedding(current.id, Some(&[0.0, 1.0])).await.unwrap();

        let hits = store.nearest_by_embedding(1, &[1.0, 0.0], 10).await.unwrap();
        let titles: Vec<&str> = hits.iter().map(|(n, _)| n.title.as_str()).collect();
        assert_eq!(titles, vec!["current model"]);
    }

    #[tokio::test]
    async fn test_without_vector_search_reports_capability() {
        let store = InMemoryStore::without_vector_search();
        assert!(!store.supports_vector_search().await);
        assert!(store.nearest_by_embedding(1, &[1.0], 1).await.is_err());
    }
}
