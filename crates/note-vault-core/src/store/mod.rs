//! Storage abstraction for Note Vault.
//!
//! The [`NoteStore`] trait is the narrow slice of persistence the
//! retrieval pipeline needs: listing an owner's notes, answering "k
//! nearest vectors" queries, and writing embeddings. Note CRUD, users,
//! and sessions belong to the persistence layer and are not modelled here.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Note, NoteId, UserId};

/// Candidate-selection order for [`NoteStore::find_notes_by_owner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteOrder {
    /// Most recently updated first. Used by keyword-fallback retrieval.
    #[default]
    UpdatedDesc,
    /// Most recently created first.
    CreatedDesc,
}

/// Optional filters for [`NoteStore::find_notes_by_owner`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    /// Only notes carrying this tag.
    pub tag: Option<String>,
    /// `Some(true)` for embedded notes only, `Some(false)` for notes still
    /// missing an embedding.
    pub has_embedding: Option<bool>,
}

/// Abstract storage backend for notes.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_notes_by_owner`](NoteStore::find_notes_by_owner) | Ordered, filtered page of one owner's notes |
/// | [`nearest_by_embedding`](NoteStore::nearest_by_embedding) | Owner-scoped nearest neighbours by cosine distance |
/// | [`save_embedding`](NoteStore::save_embedding) | Write or clear a note's embedding |
/// | [`supports_vector_search`](NoteStore::supports_vector_search) | Capability probe for nearest-neighbour queries |
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Notes owned by `owner`, filtered, ordered, and paginated.
    ///
    /// Must never return another owner's notes.
    async fn find_notes_by_owner(
        &self,
        owner: UserId,
        filter: &NoteFilter,
        order: NoteOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Note>>;

    /// The `limit` notes of `owner` whose embeddings are closest to
    /// `query_vec`, as `(note, cosine distance)` in ascending distance.
    ///
    /// Notes without an embedding are never returned. Only meaningful when
    /// [`supports_vector_search`](NoteStore::supports_vector_search) is true.
    async fn nearest_by_embedding(
        &self,
        owner: UserId,
        query_vec: &[f32],
        limit: i64,
    ) -> Result<Vec<(Note, f64)>>;

    /// Store `embedding` for a note, or clear it with `None`.
    async fn save_embedding(&self, note_id: NoteId, embedding: Option<&[f32]>) -> Result<()>;

    /// Whether this store can answer [`nearest_by_embedding`](NoteStore::nearest_by_embedding).
    async fn supports_vector_search(&self) -> bool;
}
