//! Core data models used throughout Note Vault.
//!
//! A [`Note`] is owned by exactly one user and is the unit of retrieval.
//! [`RetrievalResult`] and [`Citation`] are ephemeral, computed per query
//! and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type NoteId = i64;
pub type UserId = i64;

/// Maximum number of characters kept in an excerpt before the ellipsis.
pub const EXCERPT_CHARS: usize = 200;

/// A personal note as stored by the persistence layer.
///
/// `embedding` is `None` when the note has not been embedded yet or when
/// embedding generation failed; such notes are still valid and are only
/// invisible to vector-similarity retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub owner_id: UserId,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// The canonical text that gets embedded: title and content joined by a newline.
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.title, self.content)
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// A ranked note returned by the retrieval engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub note_id: NoteId,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Relevance score in `[0.0, 1.0]`.
    pub similarity: f64,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RetrievalResult {
    /// Build a result from a note, clamping `similarity` into `[0, 1]`.
    pub fn from_note(note: &Note, similarity: f64) -> Self {
        Self {
            note_id: note.id,
            title: note.title.clone(),
            content: note.content.clone(),
            tags: note.tags.clone(),
            similarity: clamp_unit(similarity),
            excerpt: excerpt(&note.content),
            created_at: Some(note.created_at),
            updated_at: Some(note.updated_at),
        }
    }
}

/// Display-oriented reference to a source note. A strict projection of
/// [`RetrievalResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub note_id: NoteId,
    pub title: String,
    pub excerpt: String,
    pub similarity: f64,
}

impl From<&RetrievalResult> for Citation {
    fn from(result: &RetrievalResult) -> Self {
        Self {
            note_id: result.note_id,
            title: result.title.clone(),
            excerpt: result.excerpt.clone(),
            similarity: result.similarity,
        }
    }
}

/// First [`EXCERPT_CHARS`] characters of `content`, with `"..."` appended
/// only when the content is longer than that.
///
/// ```rust
/// use note_vault_core::models::excerpt;
///
/// assert_eq!(excerpt("short note"), "short note");
/// assert_eq!(excerpt(&"a".repeat(201)).chars().count(), 203);
/// ```
pub fn excerpt(content: &str) -> String {
    match content.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Clamp a score into `[0.0, 1.0]`. NaN maps to `0.0`.
pub fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
