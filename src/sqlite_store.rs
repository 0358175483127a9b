//! SQLite-backed [`NoteStore`] implementation.
//!
//! Notes live in a single `notes` table (see [`crate::migrate`]).
//! Nearest-neighbour search loads the owner's embedded notes and ranks them
//! by cosine distance in process, so no SQLite extension is needed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use note_vault_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob, EmbeddingProvider};
use note_vault_core::models::{Note, NoteId, UserId};
use note_vault_core::store::{NoteFilter, NoteOrder, NoteStore};

use crate::config::Config;
use crate::db;

const NOTE_COLUMNS: &str =
    "id, owner_id, title, content, tags_json, embedding, created_at, updated_at";

/// Partial update for [`SqliteStore::update_note`]; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl NoteUpdate {
    /// Title or content changed, so the embedding is stale.
    pub fn changes_text(&self) -> bool {
        self.title.is_some() || self.content.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.changes_text() && self.tags.is_none()
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
    vector_search: bool,
    embedding_model: Option<String>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, vector_search: bool) -> Self {
        Self {
            pool,
            vector_search,
            embedding_model: None,
        }
    }

    /// Connect to the configured database. Vector search follows
    /// `[retrieval] vector_search`; saved embeddings are tagged with
    /// `embedder`'s model name.
    pub async fn open(config: &Config, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        let pool = db::connect(config).await?;
        let vector_search = config.retrieval.vector_enabled(&config.embedding);
        Ok(Self::new(pool, vector_search).with_embedding_model(embedder.model_name()))
    }

    /// Record `model` alongside every embedding this store saves.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert_note(
        &self,
        owner: UserId,
        title: &str,
        content: &str,
        tags: &[String],
    ) -> Result<Note> {
        let now = Utc::now().timestamp_millis();
        let tags_json = serde_json::to_string(tags)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO notes (owner_id, title, content, tags_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(owner)
        .bind(title)
        .bind(content)
        .bind(&tags_json)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        self.get_note(id, owner)
            .await?
            .with_context(|| format!("note {} vanished after insert", id))
    }

    /// Apply `update` to `owner`'s note `id`. `None` when no such note exists.
    pub async fn update_note(
        &self,
        id: NoteId,
        owner: UserId,
        update: &NoteUpdate,
    ) -> Result<Option<Note>> {
        let Some(current) = self.get_note(id, owner).await? else {
            return Ok(None);
        };

        let title = update.title.as_deref().unwrap_or(&current.title);
        let content = update.content.as_deref().unwrap_or(&current.content);
        let tags = update.tags.as_ref().unwrap_or(&current.tags);

        sqlx::query(
            r#"
            UPDATE notes
            SET title = ?, content = ?, tags_json = ?, updated_at = ?
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(serde_json::to_string(tags)?)
        .bind(Utc::now().timestamp_millis())
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        self.get_note(id, owner).await
    }

    pub async fn get_note(&self, id: NoteId, owner: UserId) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM notes WHERE id = ? AND owner_id = ?",
            NOTE_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_note).transpose()
    }

    /// Notes of any owner with no embedding, oldest first.
    pub async fn notes_missing_embedding(&self, limit: Option<usize>) -> Result<Vec<Note>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notes WHERE embedding IS NULL ORDER BY id ASC LIMIT ?",
            NOTE_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_note).collect()
    }
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).with_context(|| format!("invalid timestamp: {}", ms))
}

fn row_to_note(row: &SqliteRow) -> Result<Note> {
    let tags_json: String = row.get("tags_json");
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .with_context(|| format!("invalid tags_json for note {}", row.get::<i64, _>("id")))?;
    let embedding: Option<Vec<u8>> = row.get("embedding");

    Ok(Note {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        content: row.get("content"),
        tags,
        embedding: embedding.as_deref().map(blob_to_vec),
        created_at: millis_to_datetime(row.get("created_at"))?,
        updated_at: millis_to_datetime(row.get("updated_at"))?,
    })
}

#[async_trait]
impl NoteStore for SqliteStore {
    async fn find_notes_by_owner(
        &self,
        owner: UserId,
        filter: &NoteFilter,
        order: NoteOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Note>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM notes WHERE owner_id = ",
            NOTE_COLUMNS
        ));
        qb.push_bind(owner);

        match filter.has_embedding {
            Some(true) => {
                qb.push(" AND embedding IS NOT NULL");
            }
            Some(false) => {
                qb.push(" AND embedding IS NULL");
            }
            None => {}
        }
        if let Some(tag) = &filter.tag {
            qb.push(" AND EXISTS (SELECT 1 FROM json_each(notes.tags_json) WHERE value = ");
            qb.push_bind(tag.clone());
            qb.push(")");
        }

        qb.push(match order {
            NoteOrder::UpdatedDesc => " ORDER BY updated_at DESC, id DESC",
            NoteOrder::CreatedDesc => " ORDER BY created_at DESC, id DESC",
        });
        qb.push(" LIMIT ");
        qb.push_bind(limit.max(0));
        qb.push(" OFFSET ");
        qb.push_bind(offset.max(0));

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_note).collect()
    }

    async fn nearest_by_embedding(
        &self,
        owner: UserId,
        query_vec: &[f32],
        limit: i64,
    ) -> Result<Vec<(Note, f64)>> {
        if !self.vector_search {
            anyhow::bail!("vector search is disabled for this store");
        }

        let rows = sqlx::query(&format!(
            "SELECT {} FROM notes WHERE owner_id = ? AND embedding IS NOT NULL",
            NOTE_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let note = row_to_note(row)?;
            if let Some(vec) = &note.embedding {
                if vec.len() != query_vec.len() {
                    tracing::debug!(
                        event = "embedding_dims_mismatch",
                        note_id = note.id,
                        dims = vec.len(),
                        query_dims = query_vec.len(),
                    );
                    continue;
                }
                let distance = cosine_distance(query_vec, vec);
                scored.push((note, distance));
            }
        }

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit.max(0) as usize);
        Ok(scored)
    }

    async fn save_embedding(&self, note_id: NoteId, embedding: Option<&[f32]>) -> Result<()> {
        let blob = embedding.map(vec_to_blob);
        let model = embedding.and(self.embedding_model.as_deref());

        let result = sqlx::query("UPDATE notes SET embedding = ?, embedding_model = ? WHERE id = ?")
            .bind(blob)
            .bind(model)
            .bind(note_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("note {} not found", note_id);
        }
        Ok(())
    }

    async fn supports_vector_search(&self) -> bool {
        self.vector_search
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store(vector_search: bool) -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::apply(&pool).await.unwrap();
        SqliteStore::new(pool, vector_search).with_embedding_model("test-model")
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let store = store(true).await;
        let note = store
            .insert_note(1, "Title", "Body", &["rust".to_string()])
            .await
            .unwrap();
        assert!(note.id > 0);
        assert_eq!(note.tags, vec!["rust"]);
        assert!(note.embedding.is_none());

        let fetched = store.get_note(note.id, 1).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Title");
        assert!(store.get_note(note.id, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_unset_fields() {
        let store = store(true).await;
        let note = store
            .insert_note(1, "Old", "Body", &["a".to_string()])
            .await
            .unwrap();

        let update = NoteUpdate {
            title: Some("New".into()),
            ..Default::default()
        };
        assert!(update.changes_text());
        let updated = store.update_note(note.id, 1, &update).await.unwrap().unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(updated.content, "Body");
        assert_eq!(updated.tags, vec!["a"]);
        assert!(updated.updated_at >= note.updated_at);

        assert!(store.update_note(note.id, 2, &update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_embedding_and_nearest() {
        let store = store(true).await;
        let near = store.insert_note(1, "near", "x", &[]).await.unwrap();
        let far = store.insert_note(1, "far", "y", &[]).await.unwrap();
        store.insert_note(1, "unembedded", "z", &[]).await.unwrap();
        let foreign = store.insert_note(2, "foreign", "w", &[]).await.unwrap();

        store.save_embedding(near.id, Some(&[1.0, 0.0])).await.unwrap();
        store.save_embedding(far.id, Some(&[0.0, 1.0])).await.unwrap();
        store.save_embedding(foreign.id, Some(&[1.0, 0.0])).await.unwrap();

        let hits = store.nearest_by_embedding(1, &[1.0, 0.1], 10).await.unwrap();
        let titles: Vec<&str> = hits.iter().map(|(n, _)| n.title.as_str()).collect();
        assert_eq!(titles, vec!["near", "far"]);
        assert!(hits[0].1 < hits[1].1);

        let model: Option<String> =
            sqlx::query_scalar("SELECT embedding_model FROM notes WHERE id = ?")
                .bind(near.id)
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(model.as_deref(), Some("test-model"));
    }

    #[tokio::test]
    async fn test_clearing_embedding() {
        let store = store(true).await;
        let note = store.insert_note(1, "t", "c", &[]).await.unwrap();
        store.save_embedding(note.id, Some(&[0.5])).await.unwrap();
        store.save_embedding(note.id, None).await.unwrap();

        assert!(store.get_note(note.id, 1).await.unwrap().unwrap().embedding.is_none());
        assert_eq!(store.notes_missing_embedding(None).await.unwrap().len(), 1);
        assert!(store.save_embedding(9999, None).await.is_err());
    }

    #[tokio::test]
    async fn test_find_notes_filters_and_pages() {
        let store = store(false).await;
        let a = store
            .insert_note(1, "a", "x", &["rust".to_string()])
            .await
            .unwrap();
        store.insert_note(1, "b", "y", &[]).await.unwrap();
        store.insert_note(2, "c", "z", &["rust".to_string()]).await.unwrap();
        store.save_embedding(a.id, Some(&[1.0])).await.unwrap();

        let all = store
            .find_notes_by_owner(1, &NoteFilter::default(), NoteOrder::UpdatedDesc, 10, 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "b");

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
        assert_eq!(tagged[0].title, "a");

        let unembedded = store
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
        assert_eq!(unembedded.len(), 1);
        assert_eq!(unembedded[0].title, "b");

        let page = store
            .find_notes_by_owner(1, &NoteFilter::default(), NoteOrder::UpdatedDesc, 1, 1)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "a");
    }

    #[tokio::test]
    async fn test_nearest_skips_embeddings_of_another_length() {
        let store = store(true).await;
        let old = store.insert_note(1, "old model", "x", &[]).await.unwrap();
        let current = store.insert_note(1, "current model", "y", &[]).await.unwrap();
        store.save_embedding(old.id, Some(&[1.0, 0.0, 0.0])).await.unwrap();
        store.save_embedding(current.id, Some(&[0.0, 1.0])).await.unwrap();

        let hits = store.nearest_by_embedding(1, &[1.0, 0.0], 10).await.unwrap();
        let titles: Vec<&str> = hits.iter().map(|(n, _)| n.title.as_str()).collect();
        assert_eq!(titles, vec!["current model"]);
    }

    #[tokio::test]
    async fn test_corrupt_tags_are_an_error() {
        let store = store(true).await;
        let note = store.insert_note(1, "t", "c", &[]).await.unwrap();
        sqlx::query("UPDATE notes SET tags_json = 'not json' WHERE id = ?")
            .bind(note.id)
            .execute(store.pool())
            .await
            .unwrap();

        let err = store.get_note(note.id, 1).await.unwrap_err();
        assert!(err.to_string().contains("invalid tags_json"));
    }

    #[tokio::test]
    async fn test_vector_search_disabled() {
        let store = store(false).await;
        assert!(!store.supports_vector_search().await);
        assert!(store.nearest_by_embedding(1, &[1.0], 5).await.is_err());
    }
}
