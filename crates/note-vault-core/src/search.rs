//! Retrieval engine with vector-similarity and keyword-fallback modes.
//!
//! The engine ranks one owner's notes for a query. Which strategy runs is
//! fixed when the engine is built, from the store's capability probe
//! ([`RetrievalBackend::detect`]); callers never choose. Both strategies
//! return the same [`RetrievalResult`] shape, sorted by similarity
//! descending.
//!
//! # Vector mode
//!
//! 1. Embed the query.
//! 2. Ask the store for the `top_k` nearest embedded notes of the owner.
//! 3. `similarity = clamp(1 - cosine_distance, 0, 1)`.
//!
//! Notes with no embedding are invisible in this mode.
//!
//! # Keyword mode
//!
//! 1. Lower-case the query, split on whitespace, drop tokens of two
//!    characters or fewer, dedupe.
//! 2. Take the owner's `pool_factor × top_k` most recently updated notes.
//! 3. Score each as `matched keywords / max(keywords, 1)` against the
//!    lower-cased title and content; notes matching nothing are dropped
//!    unless the keyword list is empty.
//! 4. Stable sort by score descending, truncate to `top_k`.
//!
//! The candidate pool, not the final result count, is bounded, so an old
//! note outside the pool is never found in this mode.

use std::sync::Arc;

use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::models::{clamp_unit, RetrievalResult, UserId};
use crate::store::{NoteFilter, NoteOrder, NoteStore};

/// Default number of results when the caller does not specify one.
pub const DEFAULT_TOP_K: usize = 5;

/// Default multiplier from `top_k` to the keyword candidate pool size.
pub const DEFAULT_KEYWORD_POOL_FACTOR: usize = 3;

/// Keyword tokens of this many characters or fewer are ignored.
pub const MAX_STOP_TOKEN_CHARS: usize = 2;

/// Ranking strategy, chosen once from store capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalBackend {
    Vector,
    Keyword,
}

impl RetrievalBackend {
    /// Probe the store: vector mode when it can answer nearest-neighbour
    /// queries, keyword fallback otherwise.
    pub async fn detect(store: &dyn NoteStore) -> Self {
        if store.supports_vector_search().await {
            RetrievalBackend::Vector
        } else {
            RetrievalBackend::Keyword
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalBackend::Vector => "vector",
            RetrievalBackend::Keyword => "keyword",
        }
    }
}

impl std::fmt::Display for RetrievalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranks an owner's notes for a query.
#[derive(Clone)]
pub struct RetrievalEngine {
    store: Arc<dyn NoteStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    backend: RetrievalBackend,
    keyword_pool_factor: usize,
}

impl RetrievalEngine {
    /// Build an engine with an explicit backend.
    pub fn new(
        store: Arc<dyn NoteStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        backend: RetrievalBackend,
    ) -> Self {
        Self {
            store,
            embedder,
            backend,
            keyword_pool_factor: DEFAULT_KEYWORD_POOL_FACTOR,
        }
    }

    /// Build an engine whose backend comes from the store's capability probe.
    pub async fn detect(store: Arc<dyn NoteStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let backend = RetrievalBackend::detect(store.as_ref()).await;
        Self::new(store, embedder, backend)
    }

    /// Override the keyword candidate pool multiplier (minimum 1).
    pub fn with_keyword_pool_factor(mut self, factor: usize) -> Self {
        self.keyword_pool_factor = factor.max(1);
        self
    }

    pub fn backend(&self) -> RetrievalBackend {
        self.backend
    }

    pub fn store(&self) -> &Arc<dyn NoteStore> {
        &self.store
    }

    /// Rank `owner`'s notes for `query`, returning at most `top_k` results.
    ///
    /// An empty result is not an error. `top_k == 0` returns no results
    /// without touching the store. In vector mode a blank query also
    /// returns nothing, since there is no text to embed; in keyword mode it
    /// has no keywords and ranks the candidate pool by recency.
    pub async fn search(
        &self,
        query: &str,
        owner: UserId,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        if self.backend == RetrievalBackend::Vector && query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let results = match self.backend {
            RetrievalBackend::Vector => self.vector_search(query, owner, top_k).await?,
            RetrievalBackend::Keyword => self.keyword_search(query, owner, top_k).await?,
        };

        tracing::info!(
            event = "semantic_search",
            backend = %self.backend,
            user_id = owner,
            query_length = query.chars().count(),
            results_count = results.len(),
        );
        Ok(results)
    }

    async fn vector_search(
        &self,
        query: &str,
        owner: UserId,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let query_vec = match self.embedder.embed_text(query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(event = "query_embedding_failed", error = %e, user_id = owner);
                return Err(Error::ai_service("failed to process search query"));
            }
        };

        let hits = self
            .store
            .nearest_by_embedding(owner, &query_vec, store_limit(top_k))
            .await?;

        Ok(hits
            .iter()
            .filter(|(note, _)| note.owner_id == owner)
            .take(top_k)
            .map(|(note, distance)| RetrievalResult::from_note(note, distance_to_similarity(*distance)))
            .collect())
    }

    async fn keyword_search(
        &self,
        query: &str,
        owner: UserId,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let keywords = extract_keywords(query);
        let pool = store_limit(top_k.saturating_mul(self.keyword_pool_factor));
        let candidates = self
            .store
            .find_notes_by_owner(owner, &NoteFilter::default(), NoteOrder::UpdatedDesc, pool, 0)
            .await?;

        let mut scored: Vec<RetrievalResult> = candidates
            .iter()
            .filter(|note| note.owner_id == owner)
            .filter_map(|note| {
                let haystack = format!("{} {}", note.title, note.content).to_lowercase();
                keyword_score(&keywords, &haystack)
                    .map(|score| RetrievalResult::from_note(note, score.min(1.0)))
            })
            .collect();

        // `sort_by` is stable: ties keep recency order.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        tracing::debug!(
            event = "keyword_search",
            user_id = owner,
            keywords = keywords.len(),
            candidates = candidates.len(),
            results_count = scored.len(),
        );
        Ok(scored)
    }
}

/// Store limits are `i64`; counts past `i64::MAX` saturate.
fn store_limit(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Convert a cosine distance to a similarity in `[0, 1]`.
///
/// Assumes cosine distance in `[0, 2]`; anything that maps outside the
/// unit interval is clamped.
pub fn distance_to_similarity(distance: f64) -> f64 {
    clamp_unit(1.0 - distance)
}

/// Lower-cased, whitespace-split query tokens longer than
/// [`MAX_STOP_TOKEN_CHARS`], deduplicated in first-seen order.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in query.to_lowercase().split_whitespace() {
        if token.chars().count() > MAX_STOP_TOKEN_CHARS && !keywords.iter().any(|k| k == token) {
            keywords.push(token.to_string());
        }
    }
    keywords
}

/// Fraction of `keywords` found in `haystack` (already lower-cased).
///
/// Returns `None` when nothing matched and there were keywords to match.
/// With no keywords every candidate is a match scoring `0.0`.
pub fn keyword_score(keywords: &[String], haystack: &str) -> Option<f64> {
    let matches = keywords
        .iter()
        .filter(|k| haystack.contains(k.as_str()))
        .count();
    if matches > 0 || keywords.is_empty() {
        Some(matches as f64 / keywords.len().max(1) as f64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_keywords_drops_short_tokens() {
        assert_eq!(
            extract_keywords("How is my Rust ownership model"),
            vec!["how", "rust", "ownership", "model"]
        );
        assert!(extract_keywords("a an to of").is_empty());
        assert!(extract_keywords("   ").is_empty());
    }

    #[test]
    fn test_extract_keywords_dedupes() {
        assert_eq!(extract_keywords("Rust rust RUST"), vec!["rust"]);
    }

    #[test]
    fn test_keyword_score_fraction() {
        let kws = extract_keywords("ownership model");
        assert_eq!(keyword_score(&kws, "rust ownership"), Some(0.5));
        assert_eq!(keyword_score(&kws, "go channels"), None);
        assert_eq!(keyword_score(&kws, "ownership model"), Some(1.0));
    }

    #[test]
    fn test_keyword_score_empty_keywords_matches_everything() {
        assert_eq!(keyword_score(&[], "anything"), Some(0.0));
    }

    #[test]
    fn test_distance_to_similarity_clamps() {
        assert_eq!(distance_to_similarity(0.0), 1.0);
        assert_eq!(distance_to_similarity(-0.0001), 1.0);
        assert_eq!(distance_to_similarity(1.5), 0.0);
        assert_eq!(distance_to_similarity(2.0), 0.0);
        assert!((distance_to_similarity(0.25) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_store_limit_saturates() {
        assert_eq!(store_limit(20), 20);
        assert_eq!(store_limit(usize::MAX), i64::MAX);
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(RetrievalBackend::Vector.to_string(), "vector");
        assert_eq!(RetrievalBackend::Keyword.as_str(), "keyword");
    }
}
