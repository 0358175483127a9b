//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] capability that all embedding
//! backends implement, plus pure helpers for vector serialization and
//! cosine similarity/distance.
//!
//! Network-backed providers (OpenAI, Ollama) live in the `note-vault`
//! app crate. [`DisabledProvider`] lives here so that callers and tests
//! can model an unconfigured backend without the app crate.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Turns text into fixed-length vectors.
///
/// Providers are stateless between calls. Errors are
/// [`Error::AiService`] when the backend is unconfigured or the call
/// fails, and carry text length or batch size for diagnosis, never the
/// text itself.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Whether the backend has what it needs (credentials, endpoint) to be called.
    fn is_configured(&self) -> bool;

    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    ///
    /// `text` must be non-empty; callers trim and validate before calling.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::validation("cannot embed empty text"));
        }
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::ai_service(format!(
                    "empty embedding response (text_length={})",
                    text.chars().count()
                ))
            })
    }
}

/// A provider that is never configured; every call fails with
/// [`Error::AiService`].
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    fn is_configured(&self) -> bool {
        false
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::ai_service(format!(
            "embedding provider is disabled (batch_size={})",
            texts.len()
        )))
    }
}

/// Reject any vector whose length is not `dims`.
///
/// Providers call this on every response so a model change never writes
/// vectors that cannot be compared with the rest of the index.
pub fn check_dims(embeddings: &[Vec<f32>], dims: usize) -> Result<()> {
    if let Some(bad) = embeddings.iter().find(|v| v.len() != dims) {
        return Err(Error::ai_service(format!(
            "embedding has {} dims, expected {} (batch_size={})",
            bad.len(),
            dims,
            embeddings.len()
        )));
    }
    Ok(())
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use note_vault_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors
/// of different lengths, and zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance, `1 - cosine_similarity`, nominally in `[0.0, 2.0]`.
///
/// Float rounding can push it slightly outside that range; consumers
/// clamp when converting back to a similarity.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
        assert!((cosine_distance(&a, &b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_different_lengths() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_check_dims() {
        assert!(check_dims(&[vec![1.0, 2.0], vec![0.0, 0.5]], 2).is_ok());
        let err = check_dims(&[vec![1.0, 2.0], vec![1.0, 2.0, 3.0]], 2).unwrap_err();
        assert!(err.is_ai_service());
        assert!(err.to_string().contains("3 dims, expected 2"));
    }

    #[tokio::test]
    async fn test_disabled_provider_fails_with_ai_service_error() {
        let err = DisabledProvider.embed_text("hello").await.unwrap_err();
        assert!(err.is_ai_service());
        assert!(!err.to_string().contains("hello"));
    }

    #[tokio::test]
    async fn test_embed_text_rejects_empty_input() {
        let err = DisabledProvider.embed_text("").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
