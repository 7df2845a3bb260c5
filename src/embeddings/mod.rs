//! Embedding seam: the pipeline consumes embedding models as an opaque
//! `input -> vector` service behind the [`Embedder`] trait.
//!
//! Vectors handed to the store must be unit L2-normalized because the store
//! ranks by cosine/inner-product over raw vectors; [`l2_normalize`] is the
//! shared helper for that. [`MockEmbedder`] provides a deterministic
//! bag-of-words provider for tests and demos, so retrieval ordering in the
//! test suite reflects genuine token overlap rather than fixture wiring.

use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;
use thiserror::Error;

/// Query or catalog image handed to the vision embedder.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Remote image, fetched by the embedding service itself.
    Url(String),
    /// Image bytes uploaded by a client.
    Bytes(Vec<u8>),
}

/// Failure surfaced by an embedding backend.
///
/// These are dependency failures, not input errors: the indexer counts
/// them as skips, the orchestrator surfaces them as an explicit "no result"
/// distinct from an empty index.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("input was empty or not embeddable")]
    EmptyInput,

    #[error("embedding backend failed: {0}")]
    Backend(String),
}

/// Opaque embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimensionality of every vector this embedder produces.
    fn dim(&self) -> usize;

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    async fn embed_image(&self, image: &ImageSource) -> Result<Vec<f32>, EmbedError>;
}

/// Scales `vector` to unit L2 norm in place. Zero vectors are left alone.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Deterministic embedding provider for tests and offline demos.
///
/// Text is embedded as a hashed bag of words: each token increments a
/// hash-selected dimension, then the vector is L2-normalized. Identical
/// inputs always produce identical vectors, and overlapping vocabularies
/// produce genuinely higher cosine similarity.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dim: usize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self { dim: 64 }
    }

    pub fn with_dim(dim: usize) -> Self {
        Self { dim }
    }

    fn bucket<T: Hash>(&self, token: T) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dim
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let mut vector = vec![0.0f32; self.dim];
        for token in text.split_whitespace() {
            vector[self.bucket(token)] += 1.0;
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }

    async fn embed_image(&self, image: &ImageSource) -> Result<Vec<f32>, EmbedError> {
        let mut vector = vec![0.0f32; self.dim];
        match image {
            ImageSource::Url(url) => {
                if url.trim().is_empty() {
                    return Err(EmbedError::EmptyInput);
                }
                for segment in url.split(['/', '.', '-', '_']) {
                    if !segment.is_empty() {
                        vector[self.bucket(segment)] += 1.0;
                    }
                }
            }
            ImageSource::Bytes(bytes) => {
                if bytes.is_empty() {
                    return Err(EmbedError::EmptyInput);
                }
                for window in bytes.chunks(8) {
                    vector[self.bucket(window)] += 1.0;
                }
            }
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let embedder = MockEmbedder::new();
        let a = embedder.embed_text("tranh phong cảnh").await.unwrap();
        let b = embedder.embed_text("tranh phong cảnh").await.unwrap();
        assert_eq!(a, b);

        let c = embedder.embed_text("tranh tĩnh vật").await.unwrap();
        assert_ne!(a, c, "different text should embed differently");
    }

    #[tokio::test]
    async fn mock_embeddings_are_unit_norm() {
        let embedder = MockEmbedder::new();
        let vector = embedder
            .embed_text("núi sông biển trời mây")
            .await
            .unwrap();
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected() {
        let embedder = MockEmbedder::new();
        assert!(matches!(
            embedder.embed_text("   ").await,
            Err(EmbedError::EmptyInput)
        ));
        assert!(matches!(
            embedder.embed_image(&ImageSource::Bytes(vec![])).await,
            Err(EmbedError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn overlapping_vocabulary_scores_higher() {
        let embedder = MockEmbedder::new();
        let query = embedder.embed_text("tranh sơn dầu vùng cao").await.unwrap();
        let close = embedder
            .embed_text("tranh sơn dầu vùng cao rất đẹp")
            .await
            .unwrap();
        let far = embedder.embed_text("bình gốm cổ điển").await.unwrap();

        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&query, &close) > dot(&query, &far));
    }

    #[test]
    fn normalize_leaves_zero_vector_untouched() {
        let mut vector = vec![0.0f32; 4];
        l2_normalize(&mut vector);
        assert_eq!(vector, vec![0.0f32; 4]);
    }
}
