//! Vector storage seam.
//!
//! The pipeline owns records only until they are handed to a store; after
//! upsert the store is the source of truth. The [`VectorStore`] trait is the
//! whole contract the core depends on:
//!
//! ```text
//!                  ┌──────────────────────┐
//!                  │  VectorStore trait   │
//!                  │ (upsert/query/count) │
//!                  └──────────┬───────────┘
//!                             │
//!              ┌──────────────┼───────────────┐
//!              ▼              ▼               ▼
//!      ┌──────────────┐ ┌───────────┐  ┌───────────┐
//!      │  InMemory    │ │ (external)│  │ (external)│
//!      │ cosine scan  │ │  Qdrant   │  │  pgvector │
//!      └──────────────┘ └───────────┘  └───────────┘
//! ```
//!
//! Collections are declared with a fixed dimensionality before any upsert;
//! ranking is cosine over raw vectors, which the indexer guarantees are
//! unit-normalized.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryVectorStore;

/// Key-value metadata carried alongside each vector.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// A record as handed to the store: stable id, unit vector, display payload.
///
/// The id is derived from a natural key (UUID v5), so re-ingesting identical
/// content overwrites the same record instead of duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// One nearest-neighbor hit, best-first by the store's metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPayload {
    pub payload: Payload,
    pub score: f32,
}

/// Failure surfaced by a vector store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown collection '{0}' (collections must be declared before use)")]
    UnknownCollection(String),

    #[error("vector dimension mismatch in '{collection}': expected {expected}, got {got}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        got: usize,
    },

    #[error("vector store backend failed: {0}")]
    Backend(String),
}

/// Opaque nearest-neighbor store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or overwrites records keyed by their id.
    async fn upsert(&self, collection: &str, records: Vec<IndexRecord>) -> Result<(), StoreError>;

    /// Returns up to `limit` hits ordered by descending similarity. Ties
    /// keep the store's native (insertion) order.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPayload>, StoreError>;

    /// Number of records currently held by the collection.
    async fn count(&self, collection: &str) -> Result<usize, StoreError>;
}
