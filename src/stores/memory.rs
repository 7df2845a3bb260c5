//! In-memory reference backend: a brute-force cosine scan.
//!
//! Used by the test suite and offline demos. Semantics match the external
//! store contract: last write wins per id, results are ordered by
//! descending cosine similarity, and score ties retain insertion order.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{IndexRecord, ScoredPayload, StoreError, VectorStore};

#[derive(Debug, Default)]
struct Collection {
    dim: usize,
    /// Insertion order of ids, which doubles as the tie-break order.
    order: Vec<Uuid>,
    records: HashMap<Uuid, IndexRecord>,
}

/// Thread-safe map of pre-declared collections.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a collection with a fixed vector dimensionality.
    ///
    /// Re-declaring an existing collection resets it, mirroring the
    /// recreate-on-ingest behavior of the external store.
    pub fn create_collection(&self, name: impl Into<String>, dim: usize) {
        let mut collections = self.collections.write();
        collections.insert(
            name.into(),
            Collection {
                dim,
                order: Vec::new(),
                records: HashMap::new(),
            },
        );
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, collection: &str, records: Vec<IndexRecord>) -> Result<(), StoreError> {
        let mut collections = self.collections.write();
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        for record in records {
            if record.vector.len() != entry.dim {
                return Err(StoreError::DimensionMismatch {
                    collection: collection.to_string(),
                    expected: entry.dim,
                    got: record.vector.len(),
                });
            }
            if !entry.records.contains_key(&record.id) {
                entry.order.push(record.id);
            }
            entry.records.insert(record.id, record);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPayload>, StoreError> {
        let collections = self.collections.read();
        let entry = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        if vector.len() != entry.dim {
            return Err(StoreError::DimensionMismatch {
                collection: collection.to_string(),
                expected: entry.dim,
                got: vector.len(),
            });
        }

        let mut hits: Vec<ScoredPayload> = entry
            .order
            .iter()
            .filter_map(|id| entry.records.get(id))
            .map(|record| ScoredPayload {
                payload: record.payload.clone(),
                score: cosine(vector, &record.vector),
            })
            .collect();

        // Stable sort keeps insertion order for equal scores.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let collections = self.collections.read();
        let entry = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(entry.records.len())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
