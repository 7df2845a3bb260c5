//! Batch vectorize-and-upsert indexing.
//!
//! The indexer turns catalog items and knowledge chunks into
//! [`IndexRecord`]s and submits them to the vector store in bounded,
//! sequential batches. Semantics are at-least-once and non-transactional: a
//! failed batch is counted and logged but never rolls back batches already
//! committed, and a record that cannot be embedded is skipped rather than
//! aborting the run. Record ids are UUID v5 over a stable natural key, so
//! re-running ingestion on unchanged data overwrites instead of
//! duplicating.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::embeddings::{Embedder, ImageSource, l2_normalize};
use crate::stores::{IndexRecord, Payload, VectorStore};
use crate::types::{Chunk, PipelineError};

/// Product record as produced by the upstream catalog service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Target collection and batching knobs for one indexing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub collection: String,
    /// Records per upsert call; must stay under the transport's payload
    /// ceiling.
    pub batch_size: usize,
    /// UUID v5 namespace for natural-key record ids.
    pub namespace: Uuid,
}

impl IndexConfig {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            batch_size: 50,
            namespace: Uuid::NAMESPACE_DNS,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.collection.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "index collection name is empty".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "index batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one indexing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Records accepted by the store.
    pub written: usize,
    /// Items dropped before upsert (missing content or embedding failure).
    pub skipped: usize,
    /// Batches the store rejected; earlier batches stay committed.
    pub failed_batches: usize,
}

#[derive(Debug, Clone)]
pub struct Indexer {
    config: IndexConfig,
}

impl Indexer {
    pub fn new(config: IndexConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Deterministic record id from a stable natural key.
    pub fn record_id(&self, natural_key: &str) -> Uuid {
        Uuid::new_v5(&self.config.namespace, natural_key.as_bytes())
    }

    /// Vectorizes catalog items by image and upserts them in batches.
    ///
    /// Items without an image reference, and items whose embedding fails,
    /// are skipped and counted; neither aborts the run.
    pub async fn index_items(
        &self,
        items: &[CatalogItem],
        embedder: &dyn Embedder,
        store: &dyn VectorStore,
    ) -> IndexReport {
        let mut report = IndexReport::default();
        let mut records = Vec::new();

        for item in items {
            let Some(image_url) = item.image_url.as_deref().filter(|u| !u.trim().is_empty())
            else {
                warn!(item = %item.name, "skipping item without image reference");
                report.skipped += 1;
                continue;
            };

            match embedder
                .embed_image(&ImageSource::Url(image_url.to_string()))
                .await
            {
                Ok(mut vector) => {
                    l2_normalize(&mut vector);
                    records.push(IndexRecord {
                        id: self.record_id(&item.id),
                        vector,
                        payload: item_payload(item),
                    });
                }
                Err(err) => {
                    warn!(item = %item.name, error = %err, "skipping item that failed to embed");
                    report.skipped += 1;
                }
            }
        }

        self.submit(records, store, &mut report).await;
        info!(
            collection = %self.config.collection,
            written = report.written,
            skipped = report.skipped,
            failed_batches = report.failed_batches,
            "item indexing run finished"
        );
        report
    }

    /// Vectorizes knowledge chunks by text and upserts them in batches.
    pub async fn index_chunks(
        &self,
        chunks: &[Chunk],
        embedder: &dyn Embedder,
        store: &dyn VectorStore,
    ) -> IndexReport {
        let mut report = IndexReport::default();
        let mut records = Vec::new();

        for chunk in chunks {
            if chunk.content.trim().is_empty() {
                report.skipped += 1;
                continue;
            }

            match embedder.embed_text(&chunk.content).await {
                Ok(mut vector) => {
                    l2_normalize(&mut vector);
                    records.push(IndexRecord {
                        id: self.record_id(&chunk_key(chunk)),
                        vector,
                        payload: chunk_payload(chunk),
                    });
                }
                Err(err) => {
                    warn!(
                        source = %chunk.source,
                        index = chunk.index,
                        error = %err,
                        "skipping chunk that failed to embed"
                    );
                    report.skipped += 1;
                }
            }
        }

        self.submit(records, store, &mut report).await;
        info!(
            collection = %self.config.collection,
            written = report.written,
            skipped = report.skipped,
            failed_batches = report.failed_batches,
            "chunk indexing run finished"
        );
        report
    }

    /// Submits records batch-by-batch, sequentially, so only one batch of
    /// vectors is in flight at a time and failure accounting stays simple.
    async fn submit(
        &self,
        records: Vec<IndexRecord>,
        store: &dyn VectorStore,
        report: &mut IndexReport,
    ) {
        let total_batches = records.len().div_ceil(self.config.batch_size).max(1);
        for (batch_number, batch) in records.chunks(self.config.batch_size).enumerate() {
            match store.upsert(&self.config.collection, batch.to_vec()).await {
                Ok(()) => {
                    report.written += batch.len();
                    debug!(
                        collection = %self.config.collection,
                        batch = batch_number + 1,
                        of = total_batches,
                        size = batch.len(),
                        "batch upserted"
                    );
                }
                Err(err) => {
                    report.failed_batches += 1;
                    error!(
                        collection = %self.config.collection,
                        batch = batch_number + 1,
                        of = total_batches,
                        error = %err,
                        "batch upsert failed; continuing with remaining batches"
                    );
                }
            }
        }
    }
}

/// Natural key for a chunk: source, position and a content prefix.
fn chunk_key(chunk: &Chunk) -> String {
    let prefix: String = chunk.content.chars().take(50).collect();
    format!("{}_{}_{}", chunk.source, chunk.index, prefix)
}

/// Bounded set of display fields carried into the store.
fn item_payload(item: &CatalogItem) -> Payload {
    let mut payload = Payload::new();
    payload.insert("original_id".into(), json!(item.id));
    payload.insert("name".into(), json!(item.name));
    payload.insert("price".into(), json!(item.price));
    payload.insert("image_url".into(), json!(item.image_url));
    payload.insert(
        "category".into(),
        json!(item.category.clone().unwrap_or_default()),
    );
    payload.insert("tags".into(), json!(item.tags));
    payload
}

fn chunk_payload(chunk: &Chunk) -> Payload {
    let mut payload = Payload::new();
    payload.insert("content".into(), json!(chunk.content));
    payload.insert("source".into(), json!(chunk.source));
    payload.insert("chunk_index".into(), json!(chunk.index));
    payload.insert("chunk_size".into(), json!(chunk.size));
    payload
}
