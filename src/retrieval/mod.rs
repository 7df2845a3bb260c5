//! Two-stage retrieval orchestration.
//!
//! Item lookup is single-stage: embed the query image and return the
//! store's cosine ranking directly. Knowledge lookup is two-stage: the
//! coarse vector search deliberately over-fetches (the embedding model is
//! tuned for recall, not precision) and a reranker re-scores the shortlist
//! against the query. Failures degrade instead of propagating blindly:
//! a dead reranker falls back to coarse order and is reported as a typed
//! [`Degradation`], while a dead embedder surfaces as
//! [`RetrievalError::Embedding`], explicitly distinguishable from a query
//! that simply matched nothing.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::embeddings::{EmbedError, Embedder, ImageSource, l2_normalize};
use crate::stores::{Payload, StoreError, VectorStore};
use crate::types::PipelineError;

/// Failure surfaced by a rerank backend.
#[derive(Debug, Error)]
pub enum RerankError {
    #[error("rerank backend failed: {0}")]
    Backend(String),
}

/// Opaque precision-scoring service.
///
/// Returns the candidates best-first. Must tolerate an empty candidate
/// list by returning an empty list.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_k: usize,
    ) -> Result<Vec<String>, RerankError>;
}

/// A query that could not produce a result at all.
///
/// Distinct from an `Ok` with zero hits: an embedding failure means the
/// index was never consulted, and observability must not collapse the two.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query embedding unavailable: {0}")]
    Embedding(#[from] EmbedError),

    #[error("vector store query failed: {0}")]
    Storage(#[from] StoreError),
}

/// Collection names and over-fetch arithmetic for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub items_collection: String,
    pub knowledge_collection: String,
    /// Coarse candidates fetched per requested result.
    pub coarse_multiplier: usize,
    /// Minimum coarse fetch regardless of `limit`.
    pub coarse_floor: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            items_collection: "paintings".into(),
            knowledge_collection: "knowledge".into(),
            coarse_multiplier: 3,
            coarse_floor: 10,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.coarse_multiplier == 0 {
            return Err(PipelineError::InvalidConfig(
                "coarse_multiplier must be at least 1".into(),
            ));
        }
        if self.items_collection.trim().is_empty() || self.knowledge_collection.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "retrieval collection names must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// One ranked catalog item, scored by the store's cosine metric.
#[derive(Debug, Clone)]
pub struct ItemMatch {
    pub payload: Payload,
    pub score: f32,
}

/// How far a knowledge answer fell from the full two-stage pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    /// Full pipeline ran (or no reranker was configured).
    None,
    /// The reranker failed; passages carry coarse recall-only order.
    RerankUnavailable,
}

/// Ranked, deduplicated knowledge passages for the response generator.
#[derive(Debug, Clone)]
pub struct KnowledgeAnswer {
    pub passages: Vec<String>,
    pub degradation: Degradation,
}

impl KnowledgeAnswer {
    fn empty() -> Self {
        Self {
            passages: Vec::new(),
            degradation: Degradation::None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Prompt-ready context block: passages joined by a blank line.
    pub fn context(&self) -> String {
        self.passages.join("\n\n")
    }
}

/// Dependency-injected query front end over the embedder, the vector store
/// and an optional reranker. Holds no mutable state; concurrent queries
/// are independent.
pub struct RetrievalOrchestrator {
    config: RetrievalConfig,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RetrievalOrchestrator {
    pub fn new(
        config: RetrievalConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            embedder,
            store,
            reranker: None,
        })
    }

    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Coarse fetch size for a two-stage query.
    pub fn coarse_limit(&self, limit: usize) -> usize {
        (limit * self.config.coarse_multiplier).max(self.config.coarse_floor)
    }

    /// Single-stage image-similarity lookup.
    ///
    /// Results keep the store's cosine order and are deduplicated by
    /// `original_id`.
    pub async fn find_similar_items(
        &self,
        image: &ImageSource,
        limit: usize,
    ) -> Result<Vec<ItemMatch>, RetrievalError> {
        let mut vector = self.embedder.embed_image(image).await?;
        l2_normalize(&mut vector);

        let hits = self
            .store
            .query(&self.config.items_collection, &vector, limit)
            .await?;

        let mut seen = BTreeSet::new();
        let matches: Vec<ItemMatch> = hits
            .into_iter()
            .filter(|hit| {
                match hit.payload.get("original_id").and_then(|v| v.as_str()) {
                    Some(id) => seen.insert(id.to_string()),
                    // Hits without an id cannot be deduplicated; keep them.
                    None => true,
                }
            })
            .map(|hit| ItemMatch {
                payload: hit.payload,
                score: hit.score,
            })
            .collect();

        debug!(
            collection = %self.config.items_collection,
            returned = matches.len(),
            "item similarity lookup finished"
        );
        Ok(matches)
    }

    /// Two-stage knowledge lookup: coarse over-fetch, then rerank.
    pub async fn search_knowledge(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<KnowledgeAnswer, RetrievalError> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(KnowledgeAnswer::empty());
        }

        let mut vector = self.embedder.embed_text(query).await?;
        l2_normalize(&mut vector);

        let coarse_limit = self.coarse_limit(limit);
        let hits = self
            .store
            .query(&self.config.knowledge_collection, &vector, coarse_limit)
            .await?;

        let mut seen = BTreeSet::new();
        let mut candidates: Vec<String> = Vec::new();
        for hit in hits {
            if let Some(content) = hit.payload.get("content").and_then(|v| v.as_str()) {
                if !content.is_empty() && seen.insert(content.to_string()) {
                    candidates.push(content.to_string());
                }
            }
        }

        // Nothing coarse to refine; skip the reranker entirely.
        if candidates.is_empty() {
            return Ok(KnowledgeAnswer::empty());
        }

        let Some(reranker) = &self.reranker else {
            candidates.truncate(limit);
            return Ok(KnowledgeAnswer {
                passages: candidates,
                degradation: Degradation::None,
            });
        };

        match reranker.rerank(query, &candidates, limit).await {
            Ok(ranked) => Ok(KnowledgeAnswer {
                passages: ranked.into_iter().take(limit).collect(),
                degradation: Degradation::None,
            }),
            Err(err) => {
                warn!(error = %err, "reranker unavailable; falling back to coarse order");
                candidates.truncate(limit);
                Ok(KnowledgeAnswer {
                    passages: candidates,
                    degradation: Degradation::RerankUnavailable,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbedder;
    use crate::indexing::{IndexConfig, Indexer};
    use crate::stores::InMemoryVectorStore;
    use crate::types::Chunk;

    fn chunk(content: &str, index: usize) -> Chunk {
        Chunk {
            content: content.to_string(),
            source: "kb.txt".to_string(),
            index,
            size: content.chars().count(),
        }
    }

    async fn seeded_orchestrator() -> RetrievalOrchestrator {
        let embedder = Arc::new(MockEmbedder::new());
        let store = Arc::new(InMemoryVectorStore::new());
        store.create_collection("paintings", 64);
        store.create_collection("knowledge", 64);

        let indexer = Indexer::new(IndexConfig::new("knowledge").with_batch_size(100)).unwrap();
        let chunks = vec![
            chunk("mệnh mộc hợp tranh rừng cây xanh tươi", 0),
            chunk("mệnh thủy hợp tranh sông nước thuyền buồm", 1),
            chunk("phòng ngủ nên treo tranh màu êm dịu", 2),
        ];
        indexer
            .index_chunks(&chunks, embedder.as_ref(), store.as_ref())
            .await;

        RetrievalOrchestrator::new(RetrievalConfig::default(), embedder, store).unwrap()
    }

    /// Reverses the coarse order so tests can tell the stages apart.
    struct ReversingReranker;

    #[async_trait]
    impl Reranker for ReversingReranker {
        async fn rerank(
            &self,
            _query: &str,
            candidates: &[String],
            top_k: usize,
        ) -> Result<Vec<String>, RerankError> {
            let mut ranked: Vec<String> = candidates.to_vec();
            ranked.reverse();
            ranked.truncate(top_k);
            Ok(ranked)
        }
    }

    struct DeadReranker;

    #[async_trait]
    impl Reranker for DeadReranker {
        async fn rerank(
            &self,
            _query: &str,
            _candidates: &[String],
            _top_k: usize,
        ) -> Result<Vec<String>, RerankError> {
            Err(RerankError::Backend("connection refused".into()))
        }
    }

    struct DeadEmbedder;

    #[async_trait]
    impl Embedder for DeadEmbedder {
        fn dim(&self) -> usize {
            64
        }

        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::Backend("model not loaded".into()))
        }

        async fn embed_image(&self, _image: &ImageSource) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::Backend("model not loaded".into()))
        }
    }

    #[test]
    fn coarse_limit_over_fetches_with_a_floor() {
        let orchestrator = RetrievalOrchestrator::new(
            RetrievalConfig::default(),
            Arc::new(MockEmbedder::new()),
            Arc::new(InMemoryVectorStore::new()),
        )
        .unwrap();
        assert_eq!(orchestrator.coarse_limit(3), 10);
        assert_eq!(orchestrator.coarse_limit(5), 15);
    }

    #[test]
    fn zero_multiplier_is_a_config_error() {
        let config = RetrievalConfig {
            coarse_multiplier: 0,
            ..RetrievalConfig::default()
        };
        assert!(
            RetrievalOrchestrator::new(
                config,
                Arc::new(MockEmbedder::new()),
                Arc::new(InMemoryVectorStore::new()),
            )
            .is_err()
        );
    }

    #[tokio::test]
    async fn knowledge_search_prefers_overlapping_passages() {
        let orchestrator = seeded_orchestrator().await;
        let answer = orchestrator
            .search_knowledge("mệnh thủy hợp tranh sông nước thuyền buồm", 1)
            .await
            .unwrap();
        assert_eq!(answer.degradation, Degradation::None);
        assert_eq!(answer.passages.len(), 1);
        assert!(answer.passages[0].contains("sông nước"));
    }

    #[tokio::test]
    async fn empty_query_short_circuits() {
        let orchestrator = seeded_orchestrator().await;
        let answer = orchestrator.search_knowledge("   ", 3).await.unwrap();
        assert!(answer.is_empty());
        assert_eq!(answer.degradation, Degradation::None);
    }

    #[tokio::test]
    async fn empty_coarse_result_skips_the_reranker() {
        let embedder = Arc::new(MockEmbedder::new());
        let store = Arc::new(InMemoryVectorStore::new());
        store.create_collection("paintings", 64);
        store.create_collection("knowledge", 64);
        let orchestrator =
            RetrievalOrchestrator::new(RetrievalConfig::default(), embedder, store)
                .unwrap()
                // A dead reranker would error if it were consulted.
                .with_reranker(Arc::new(DeadReranker));

        let answer = orchestrator
            .search_knowledge("mệnh hỏa hợp tranh gì", 3)
            .await
            .unwrap();
        assert!(answer.is_empty());
        assert_eq!(answer.degradation, Degradation::None);
    }

    #[tokio::test]
    async fn reranker_reorders_the_coarse_shortlist() {
        let orchestrator = seeded_orchestrator().await;
        let coarse = orchestrator
            .search_knowledge("tranh hợp mệnh", 3)
            .await
            .unwrap();

        let reranked_orchestrator = seeded_orchestrator()
            .await
            .with_reranker(Arc::new(ReversingReranker));
        let reranked = reranked_orchestrator
            .search_knowledge("tranh hợp mệnh", 3)
            .await
            .unwrap();

        assert_eq!(reranked.degradation, Degradation::None);
        assert_eq!(reranked.passages.len(), coarse.passages.len());
        let mut reversed = coarse.passages.clone();
        reversed.reverse();
        assert_eq!(reranked.passages, reversed);
    }

    #[tokio::test]
    async fn rerank_failure_degrades_to_coarse_order() {
        let orchestrator = seeded_orchestrator()
            .await
            .with_reranker(Arc::new(DeadReranker));

        let answer = orchestrator
            .search_knowledge("tranh hợp mệnh mộc", 2)
            .await
            .unwrap();
        assert_eq!(answer.degradation, Degradation::RerankUnavailable);
        assert_eq!(answer.passages.len(), 2);
    }

    #[tokio::test]
    async fn embedding_failure_is_distinct_from_zero_matches() {
        let store = Arc::new(InMemoryVectorStore::new());
        store.create_collection("paintings", 64);
        store.create_collection("knowledge", 64);
        let orchestrator = RetrievalOrchestrator::new(
            RetrievalConfig::default(),
            Arc::new(DeadEmbedder),
            store,
        )
        .unwrap();

        let err = orchestrator
            .search_knowledge("tranh hợp mệnh", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));

        let err = orchestrator
            .find_similar_items(&ImageSource::Bytes(vec![1, 2, 3]), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
    }

    #[tokio::test]
    async fn context_joins_passages_with_blank_lines() {
        let answer = KnowledgeAnswer {
            passages: vec!["một".to_string(), "hai".to_string()],
            degradation: Degradation::None,
        };
        assert_eq!(answer.context(), "một\n\nhai");
    }
}
