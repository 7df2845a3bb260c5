//! ```text
//! Raw documents ──► ingestion::chunk ──► Chunk { content, source, index, size }
//! Catalog items ──► taxonomy::TagClassifier ──► taxonomy labels
//!                                   │
//! Chunks / items ──► indexing::Indexer ──► embeddings::Embedder
//!                                   │             │
//!                                   └─► batched IndexRecord upserts
//!                                                 │
//!                                     stores::VectorStore (cosine)
//!                                                 │
//! Query (text/image) ──► retrieval::RetrievalOrchestrator
//!                          ├─► coarse vector search (over-fetched)
//!                          └─► retrieval::Reranker ──► ranked evidence
//! ```
//!
//! The crate is the algorithmic core of a retrieval-augmented decor
//! recommendation assistant. Everything that talks to the outside world
//! (embedding models, the vector database, the rerank service) sits behind
//! async traits so the pipeline stays deterministic and testable.

pub mod embeddings;
pub mod indexing;
pub mod ingestion;
pub mod retrieval;
pub mod stores;
pub mod taxonomy;
pub mod types;

pub use embeddings::{Embedder, ImageSource, MockEmbedder, l2_normalize};
pub use indexing::{CatalogItem, IndexConfig, IndexReport, Indexer};
pub use ingestion::{ChunkConfig, TextChunker};
pub use retrieval::{
    Degradation, ItemMatch, KnowledgeAnswer, Reranker, RetrievalConfig, RetrievalError,
    RetrievalOrchestrator,
};
pub use stores::{IndexRecord, InMemoryVectorStore, Payload, ScoredPayload, VectorStore};
pub use taxonomy::{TagClassifier, Taxonomy};
pub use types::{Chunk, Document, PipelineError};
