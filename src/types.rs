//! Core data model and the crate-wide error type.
//!
//! The error taxonomy mirrors how failures are handled across the pipeline:
//! configuration errors are fatal at construction time, dependency failures
//! (embedding, storage, rerank) carry their own seam-local error enums and
//! are converted into skips or degraded results at the component boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embeddings::EmbedError;
use crate::retrieval::RerankError;
use crate::stores::StoreError;

/// Raw ingestion input: a body of text plus a stable source identifier
/// (file name, URL, catalog id). Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub source: String,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}

/// An ordered fragment of a [`Document`], sized for embedding.
///
/// `size` is the content length in Unicode scalar values; the corpus is
/// Vietnamese, so byte lengths would overstate every field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    pub index: usize,
    pub size: usize,
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Programmer error caught at startup (e.g. `overlap >= chunk_size`,
    /// an empty taxonomy). Never recoverable per-call.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Rerank(#[from] RerankError),
}
