//! Ingestion utilities for turning raw documents into indexable chunks.
//!
//! The single capability here is [`chunk`], the deterministic,
//! character-budget text splitter that prepares long documents for
//! embedding. Fetching and scraping live upstream of this crate.

pub mod chunk;

pub use chunk::{ChunkConfig, TextChunker};
