//! Deterministic text chunking with character-level overlap.
//!
//! Long documents are split on blank-line paragraph boundaries and greedily
//! packed into chunks of at most `chunk_size` characters. When a chunk is
//! emitted, the next one is seeded with the tail of the previous buffer so
//! consecutive chunks share `overlap` characters of context. Paragraphs that
//! alone exceed the budget are re-split at word boundaries with the same
//! rule, so no word is ever cut in half. Boundaries are not aligned to
//! sentences on purpose: throughput over linguistic precision, the reranker
//! downstream recovers coherence.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{Chunk, Document, PipelineError};

static BLANK_LINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank-line regex is valid"));

/// Sizing knobs for [`TextChunker`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters accumulated before a chunk is emitted.
    pub chunk_size: usize,
    /// Characters of trailing context carried into the next chunk.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

impl ChunkConfig {
    /// Validates the configuration.
    ///
    /// `overlap >= chunk_size` would make emit and reseed precedence
    /// undefined, so it is rejected up front rather than handled per-call.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "chunk_size must be at least 1".into(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(PipelineError::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Pure, restart-free splitter: same input, same chunks.
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkConfig,
}

impl TextChunker {
    pub fn new(config: ChunkConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Splits `text` into overlapping chunk contents.
    ///
    /// Empty or whitespace-only input yields zero chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        let chunk_size = self.config.chunk_size;
        let overlap = self.config.overlap;

        let mut chunks: Vec<String> = Vec::new();
        let mut buffer = String::new();

        for paragraph in normalized.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }

            if !buffer.is_empty() && char_len(&buffer) + char_len(paragraph) > chunk_size {
                emit(&mut chunks, &mut buffer, overlap);
            }

            if char_len(paragraph) > chunk_size {
                // Oversize paragraph: same greedy rule applied to words.
                for word in paragraph.split_whitespace() {
                    if !buffer.is_empty() && char_len(&buffer) + char_len(word) + 1 > chunk_size {
                        emit(&mut chunks, &mut buffer, overlap);
                    }
                    if !buffer.is_empty() {
                        buffer.push(' ');
                    }
                    buffer.push_str(word);
                }
            } else {
                if !buffer.is_empty() {
                    buffer.push_str("\n\n");
                }
                buffer.push_str(paragraph);
            }
        }

        let trailing = buffer.trim();
        if !trailing.is_empty() {
            chunks.push(trailing.to_string());
        }
        chunks
    }

    /// Splits a [`Document`] and attaches source/position metadata.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, content)| Chunk {
                size: char_len(&content),
                source: document.source.clone(),
                index,
                content,
            })
            .collect()
    }
}

/// Collapses runs of blank lines down to a single paragraph break and trims
/// the edges. Windows line endings are unified first.
fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n");
    BLANK_LINE_RUNS
        .replace_all(&unified, "\n\n")
        .trim()
        .to_string()
}

/// Emits the buffer as a chunk and reseeds it with the trailing `overlap`
/// characters, or empties it when the buffer was shorter than the overlap.
fn emit(chunks: &mut Vec<String>, buffer: &mut String, overlap: usize) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    *buffer = tail_chars(buffer, overlap);
}

fn tail_chars(text: &str, n: usize) -> String {
    let len = char_len(text);
    if len <= n {
        return String::new();
    }
    text.chars().skip(len - n).collect()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: usize, overlap: usize) -> TextChunker {
        TextChunker::new(ChunkConfig {
            chunk_size,
            overlap,
        })
        .unwrap()
    }

    /// 400 characters of rotating lowercase letters, no whitespace.
    fn para(offset: usize) -> String {
        (0..400)
            .map(|i| (b'a' + ((i + offset) % 26) as u8) as char)
            .collect()
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = chunker(500, 50);
        assert!(chunker.split("").is_empty());
        assert!(chunker.split("   \n\n \n  ").is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = chunker(500, 50);
        let chunks = chunker.split("một đoạn văn ngắn");
        assert_eq!(chunks, vec!["một đoạn văn ngắn".to_string()]);
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        assert!(
            TextChunker::new(ChunkConfig {
                chunk_size: 50,
                overlap: 50,
            })
            .is_err()
        );
        assert!(
            TextChunker::new(ChunkConfig {
                chunk_size: 0,
                overlap: 0,
            })
            .is_err()
        );
    }

    #[test]
    fn blank_line_runs_collapse_to_one_break() {
        let chunker = chunker(500, 50);
        let chunks = chunker.split("đoạn một\n\n\n\n\nđoạn hai");
        assert_eq!(chunks, vec!["đoạn một\n\nđoạn hai".to_string()]);
    }

    #[test]
    fn paragraphs_pack_greedily_with_overlap_seed() {
        let chunker = chunker(500, 50);
        let (p1, p2, p3) = (para(0), para(7), para(13));
        let text = format!("{p1}\n\n{p2}\n\n{p3}");

        let chunks = chunker.split(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], p1);

        // Chunk 2 opens with the last 50 characters of chunk 1.
        let seed: String = tail_chars(&chunks[0], 50);
        let head: String = chunks[1].chars().take(50).collect();
        assert_eq!(head, seed);

        for chunk in &chunks {
            assert!(chunk.chars().count() <= 500 + 50 + 2, "chunk too large");
        }
    }

    #[test]
    fn oversize_paragraph_splits_on_word_boundaries() {
        let chunker = chunker(40, 10);
        let words: Vec<String> = (0..30).map(|i| format!("tu{i:03}")).collect();
        let text = words.join(" ");

        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        // The overlap seed may open a chunk mid-word, but every word must
        // survive intact in the chunk that emitted it.
        for word in &words {
            assert!(
                chunks.iter().any(|c| c.contains(word.as_str())),
                "word '{word}' was split across a boundary"
            );
        }
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40, "word-path chunk over budget");
        }
    }

    #[test]
    fn single_word_longer_than_budget_is_kept_intact() {
        let chunker = chunker(10, 2);
        let chunks = chunker.split("ngắn supercalifragilistic ngắn");
        // The word exceeds the budget on its own; it lands in one chunk
        // whole (plus the overlap seed) rather than being cut.
        assert!(
            chunks
                .iter()
                .any(|c| c.contains("supercalifragilistic"))
        );
        for chunk in &chunks {
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn coverage_loses_no_words() {
        let chunker = chunker(60, 12);
        let text = "cá chép vượt vũ môn\n\ntranh sơn dầu phong cảnh vùng cao rất đẹp và \
                    hợp với phòng khách hiện đại\n\nhoa sen mùa hạ";
        let chunks = chunker.split(text);
        let rebuilt = chunks.join(" ");
        for word in text.split_whitespace() {
            assert!(rebuilt.contains(word), "lost word '{word}'");
        }
    }

    #[test]
    fn chunk_document_attaches_metadata() {
        let chunker = chunker(500, 50);
        let doc = Document::new("nội dung kiến thức phong thủy", "phongthuy.txt");
        let chunks = chunker.chunk_document(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source, "phongthuy.txt");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].size, chunks[0].content.chars().count());
    }
}
