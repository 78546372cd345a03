//! Recursive separator-preference text splitter.
//!
//! Splits document text into [`Chunk`]s no longer than `chunk_size`
//! characters, preferring the coarsest boundary available: paragraph
//! breaks, then line breaks, then spaces, then individual characters.
//! Consecutive chunks share a tail of at most `chunk_overlap` characters
//! so that sentences crossing a boundary stay retrievable.
//!
//! # Algorithm
//!
//! 1. Pick the first separator in [`SEPARATORS`] that occurs in the text.
//! 2. Split on it, keeping the separator at the start of the following piece.
//! 3. Pieces shorter than `chunk_size` are queued for merging; longer pieces
//!    flush the queue and are split again with the remaining separators.
//! 4. Merging packs queued pieces greedily. When a chunk is emitted, pieces
//!    are dropped from the front until the retained tail fits within
//!    `chunk_overlap` and leaves room for the next piece.
//! 5. Chunks are whitespace-trimmed; empty chunks are dropped.
//!
//! Lengths are counted in Unicode scalar values, not bytes.
//!
//! # Example
//!
//! ```rust
//! use docqa::chunk::TextSplitter;
//!
//! let splitter = TextSplitter::new(20, 5).unwrap();
//! let pieces = splitter.split_text("alpha beta gamma delta epsilon zeta");
//! assert!(pieces.iter().all(|p| p.chars().count() <= 20));
//! ```

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, Document, DocumentMetadata};

/// Boundaries tried in order, coarsest first. The empty separator splits
/// into single characters and always applies.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if chunk_overlap >= chunk_size {
            bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split raw text into trimmed, non-empty pieces.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
            .into_iter()
            .map(|piece| piece.trim().to_string())
            .filter(|piece| !piece.is_empty())
            .collect()
    }

    /// Split every document, carrying its metadata onto each chunk.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.text)
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| make_chunk(i as i64, &text, &doc.metadata))
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = "";
        let mut finer: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                break;
            }
            if text.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }
        chunks
    }

    /// Pack pieces (each shorter than `chunk_size`) into overlapping chunks.
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_window(&window) {
                    chunks.push(chunk);
                }
                // Keep at most `chunk_overlap` characters as the next chunk's head.
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_window(&window) {
            chunks.push(chunk);
        }
        chunks
    }
}

/// Split `text` on `separator`, attaching each separator to the piece that
/// follows it. An empty separator yields single characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[start..idx]);
        start = idx;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Create a single [`Chunk`] with a UUID and SHA-256 content hash.
fn make_chunk(index: i64, text: &str, metadata: &DocumentMetadata) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
        metadata: metadata.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, text: &str) -> Document {
        Document {
            text: text.to_string(),
            metadata: DocumentMetadata {
                source_file: name.to_string(),
                source_path: format!("data/raw/{}", name),
                page: None,
            },
        }
    }

    #[test]
    fn test_small_text_single_chunk() {
        let splitter = TextSplitter::new(500, 50).unwrap();
        let chunks = splitter.split_text("Hello, world!");
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_empty_and_blank_text() {
        let splitter = TextSplitter::new(500, 50).unwrap();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("  \n\n  \n").is_empty());
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(10, 10).is_err());
        assert!(TextSplitter::new(10, 9).is_ok());
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let splitter = TextSplitter::new(40, 0).unwrap();
        let text = "First paragraph is here.\n\nSecond paragraph is here.";
        let chunks = splitter.split_text(text);
        assert_eq!(
            chunks,
            vec!["First paragraph is here.", "Second paragraph is here."]
        );
    }

    #[test]
    fn test_chunks_never_exceed_size() {
        let splitter = TextSplitter::new(60, 15).unwrap();
        let long_word = "x".repeat(150);
        let text = format!(
            "{}\n\nShort line one.\nShort line two.\n\n{}\n\n{}",
            (0..40)
                .map(|i| format!("token{}", i))
                .collect::<Vec<_>>()
                .join(" "),
            long_word,
            "Привет мир, это проверка многобайтовых символов в тексте документа."
        );
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 3);
        for c in &chunks {
            assert!(
                c.chars().count() <= 60,
                "chunk of {} chars: {:?}",
                c.chars().count(),
                c
            );
        }
    }

    #[test]
    fn test_adjacent_chunks_overlap() {
        let splitter = TextSplitter::new(50, 10).unwrap();
        let text = (0..100)
            .map(|i| format!("word{:02}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let last_of_prev = pair[0].split(' ').last().unwrap();
            let first_of_next = pair[1].split(' ').next().unwrap();
            assert_eq!(
                last_of_prev, first_of_next,
                "no overlap between {:?} and {:?}",
                pair[0], pair[1]
            );
            assert!(last_of_prev.chars().count() <= 10);
        }
        // Every word survives somewhere.
        for i in 0..100 {
            let w = format!("word{:02}", i);
            assert!(chunks.iter().any(|c| c.contains(&w)), "lost {}", w);
        }
    }

    #[test]
    fn test_character_fallback_overlaps() {
        let splitter = TextSplitter::new(10, 3).unwrap();
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = splitter.split_text(text);
        assert_eq!(chunks[0], "abcdefghij");
        assert_eq!(chunks[1], "hijklmnopq");
        for c in &chunks {
            assert!(c.chars().count() <= 10);
        }
        assert!(chunks.last().unwrap().ends_with('z'));
    }

    #[test]
    fn test_split_documents_carries_metadata() {
        let splitter = TextSplitter::new(30, 5).unwrap();
        let docs = vec![
            doc("a.md", "alpha beta gamma delta epsilon zeta eta theta"),
            doc("b.txt", "short"),
        ];
        let chunks = splitter.split_documents(&docs);
        let a: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.metadata.source_file == "a.md")
            .collect();
        assert!(a.len() > 1);
        for (i, c) in a.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
        let b: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.metadata.source_file == "b.txt")
            .collect();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].text, "short");
        assert_eq!(b[0].metadata.source_path, "data/raw/b.txt");
    }

    #[test]
    fn test_deterministic_text_and_hash() {
        let splitter = TextSplitter::new(12, 4).unwrap();
        let docs = vec![doc("a.md", "Alpha\n\nBeta\n\nGamma\n\nDelta epsilon zeta")];
        let c1 = splitter.split_documents(&docs);
        let c2 = splitter.split_documents(&docs);
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.hash, b.hash);
            assert_ne!(a.id, b.id);
        }
    }
}
