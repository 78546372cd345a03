//! Core data models.
//!
//! These types represent the documents and chunks that flow from the
//! loader through the splitter into the vector index and back out as
//! retrieval context.

use serde::{Deserialize, Serialize};

/// Provenance attached to every extracted unit and inherited by its chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Bare file name, e.g. `lecture-01.pdf`.
    pub source_file: String,
    /// Path the file was read from.
    pub source_path: String,
    /// Zero-based page number for paginated sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl DocumentMetadata {
    /// Human-readable origin: `notes.md` or `lecture.pdf (p. 3)`.
    pub fn source_label(&self) -> String {
        match self.page {
            Some(page) => format!("{} (p. {})", self.source_file, page + 1),
            None => self.source_file.clone(),
        }
    }
}

/// A unit of extracted text: a whole text file, a DOCX body, or one PDF page.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// A bounded slice of a [`Document`]'s text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    /// Position within the parent document unit.
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    pub metadata: DocumentMetadata,
}
