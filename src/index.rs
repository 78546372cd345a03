//! Persisted vector index.
//!
//! A [`VectorIndex`] pairs every [`Chunk`] with its normalized embedding and
//! remembers how it was built (embedding model, dimensionality, chunking
//! parameters, build time). It is built once from the full document set,
//! stored as a SQLite database under `paths.index_dir`, and loaded
//! read-only by every consumer.
//!
//! # On-disk layout
//!
//! ```text
//! vector_store/
//! └── index.sqlite      index_meta | chunks | vectors
//! ```
//!
//! # Replacement
//!
//! A rebuild never edits the live index. The new database is written to a
//! sibling `<index_dir>.staging` directory and, once complete, renamed into
//! place; the previous directory is parked at `<index_dir>.old` for the
//! duration of the swap and then removed. A crash mid-build leaves the old
//! index untouched.
//!
//! # Search
//!
//! Exact cosine-similarity scan over all entries.

use anyhow::{anyhow, bail, Context, Result};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::chunk::TextSplitter;
use crate::config::Config;
use crate::db::{self, INDEX_FILE};
use crate::embedding::{self, EmbeddingProvider};
use crate::migrate::{self, SCHEMA_VERSION};
use crate::models::{Chunk, Document, DocumentMetadata};

/// Build provenance stored alongside the vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHeader {
    pub model: String,
    pub dims: usize,
    /// RFC 3339 build timestamp.
    pub built_at: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A chunk returned by [`VectorIndex::search`] with its similarity score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    header: IndexHeader,
    entries: Vec<IndexEntry>,
}

/// Result of looking for a persisted index.
#[derive(Debug)]
pub enum IndexStatus {
    Ready(VectorIndex),
    /// Nothing has been built at the configured location.
    NotBuilt,
    /// An index exists but could not be read; the reason is kept for display.
    Unreadable(String),
}

impl IndexStatus {
    /// Collapse the two absent cases into `None`.
    pub fn into_index(self) -> Option<VectorIndex> {
        match self {
            IndexStatus::Ready(index) => Some(index),
            IndexStatus::NotBuilt | IndexStatus::Unreadable(_) => None,
        }
    }
}

impl VectorIndex {
    /// Assemble an index from already-normalized entries.
    pub fn new(header: IndexHeader, entries: Vec<IndexEntry>) -> Result<Self> {
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != header.dims) {
            bail!(
                "Vector for chunk {} has {} dimensions, expected {}",
                bad.chunk.id,
                bad.vector.len(),
                header.dims
            );
        }
        Ok(Self { header, entries })
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    pub fn dims(&self) -> usize {
        self.header.dims
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top `k` chunks by cosine similarity, best first. Equal scores keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if query.len() != self.header.dims {
            bail!(
                "Query vector has {} dimensions but the index was built with {}",
                query.len(),
                self.header.dims
            );
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, embedding::cosine_similarity(query, &entry.vector)))
            .collect();

        // Stable sort: ties stay in insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| RetrievedChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Distinct source file names in first-seen order.
    pub fn source_files(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            let name = &entry.chunk.metadata.source_file;
            if !seen.contains(name) {
                seen.push(name.clone());
            }
        }
        seen
    }
}

// ============ Build ============

/// Split, embed and persist `documents`, replacing any existing index.
///
/// Returns `Ok(None)` when there is nothing to index.
pub async fn build_index(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    documents: &[Document],
) -> Result<Option<VectorIndex>> {
    if documents.is_empty() {
        warn!("No documents to index");
        return Ok(None);
    }

    let splitter = TextSplitter::from_config(&config.chunking)?;
    let chunks = splitter.split_documents(documents);
    info!("Split into {} chunks", chunks.len());
    if chunks.is_empty() {
        warn!("Documents produced no text chunks; nothing to index");
        return Ok(None);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedding::embed_passages(provider, &config.embedding, &texts)
        .await
        .context("Failed to embed chunks")?;

    let header = IndexHeader {
        model: provider.model_name().to_string(),
        dims: provider.dims(),
        built_at: chrono::Utc::now().to_rfc3339(),
        chunk_size: splitter.chunk_size(),
        chunk_overlap: splitter.chunk_overlap(),
    };
    let entries = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| IndexEntry { chunk, vector })
        .collect();
    let index = VectorIndex::new(header, entries)?;

    save_index(&index, &config.paths.index_dir).await?;
    info!(
        "Index saved to {} ({} vectors)",
        config.paths.index_dir.display(),
        index.len()
    );

    Ok(Some(index))
}

/// Write `index` to a staging directory and swap it in for `index_dir`.
pub async fn save_index(index: &VectorIndex, index_dir: &Path) -> Result<()> {
    let staging = sibling(index_dir, "staging")?;
    let parked = sibling(index_dir, "old")?;

    if staging.exists() {
        std::fs::remove_dir_all(&staging)
            .with_context(|| format!("Failed to clear {}", staging.display()))?;
    }
    std::fs::create_dir_all(&staging)
        .with_context(|| format!("Failed to create {}", staging.display()))?;

    let pool = db::connect(&staging.join(INDEX_FILE)).await?;
    let written = write_tables(&pool, index).await;
    pool.close().await;
    written?;

    swap_into_place(&staging, index_dir, &parked)
}

/// Rename `staging` to `index_dir`, parking any previous index at `parked`
/// and putting it back if the final rename fails.
fn swap_into_place(staging: &Path, index_dir: &Path, parked: &Path) -> Result<()> {
    if parked.exists() {
        std::fs::remove_dir_all(parked)?;
    }
    if index_dir.exists() {
        std::fs::rename(index_dir, parked).with_context(|| {
            format!("Failed to move aside previous index at {}", index_dir.display())
        })?;
    }
    if let Err(e) = std::fs::rename(staging, index_dir) {
        // Put the previous index back so readers still find something.
        if parked.exists() {
            if let Err(restore) = std::fs::rename(parked, index_dir) {
                error!(
                    "Failed to restore previous index from {}: {}",
                    parked.display(),
                    restore
                );
            }
        }
        return Err(anyhow!(e).context(format!(
            "Failed to move new index into {}",
            index_dir.display()
        )));
    }
    if parked.exists() {
        std::fs::remove_dir_all(parked)?;
    }
    Ok(())
}

fn sibling(index_dir: &Path, suffix: &str) -> Result<PathBuf> {
    let name = index_dir
        .file_name()
        .ok_or_else(|| anyhow!("Invalid index directory: {}", index_dir.display()))?;
    Ok(index_dir.with_file_name(format!("{}.{}", name.to_string_lossy(), suffix)))
}

async fn write_tables(pool: &SqlitePool, index: &VectorIndex) -> Result<()> {
    migrate::run_migrations(pool).await?;

    let mut tx = pool.begin().await?;

    let header = index.header();
    let meta = [
        ("schema_version", SCHEMA_VERSION.to_string()),
        ("model", header.model.clone()),
        ("dims", header.dims.to_string()),
        ("built_at", header.built_at.clone()),
        ("chunk_size", header.chunk_size.to_string()),
        ("chunk_overlap", header.chunk_overlap.to_string()),
        ("chunk_count", index.len().to_string()),
    ];
    for (key, value) in meta {
        sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    for (position, entry) in index.entries().iter().enumerate() {
        let chunk = &entry.chunk;
        sqlx::query(
            r#"
            INSERT INTO chunks (id, position, source_file, source_path, page, chunk_index, text, hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(position as i64)
        .bind(&chunk.metadata.source_file)
        .bind(&chunk.metadata.source_path)
        .bind(chunk.metadata.page.map(i64::from))
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO vectors (chunk_id, dims, embedding) VALUES (?, ?, ?)")
            .bind(&chunk.id)
            .bind(entry.vector.len() as i64)
            .bind(embedding::vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

// ============ Load ============

/// Look for the persisted index under `paths.index_dir`.
pub async fn load_index(config: &Config) -> IndexStatus {
    let path = config.paths.index_dir.join(INDEX_FILE);
    if !path.exists() {
        return IndexStatus::NotBuilt;
    }

    match read_index(&path).await {
        Ok(index) => {
            info!(
                "Loaded index from {} ({} vectors, model {})",
                path.display(),
                index.len(),
                index.header().model
            );
            IndexStatus::Ready(index)
        }
        Err(e) => {
            error!("Failed to load index from {}: {:#}", path.display(), e);
            IndexStatus::Unreadable(format!("{:#}", e))
        }
    }
}

async fn read_index(path: &Path) -> Result<VectorIndex> {
    let pool = db::connect_read_only(path).await?;
    let result = read_tables(&pool).await;
    pool.close().await;
    result
}

async fn read_tables(pool: &SqlitePool) -> Result<VectorIndex> {
    let mut meta: HashMap<String, String> = HashMap::new();
    for row in sqlx::query("SELECT key, value FROM index_meta")
        .fetch_all(pool)
        .await?
    {
        meta.insert(row.try_get("key")?, row.try_get("value")?);
    }

    let version: i64 = meta_value(&meta, "schema_version")?;
    if version != SCHEMA_VERSION {
        bail!(
            "Index schema version {} is not supported (expected {})",
            version,
            SCHEMA_VERSION
        );
    }

    let header = IndexHeader {
        model: meta_value(&meta, "model")?,
        dims: meta_value(&meta, "dims")?,
        built_at: meta_value(&meta, "built_at")?,
        chunk_size: meta_value(&meta, "chunk_size")?,
        chunk_overlap: meta_value(&meta, "chunk_overlap")?,
    };

    let rows = sqlx::query(
        r#"
        SELECT c.id, c.source_file, c.source_path, c.page, c.chunk_index, c.text, c.hash,
               v.embedding
        FROM chunks c
        JOIN vectors v ON v.chunk_id = c.id
        ORDER BY c.position
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        let page: Option<i64> = row.try_get("page")?;
        let blob: Vec<u8> = row.try_get("embedding")?;
        if blob.len() != header.dims * 4 {
            bail!(
                "Stored vector has {} bytes, expected {}",
                blob.len(),
                header.dims * 4
            );
        }
        entries.push(IndexEntry {
            chunk: Chunk {
                id: row.try_get("id")?,
                chunk_index: row.try_get("chunk_index")?,
                text: row.try_get("text")?,
                hash: row.try_get("hash")?,
                metadata: DocumentMetadata {
                    source_file: row.try_get("source_file")?,
                    source_path: row.try_get("source_path")?,
                    page: page.map(u32::try_from).transpose()?,
                },
            },
            vector: embedding::blob_to_vec(&blob),
        });
    }

    VectorIndex::new(header, entries)
}

fn meta_value<T: std::str::FromStr>(meta: &HashMap<String, String>, key: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = meta
        .get(key)
        .ok_or_else(|| anyhow!("Index metadata is missing '{}'", key))?;
    raw.parse::<T>()
        .map_err(|e| anyhow!("Invalid index metadata '{}' = '{}': {}", key, raw, e))
}
