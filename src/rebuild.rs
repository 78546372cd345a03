//! Knowledge base rebuild.
//!
//! Loads every document from `paths.data_dir`, then builds and persists a
//! fresh vector index, replacing the previous one. Shared by the `rebuild`
//! command, the chat `/rebuild` command and `POST /rebuild`.

use anyhow::{Context, Result};
use tracing::warn;

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::index::{self, VectorIndex};
use crate::loader;

/// What a rebuild produced.
#[derive(Debug)]
pub enum RebuildOutcome {
    Built(VectorIndex),
    /// The data directory held no loadable documents; the old index is kept.
    NoDocuments,
}

pub async fn rebuild_knowledge_base(
    config: &Config,
    provider: &dyn EmbeddingProvider,
) -> Result<RebuildOutcome> {
    let data_dir = config.paths.data_dir.clone();
    let documents = tokio::task::spawn_blocking(move || loader::load_documents(&data_dir))
        .await
        .context("Document loading task failed")??;
    if documents.is_empty() {
        warn!("No files found in {}", config.paths.data_dir.display());
        return Ok(RebuildOutcome::NoDocuments);
    }

    let built = index::build_index(config, provider, &documents)
        .await
        .context("Failed to build the vector index")?;

    Ok(match built {
        Some(index) => RebuildOutcome::Built(index),
        None => RebuildOutcome::NoDocuments,
    })
}

pub async fn run_rebuild(config: &Config) -> Result<()> {
    let provider = embedding::create_provider(&config.embedding)?;
    match rebuild_knowledge_base(config, provider.as_ref()).await? {
        RebuildOutcome::Built(index) => {
            println!(
                "Knowledge base rebuilt: {} chunks from {} files ({} embeddings, {} dims).",
                index.len(),
                index.source_files().len(),
                index.header().model,
                index.dims()
            );
            println!("Index location: {}", config.paths.index_dir.display());
        }
        RebuildOutcome::NoDocuments => {
            println!(
                "No files found in {}. Add pdf, docx, txt, md or raw files and run `docqa rebuild` again.",
                config.paths.data_dir.display()
            );
        }
    }
    Ok(())
}
