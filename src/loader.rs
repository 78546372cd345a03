//! Document loader.
//!
//! Scans the top level of the data directory for recognized extensions and
//! turns every file into one or more [`Document`] units tagged with their
//! source file. Files are processed extension group by extension group
//! (`pdf`, `docx`, `txt`, `md`, `raw`), and by file name within a group.
//!
//! A file that fails to extract is logged and skipped; it never aborts the
//! load. A missing data directory is created and yields no documents.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::extract::{self, FileKind, EXTENSIONS};
use crate::models::{Document, DocumentMetadata};

/// Load every recognized file under `data_dir` (non-recursive).
pub fn load_documents(data_dir: &Path) -> Result<Vec<Document>> {
    if !data_dir.exists() {
        std::fs::create_dir_all(data_dir).with_context(|| {
            format!("Failed to create data directory: {}", data_dir.display())
        })?;
        warn!("Created missing directory: {}", data_dir.display());
        return Ok(Vec::new());
    }

    let files = list_files(data_dir);
    let mut documents = Vec::new();
    let mut files_loaded = 0usize;

    for (ext, kind) in EXTENSIONS {
        let matcher = extension_matcher(ext)?;
        for path in files.iter().filter(|p| matches_name(&matcher, p)) {
            match load_file(path, kind) {
                Ok(docs) => {
                    documents.extend(docs);
                    files_loaded += 1;
                    info!("Loaded: {}", file_name(path));
                }
                Err(e) => {
                    error!("Failed to load {}: {:#}", path.display(), e);
                }
            }
        }
    }

    info!(
        "Total files loaded: {} ({} document units)",
        files_loaded,
        documents.len()
    );
    Ok(documents)
}

/// Names of all files currently in the data directory, sorted.
///
/// Returns an empty list when the directory does not exist.
pub fn list_data_files(data_dir: &Path) -> Vec<String> {
    if !data_dir.exists() {
        return Vec::new();
    }
    list_files(data_dir).iter().map(|p| file_name(p)).collect()
}

fn list_files(data_dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

fn extension_matcher(ext: &str) -> Result<GlobMatcher> {
    Ok(GlobBuilder::new(&format!("*.{}", ext))
        .case_insensitive(true)
        .build()?
        .compile_matcher())
}

fn matches_name(matcher: &GlobMatcher, path: &Path) -> bool {
    path.file_name().is_some_and(|name| matcher.is_match(name))
}

fn load_file(path: &Path, kind: FileKind) -> Result<Vec<Document>> {
    let bytes = std::fs::read(path)?;
    let fragments = extract::extract(&bytes, kind)?;
    let source_file = file_name(path);
    let source_path = path.display().to_string();

    Ok(fragments
        .into_iter()
        .map(|fragment| Document {
            text: fragment.text,
            metadata: DocumentMetadata {
                source_file: source_file.clone(),
                source_path: source_path.clone(),
                page: fragment.page,
            },
        })
        .collect())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
