//! Load → build → load → search over real files, fully offline.

use docqa::config::Config;
use docqa::embedding::{self, HashProvider};
use docqa::index::{self, IndexStatus};
use docqa::loader;
use std::fs;
use std::path::Path;

fn offline_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.paths.data_dir = root.join("data").join("raw");
    config.paths.index_dir = root.join("vector_store");
    config.embedding.provider = "hash".to_string();
    config.chunking.chunk_size = 500;
    config.chunking.chunk_overlap = 50;
    config
}

#[tokio::test]
async fn markdown_phrase_retrieves_markdown_chunk() {
    let tmp = tempfile::tempdir().unwrap();
    let config = offline_config(tmp.path());
    let data = &config.paths.data_dir;
    fs::create_dir_all(data).unwrap();
    fs::write(
        data.join("biology.md"),
        "# Cells\n\nChloroplasts capture sunlight and convert carbon dioxide into glucose.",
    )
    .unwrap();
    fs::write(
        data.join("history.txt"),
        "The Roman Empire was divided into eastern and western halves in 395 AD.",
    )
    .unwrap();
    fs::write(data.join("grades.csv"), "name,score\nalice,5\n").unwrap();

    let documents = loader::load_documents(data).unwrap();
    assert_eq!(documents.len(), 2);

    let provider = HashProvider::new(384);
    let built = index::build_index(&config, &provider, &documents)
        .await
        .unwrap()
        .expect("index should be built");
    assert_eq!(built.source_files(), vec!["history.txt", "biology.md"]);

    let loaded = match index::load_index(&config).await {
        IndexStatus::Ready(index) => index,
        other => panic!("expected a ready index, got {:?}", other),
    };
    assert_eq!(loaded.len(), built.len());
    assert_eq!(loaded.header().chunk_size, 500);
    assert_eq!(loaded.header().chunk_overlap, 50);
    assert_eq!(loaded.header().model, "feature-hash");

    let query = embedding::embed_query(
        &provider,
        &config.embedding,
        "Chloroplasts capture sunlight and convert carbon dioxide into glucose.",
    )
    .await
    .unwrap();
    let hits = loaded.search(&query, 2).unwrap();
    assert_eq!(hits[0].chunk.metadata.source_file, "biology.md");
    assert!(hits[0].score > hits[1].score);
}

#[tokio::test]
async fn long_documents_are_chunked_within_bounds() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = offline_config(tmp.path());
    config.chunking.chunk_size = 120;
    config.chunking.chunk_overlap = 30;
    let data = &config.paths.data_dir;
    fs::create_dir_all(data).unwrap();

    let body = (0..60)
        .map(|i| format!("sentence number {} talks about topic {}.", i, i % 7))
        .collect::<Vec<_>>()
        .join(" ");
    fs::write(data.join("long.md"), &body).unwrap();

    let documents = loader::load_documents(data).unwrap();
    let provider = HashProvider::new(128);
    let built = index::build_index(&config, &provider, &documents)
        .await
        .unwrap()
        .unwrap();

    assert!(built.len() > 10);
    for entry in built.entries() {
        assert!(entry.chunk.text.chars().count() <= 120);
    }
    let texts: Vec<&str> = built.entries().iter().map(|e| e.chunk.text.as_str()).collect();
    for pair in texts.windows(2) {
        // The retained overlap (at most 30 chars) ends with the previous chunk's last word.
        let tail = pair[0].split(' ').last().unwrap();
        let head: String = pair[1].chars().take(30).collect();
        assert!(head.contains(tail), "{:?} / {:?}", pair[0], pair[1]);
    }
}

#[tokio::test]
async fn empty_data_directory_builds_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let config = offline_config(tmp.path());

    let documents = loader::load_documents(&config.paths.data_dir).unwrap();
    assert!(documents.is_empty());
    assert!(config.paths.data_dir.is_dir());

    let provider = HashProvider::new(384);
    assert!(index::build_index(&config, &provider, &documents)
        .await
        .unwrap()
        .is_none());
    assert!(matches!(index::load_index(&config).await, IndexStatus::NotBuilt));
}
