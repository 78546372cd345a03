//! HTTP API over an offline embedder and a canned chat model.

use async_trait::async_trait;
use docqa::config::Config;
use docqa::embedding::HashProvider;
use docqa::llm::{ChatMessage, ChatModel, LlmError};
use docqa::server::{router, AppState};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;

struct CannedModel;

#[async_trait]
impl ChatModel for CannedModel {
    fn name(&self) -> &str {
        "canned"
    }
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if messages[0].content.contains("Volcanoes") {
            Ok("Volcanoes form where magma reaches the surface.".to_string())
        } else {
            Ok("В документах нет информации об этом".to_string())
        }
    }
}

async fn spawn(config: Config) -> String {
    let state = AppState::new(
        config,
        Arc::new(HashProvider::new(384)),
        Arc::new(CannedModel),
        None,
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn ask_requires_knowledge_base_until_rebuilt() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.paths.data_dir = tmp.path().join("data");
    config.paths.index_dir = tmp.path().join("vector_store");
    config.embedding.provider = "hash".to_string();
    fs::create_dir_all(&config.paths.data_dir).unwrap();
    fs::write(
        config.paths.data_dir.join("geology.md"),
        "Volcanoes erupt when magma rises through the crust.",
    )
    .unwrap();

    let base = spawn(config).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["index_loaded"], false);

    let sources: Value = client
        .get(format!("{}/sources", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sources, json!({ "indexed": false, "sources": ["geology.md"] }));

    let resp = client
        .post(format!("{}/ask", base))
        .json(&json!({ "question": "How do volcanoes form?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "knowledge_base_absent");

    let rebuilt: Value = client
        .post(format!("{}/rebuild", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rebuilt["status"], "rebuilt");
    assert_eq!(rebuilt["sources"], json!(["geology.md"]));

    let resp = client
        .post(format!("{}/ask", base))
        .json(&json!({ "question": "How do volcanoes form?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["answer"], "Volcanoes form where magma reaches the surface.");
    assert_eq!(body["sources"][0]["source_file"], "geology.md");
    assert_eq!(body["sources"][0]["label"], "geology.md");
}

#[tokio::test]
async fn empty_question_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.paths.index_dir = tmp.path().join("vector_store");
    let base = spawn(config).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/ask", base))
        .json(&json!({ "question": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}
