//! Ollama chat and embedding clients against an in-process HTTP server.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use docqa::config::{EmbeddingConfig, LlmConfig};
use docqa::device::Device;
use docqa::embedding::{EmbeddingProvider, OllamaProvider};
use docqa::llm::{ChatMessage, ChatModel, LlmError, OllamaChat};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Captured = Arc<Mutex<Vec<Value>>>;

async fn fake_chat(State(seen): State<Captured>, Json(body): Json<Value>) -> Json<Value> {
    seen.lock().unwrap().push(body.clone());
    let question = body["messages"][1]["content"].as_str().unwrap_or_default();
    Json(json!({
        "model": body["model"],
        "message": { "role": "assistant", "content": format!("echo: {}", question) },
        "done": true
    }))
}

async fn fake_embed(State(seen): State<Captured>, Json(body): Json<Value>) -> Json<Value> {
    seen.lock().unwrap().push(body.clone());
    let n = body["input"].as_array().map(|a| a.len()).unwrap_or(0);
    let embeddings: Vec<Vec<f32>> = (0..n).map(|i| vec![i as f32, 1.0, 0.0]).collect();
    Json(json!({ "embeddings": embeddings }))
}

async fn missing_model() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "model 'nope' not found")
}

async fn spawn_server() -> (String, Captured) {
    let seen: Captured = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/chat", post(fake_chat))
        .route("/api/embed", post(fake_embed))
        .route("/missing/api/chat", post(missing_model))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), seen)
}

#[tokio::test]
async fn chat_sends_options_and_reads_content() {
    let (base_url, seen) = spawn_server().await;
    let config = LlmConfig {
        base_url,
        model: "qwen-test".to_string(),
        ..LlmConfig::default()
    };
    let chat = OllamaChat::new(&config).unwrap();

    let reply = chat
        .complete(&[ChatMessage::system("ctx"), ChatMessage::user("What is DNA?")])
        .await
        .unwrap();
    assert_eq!(reply, "echo: What is DNA?");

    let bodies = seen.lock().unwrap();
    let body = &bodies[0];
    assert_eq!(body["model"], "qwen-test");
    assert_eq!(body["stream"], false);
    assert_eq!(body["keep_alive"], "5m");
    assert_eq!(body["options"]["num_ctx"], 4096);
    assert_eq!(body["options"]["num_gpu"], 999);
    assert_eq!(body["messages"][0]["role"], "system");
}

#[tokio::test]
async fn chat_client_error_is_not_retried() {
    let (base_url, _) = spawn_server().await;
    let config = LlmConfig {
        base_url: format!("{}/missing", base_url),
        max_retries: 3,
        ..LlmConfig::default()
    };
    let chat = OllamaChat::new(&config).unwrap();
    let err = chat.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
    assert!(matches!(err, LlmError::Status { status: 404, .. }));
}

#[tokio::test]
async fn unreachable_server_is_typed() {
    // Bind then drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = LlmConfig {
        base_url: format!("http://{}", addr),
        max_retries: 0,
        timeout_secs: 5,
        ..LlmConfig::default()
    };
    let chat = OllamaChat::new(&config).unwrap();
    let err = chat.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
    assert!(matches!(err, LlmError::Unreachable(_)), "got {:?}", err);
}

#[tokio::test]
async fn ollama_embeddings_pin_cpu() {
    let (base_url, seen) = spawn_server().await;
    let config = EmbeddingConfig {
        provider: "ollama".to_string(),
        model: Some("nomic-embed-text".to_string()),
        dims: Some(3),
        url: Some(base_url),
        ..EmbeddingConfig::default()
    };

    let cpu = OllamaProvider::new(&config, Device::Cpu).unwrap();
    let vectors = cpu
        .embed(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[1], vec![1.0, 1.0, 0.0]);

    let gpu = OllamaProvider::new(&config, Device::Cuda).unwrap();
    gpu.embed(&["c".to_string()]).await.unwrap();

    let bodies = seen.lock().unwrap();
    assert_eq!(bodies[0]["options"]["num_gpu"], 0);
    assert_eq!(bodies[0]["model"], "nomic-embed-text");
    assert!(bodies[1].get("options").is_none());
}
