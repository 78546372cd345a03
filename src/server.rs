//! HTTP JSON API.
//!
//! Serves the answering pipeline to browser front-ends and scripts.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version, whether an index is loaded) |
//! | `GET`  | `/sources` | Indexed source files, or data-directory files when no index exists |
//! | `POST` | `/ask` | Answer `{"question": "..."}` |
//! | `POST` | `/rebuild` | Reload documents and rebuild the index |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "knowledge_base_absent", "message": "Knowledge base not found ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `knowledge_base_absent` (409),
//! `model_error` (502), `internal` (500).
//!
//! # Concurrency
//!
//! Questions and rebuilds are handled one at a time: both hold the lock on
//! the loaded index for their whole duration, and a rebuild swaps the
//! in-memory index wholesale.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::index::{self, VectorIndex};
use crate::llm::{ChatModel, OllamaChat};
use crate::loader;
use crate::pipeline::{AnswerError, AnsweringPipeline};
use crate::prompt::PromptTemplate;
use crate::rebuild::{self, RebuildOutcome};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    embedder: Arc<dyn EmbeddingProvider>,
    model: Arc<dyn ChatModel>,
    /// Currently loaded index; `None` until a build succeeds.
    index: Arc<Mutex<Option<Arc<VectorIndex>>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn ChatModel>,
        index: Option<VectorIndex>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            embedder,
            model,
            index: Arc::new(Mutex::new(index.map(Arc::new))),
        }
    }
}

/// Routes with CORS applied, ready to serve.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sources", get(handle_sources))
        .route("/ask", post(handle_ask))
        .route("/rebuild", post(handle_rebuild))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let embedder = embedding::create_provider(&config.embedding)?;
    let model: Arc<dyn ChatModel> = Arc::new(OllamaChat::new(&config.llm)?);
    let loaded = index::load_index(config).await.into_index();
    if loaded.is_none() {
        println!("Knowledge base not found. POST /rebuild or run `docqa rebuild` to build it.");
    }

    let state = AppState::new(config.clone(), embedder, model, loaded);
    let app = router(state);

    println!("docqa server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn knowledge_base_absent(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "knowledge_base_absent",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<AnswerError> for AppError {
    fn from(e: AnswerError) -> Self {
        match e {
            AnswerError::Model(_) => AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "model_error",
                message: e.to_string(),
            },
            AnswerError::Embedding(_) | AnswerError::Retrieval(_) => internal(e.to_string()),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    index_loaded: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let index_loaded = state.index.lock().await.is_some();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        index_loaded,
    })
}

// ============ GET /sources ============

#[derive(Serialize)]
struct SourcesResponse {
    /// `true` when `sources` come from the loaded index rather than the data directory.
    indexed: bool,
    sources: Vec<String>,
}

async fn handle_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    let guard = state.index.lock().await;
    let response = match guard.as_ref() {
        Some(index) => SourcesResponse {
            indexed: true,
            sources: index.source_files(),
        },
        None => SourcesResponse {
            indexed: false,
            sources: loader::list_data_files(&state.config.paths.data_dir),
        },
    };
    Json(response)
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct SourceRef {
    source_file: String,
    /// One-based page number, when the source is paginated.
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    label: String,
    score: f32,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<SourceRef>,
    elapsed_secs: f64,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    // Held for the whole call so questions and rebuilds never interleave.
    let guard = state.index.lock().await;
    let index = guard.clone().ok_or_else(|| {
        knowledge_base_absent("Knowledge base not found. Run `docqa rebuild` or POST /rebuild.")
    })?;

    let pipeline = AnsweringPipeline::with_index(
        index,
        state.embedder.clone(),
        state.config.embedding.clone(),
        state.model.clone(),
        PromptTemplate::from_config(&state.config.prompt),
        state.config.retrieval.top_k,
    )
    .map_err(|e| knowledge_base_absent(e.to_string()))?;

    let started = Instant::now();
    let answer = pipeline.answer(question).await?;
    let elapsed_secs = started.elapsed().as_secs_f64();
    drop(guard);

    let sources = answer
        .context
        .iter()
        .map(|hit| SourceRef {
            source_file: hit.chunk.metadata.source_file.clone(),
            page: hit.chunk.metadata.page.map(|p| p + 1),
            label: hit.chunk.metadata.source_label(),
            score: hit.score,
        })
        .collect();

    Ok(Json(AskResponse {
        answer: answer.text,
        sources,
        elapsed_secs,
    }))
}

// ============ POST /rebuild ============

#[derive(Serialize)]
struct RebuildResponse {
    /// `"rebuilt"` or `"no_documents"`.
    status: String,
    chunks: usize,
    sources: Vec<String>,
}

async fn handle_rebuild(State(state): State<AppState>) -> Result<Json<RebuildResponse>, AppError> {
    let mut guard = state.index.lock().await;

    let outcome = rebuild::rebuild_knowledge_base(&state.config, state.embedder.as_ref())
        .await
        .map_err(|e| {
            error!("Rebuild failed: {:#}", e);
            internal(format!("{:#}", e))
        })?;

    let response = match outcome {
        RebuildOutcome::Built(index) => {
            let response = RebuildResponse {
                status: "rebuilt".to_string(),
                chunks: index.len(),
                sources: index.source_files(),
            };
            *guard = Some(Arc::new(index));
            info!("Knowledge base reloaded ({} chunks)", response.chunks);
            response
        }
        RebuildOutcome::NoDocuments => RebuildResponse {
            status: "no_documents".to_string(),
            chunks: 0,
            sources: Vec::new(),
        },
    };

    Ok(Json(response))
}
