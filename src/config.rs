//! TOML configuration.
//!
//! Every section carries serde defaults, so an empty file yields a working
//! configuration for a local Ollama install. [`load_config`] parses and
//! validates; [`Config::default`] is used by tests and by commands that can
//! run without a file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
        }
    }
}

fn default_app_name() -> String {
    "Educational RAG Assistant".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Directory scanned for source documents.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory holding the persisted vector index.
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            index_dir: default_index_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/raw")
}
fn default_index_dir() -> PathBuf {
    PathBuf::from("vector_store")
}

/// Splitter parameters, both measured in characters.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Requested compute device: `cpu` or `cuda`.
    #[serde(default = "default_device")]
    pub device: String,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Prepended to questions before embedding (E5-style models use `"query: "`).
    #[serde(default)]
    pub query_prefix: Option<String>,
    /// Prepended to chunk text before embedding (E5-style models use `"passage: "`).
    #[serde(default)]
    pub passage_prefix: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            device: default_device(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            query_prefix: None,
            passage_prefix: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_device() -> String {
    "cpu".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the model as context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    /// How long the server keeps the model loaded after a call.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,
    /// Layers offloaded to the GPU; `None` leaves the decision to the server.
    #[serde(default = "default_num_gpu")]
    pub num_gpu: Option<i64>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
            num_ctx: default_num_ctx(),
            keep_alive: default_keep_alive(),
            num_gpu: default_num_gpu(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_model() -> String {
    "qwen2.5:7b".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_num_ctx() -> u32 {
    4096
}
fn default_keep_alive() -> String {
    "5m".to_string()
}
fn default_num_gpu() -> Option<i64> {
    Some(999)
}
fn default_llm_timeout_secs() -> u64 {
    300
}
fn default_llm_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    /// Language every answer must be written in.
    #[serde(default = "default_language")]
    pub language: String,
    /// Sentence the model must reply with when the context lacks the answer.
    #[serde(default = "default_refusal_phrase")]
    pub refusal_phrase: String,
    /// Overrides the built-in system instruction. Placeholders:
    /// `{refusal}`, `{language}`, `{context}` (required).
    #[serde(default)]
    pub system_template: Option<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            refusal_phrase: default_refusal_phrase(),
            system_template: None,
        }
    }
}

fn default_language() -> String {
    "Russian".to_string()
}
fn default_refusal_phrase() -> String {
    "В документах нет информации об этом".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvaluationConfig {
    #[serde(default = "default_dataset")]
    pub dataset: PathBuf,
    #[serde(default = "default_report")]
    pub report: PathBuf,
    #[serde(default = "default_transcript")]
    pub transcript: PathBuf,
    /// Case-insensitive substring that marks a refusal answer.
    #[serde(default = "default_refusal_marker")]
    pub refusal_marker: String,
    /// Categories containing this tag are designed to have no answer.
    #[serde(default = "default_generalization_tag")]
    pub generalization_tag: String,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            report: default_report(),
            transcript: default_transcript(),
            refusal_marker: default_refusal_marker(),
            generalization_tag: default_generalization_tag(),
        }
    }
}

fn default_dataset() -> PathBuf {
    PathBuf::from("test_dataset_expanded.json")
}
fn default_report() -> PathBuf {
    PathBuf::from("VALIDATION_REPORT.md")
}
fn default_transcript() -> PathBuf {
    PathBuf::from("FULL_TEST_LOGS.md")
}
fn default_refusal_marker() -> String {
    "нет информации".to_string()
}
fn default_generalization_tag() -> String {
    "generalization".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

impl Config {
    /// Name and version shown in generated reports.
    pub fn system_name(&self) -> String {
        format!("{} v{}", self.app.name, env!("CARGO_PKG_VERSION"))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "local" | "ollama" | "openai" | "hash" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, ollama, openai, or hash.",
            other
        ),
    }
    if config.embedding.provider == "hash" && config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0 when provider is 'hash'");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    config.embedding.device.parse::<crate::device::Device>()?;

    // Validate llm
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }

    // Validate prompt
    if !config
        .prompt
        .refusal_phrase
        .to_lowercase()
        .contains(&config.evaluation.refusal_marker.to_lowercase())
    {
        bail!(
            "prompt.refusal_phrase ('{}') must contain evaluation.refusal_marker ('{}')",
            config.prompt.refusal_phrase,
            config.evaluation.refusal_marker
        );
    }
    if let Some(template) = &config.prompt.system_template {
        if !template.contains("{context}") {
            bail!("prompt.system_template must contain a {{context}} placeholder");
        }
    }

    Ok(())
}
