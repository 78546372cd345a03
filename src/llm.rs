//! Chat model client.
//!
//! [`ChatModel`] is the seam between the answering pipeline and whatever
//! generates text. [`OllamaChat`] talks to an Ollama-compatible
//! `POST /api/chat` endpoint, non-streaming; tests substitute their own
//! implementation.
//!
//! # Request
//!
//! ```json
//! {
//!   "model": "qwen2.5:7b",
//!   "messages": [{"role": "system", "content": "..."}, {"role": "user", "content": "..."}],
//!   "stream": false,
//!   "keep_alive": "5m",
//!   "options": {"temperature": 0.1, "num_ctx": 4096, "num_gpu": 999}
//! }
//! ```
//!
//! The reply text is read from `message.content`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;
use crate::http::{self, SendError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Why a model call produced no answer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("language model server unreachable: {0}")]
    Unreachable(String),
    #[error("language model request timed out")]
    Timeout,
    #[error("language model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid language model response: {0}")]
    InvalidResponse(String),
}

impl From<SendError> for LlmError {
    fn from(e: SendError) -> Self {
        match e {
            SendError::Network(e) => LlmError::Unreachable(e.to_string()),
            SendError::Timeout => LlmError::Timeout,
            SendError::Status { status, body } => LlmError::Status {
                status: status.as_u16(),
                body,
            },
            SendError::Decode(msg) => LlmError::InvalidResponse(msg),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logs and reports.
    fn name(&self) -> &str;
    /// Run one completion over `messages` and return the reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

pub struct OllamaChat {
    model: String,
    url: String,
    keep_alive: String,
    temperature: f32,
    num_ctx: u32,
    num_gpu: Option<i64>,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            url: format!("{}/api/chat", config.base_url.trim_end_matches('/')),
            keep_alive: config.keep_alive.clone(),
            temperature: config.temperature,
            num_ctx: config.num_ctx,
            num_gpu: config.num_gpu,
            max_retries: config.max_retries,
            client: http::build_client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let mut options = serde_json::json!({
            "temperature": self.temperature,
            "num_ctx": self.num_ctx,
        });
        if let Some(num_gpu) = self.num_gpu {
            options["num_gpu"] = serde_json::json!(num_gpu);
        }
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "keep_alive": self.keep_alive,
            "options": options,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let body = self.request_body(messages);
        let json =
            http::post_json_with_retry(&self.client, &self.url, None, &body, self.max_retries)
                .await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String, LlmError> {
    if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
        return Err(LlmError::InvalidResponse(err.to_string()));
    }
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::InvalidResponse("missing message.content".to_string()))
}
