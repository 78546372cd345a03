//! Retrieval-augmented answering.
//!
//! An [`AnsweringPipeline`] owns the loaded index, the embedder used to
//! vectorize questions, the chat model and the prompt. Each call to
//! [`AnsweringPipeline::answer`] runs:
//!
//! 1. embed the question (query prefix applied, normalized);
//! 2. retrieve the `top_k` nearest chunks;
//! 3. join their texts with blank lines into the context;
//! 4. send the grounded system instruction plus the question to the model.
//!
//! A pipeline can only exist over a usable index. When none is available,
//! construction returns [`PipelineUnavailable::KnowledgeBaseAbsent`] with
//! a message telling the user to rebuild.

use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, EmbeddingConfig};
use crate::embedding::{self, EmbeddingProvider};
use crate::index::{IndexStatus, RetrievedChunk, VectorIndex};
use crate::llm::{ChatModel, LlmError};
use crate::prompt::{self, PromptTemplate};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineUnavailable {
    #[error("Knowledge base not found ({reason}). Run `docqa rebuild` to build it.")]
    KnowledgeBaseAbsent { reason: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnswerError {
    #[error("failed to embed question: {0}")]
    Embedding(String),
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error(transparent)]
    Model(#[from] LlmError),
}

/// Model reply plus the chunks it was grounded on, best first.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub context: Vec<RetrievedChunk>,
}

impl Answer {
    pub fn context_found(&self) -> bool {
        !self.context.is_empty()
    }

    /// Source labels of the context chunks, de-duplicated, retrieval order.
    pub fn sources(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for hit in &self.context {
            let label = hit.chunk.metadata.source_label();
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }
}

/// Unwrap a usable index or explain why there is none.
pub fn ready_index(status: IndexStatus) -> Result<VectorIndex, PipelineUnavailable> {
    match status {
        IndexStatus::Ready(index) => Ok(index),
        IndexStatus::NotBuilt => Err(PipelineUnavailable::KnowledgeBaseAbsent {
            reason: "no index has been built yet".to_string(),
        }),
        IndexStatus::Unreadable(reason) => Err(PipelineUnavailable::KnowledgeBaseAbsent {
            reason: format!("the index could not be read: {}", reason),
        }),
    }
}

pub struct AnsweringPipeline {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding: EmbeddingConfig,
    model: Arc<dyn ChatModel>,
    prompt: PromptTemplate,
    top_k: usize,
}

impl AnsweringPipeline {
    /// `embedding` supplies the query prefix applied to every question.
    pub fn new(
        status: IndexStatus,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding: EmbeddingConfig,
        model: Arc<dyn ChatModel>,
        prompt: PromptTemplate,
        top_k: usize,
    ) -> Result<Self, PipelineUnavailable> {
        let index = ready_index(status)?;
        Self::with_index(Arc::new(index), embedder, embedding, model, prompt, top_k)
    }

    /// Build over an index that is already shared elsewhere.
    pub fn with_index(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding: EmbeddingConfig,
        model: Arc<dyn ChatModel>,
        prompt: PromptTemplate,
        top_k: usize,
    ) -> Result<Self, PipelineUnavailable> {
        if index.dims() != embedder.dims() {
            return Err(PipelineUnavailable::KnowledgeBaseAbsent {
                reason: format!(
                    "the index was built with {}-dimensional '{}' embeddings but '{}' produces {}",
                    index.dims(),
                    index.header().model,
                    embedder.model_name(),
                    embedder.dims()
                ),
            });
        }
        Ok(Self {
            index,
            embedder,
            embedding,
            model,
            prompt,
            top_k: top_k.max(1),
        })
    }

    /// Assemble a pipeline from configuration, applying the configured
    /// query prefix and retrieval depth.
    pub fn from_config(
        config: &Config,
        status: IndexStatus,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self, PipelineUnavailable> {
        Self::new(
            status,
            embedder,
            config.embedding.clone(),
            model,
            PromptTemplate::from_config(&config.prompt),
            config.retrieval.top_k,
        )
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, AnswerError> {
        let query = embedding::embed_query(self.embedder.as_ref(), &self.embedding, question)
            .await
            .map_err(|e| AnswerError::Embedding(format!("{:#}", e)))?;

        let context = self
            .index
            .search(&query, self.top_k)
            .map_err(|e| AnswerError::Retrieval(format!("{:#}", e)))?;

        let context_text = prompt::join_context(context.iter().map(|hit| hit.chunk.text.as_str()));
        let messages = self.prompt.messages(&context_text, question);
        let text = self.model.complete(&messages).await?;

        Ok(Answer { text, context })
    }
}
