//! # docqa
//!
//! A local-first retrieval-augmented question-answering assistant over a
//! collection of documents.
//!
//! docqa loads PDF, DOCX and plain-text files from a directory, splits them
//! into overlapping chunks, embeds the chunks into a persisted vector index,
//! and answers questions by retrieving the closest chunks and having a
//! language model answer from them alone. An evaluation harness scores the
//! assistant against a dataset and writes Markdown reports.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │  Loader  │──▶│ Chunk+Embed  │──▶│  Index   │
//! │ pdf/docx │   │              │   │ (SQLite) │
//! └──────────┘   └──────────────┘   └────┬─────┘
//!                                        │
//!                  ┌─────────────────────┤
//!                  ▼                     ▼
//!            ┌──────────┐  question ┌──────────┐
//!            │ Pipeline │◀──────────│ CLI/HTTP │
//!            │ + LLM    │           │  / eval  │
//!            └──────────┘           └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa rebuild                       # index data/raw
//! docqa ask "What is photosynthesis?"
//! docqa chat                          # interactive session
//! docqa eval                          # write VALIDATION_REPORT.md
//! docqa serve                         # HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF, DOCX and text extraction |
//! | [`loader`] | Data directory scanning |
//! | [`chunk`] | Recursive text splitting |
//! | [`device`] | Compute device negotiation |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persisted vector index and search |
//! | [`llm`] | Chat model client |
//! | [`prompt`] | Grounded system instruction |
//! | [`pipeline`] | Retrieval-augmented answering |
//! | [`evaluate`] | Batch evaluation and scoring |
//! | [`report`] | Markdown report rendering |
//! | [`chat`] | Interactive session |
//! | [`server`] | HTTP JSON API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Index schema |

pub mod ask;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod device;
pub mod embedding;
pub mod eval_cmd;
pub mod evaluate;
pub mod extract;
pub mod http;
pub mod index;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod rebuild;
pub mod report;
pub mod server;
pub mod sources;
