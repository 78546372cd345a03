//! # docqa CLI
//!
//! The `docqa` binary answers questions about a local document collection.
//! It builds a vector index from the files in the data directory, retrieves
//! the passages closest to each question, and asks a local language model
//! to answer from those passages only.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa rebuild` | Load documents and (re)build the vector index |
//! | `docqa ask "<question>"` | Answer one question and show its sources |
//! | `docqa chat` | Interactive question/answer session |
//! | `docqa sources` | List indexed source files |
//! | `docqa eval` | Run the evaluation dataset and write Markdown reports |
//! | `docqa serve` | Start the HTTP JSON API |
//!
//! ## Examples
//!
//! ```bash
//! # Index everything under data/raw
//! docqa rebuild
//!
//! # Ask a question
//! docqa ask "What is photosynthesis?"
//!
//! # Evaluate with a custom dataset
//! docqa eval --dataset questions.json --report REPORT.md
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use docqa::config::{self, Config};
use docqa::{ask, chat, eval_cmd, logging, rebuild, server, sources};

/// docqa: retrieval-augmented question answering over local documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "docqa: retrieval-augmented question answering over local documents",
    version,
    long_about = "docqa indexes PDF, DOCX and text files from a local directory, retrieves the \
    passages most similar to a question, and has a local language model answer strictly from \
    those passages. It also runs a batch evaluation and writes Markdown reports."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docqa.toml`. When the default file does not
    /// exist, built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Load documents and rebuild the knowledge base.
    ///
    /// Reads every pdf, docx, txt, md and raw file at the top level of the
    /// data directory, splits it into chunks, embeds them, and replaces the
    /// persisted index.
    Rebuild,

    /// Answer a single question.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Start an interactive chat session.
    ///
    /// Commands inside the session: /rebuild, /sources, /history, /quit.
    Chat,

    /// List the source files in the knowledge base.
    Sources,

    /// Run the evaluation dataset and write the reports.
    Eval {
        /// JSON dataset of `{question, category}` records.
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Output path for the summary report.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Output path for the full question/answer transcript.
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Start the HTTP JSON API on `[server].bind`.
    Serve,
}

fn load_or_default(path: &Path) -> anyhow::Result<Config> {
    // Only the implicit default path may be absent.
    if !path.exists() && path == Path::new("./config/docqa.toml") {
        return Ok(Config::default());
    }
    config::load_config(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Rebuild => {
            rebuild::run_rebuild(&cfg).await?;
        }
        Commands::Ask { question } => {
            ask::run_ask(&cfg, &question).await?;
        }
        Commands::Chat => {
            chat::run_chat(&cfg).await?;
        }
        Commands::Sources => {
            sources::run_sources(&cfg).await?;
        }
        Commands::Eval {
            dataset,
            report,
            log,
        } => {
            eval_cmd::run_eval(&cfg, dataset, report, log).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
