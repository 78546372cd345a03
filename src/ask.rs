//! One-shot question answering from the command line.

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::embedding;
use crate::index::{self, IndexStatus};
use crate::llm::OllamaChat;
use crate::pipeline::{self, Answer, AnsweringPipeline, PipelineUnavailable};

/// Load the persisted index and wire up the configured embedder and model.
///
/// The outer `Result` carries configuration errors; the inner one reports a
/// missing or unusable knowledge base.
pub async fn open_pipeline(
    config: &Config,
) -> Result<Result<AnsweringPipeline, PipelineUnavailable>> {
    // Check the index before creating providers so a missing knowledge base
    // never triggers a model download.
    let index = match pipeline::ready_index(index::load_index(config).await) {
        Ok(index) => index,
        Err(unavailable) => return Ok(Err(unavailable)),
    };
    let embedder = embedding::create_provider(&config.embedding)?;
    let model = Arc::new(OllamaChat::new(&config.llm)?);
    Ok(AnsweringPipeline::from_config(
        config,
        IndexStatus::Ready(index),
        embedder,
        model,
    ))
}

/// Print an answer followed by its de-duplicated sources and timing.
pub fn print_answer(answer: &Answer, elapsed: Duration) {
    println!("{}", answer.text);
    let sources = answer.sources();
    if !sources.is_empty() {
        println!();
        println!("Sources:");
        for source in sources {
            println!("  - {}", source);
        }
    }
    println!();
    println!("Answered in {:.2} s", elapsed.as_secs_f64());
}

pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let pipeline = match open_pipeline(config).await? {
        Ok(pipeline) => pipeline,
        Err(unavailable) => {
            println!("{}", unavailable);
            return Ok(());
        }
    };

    let started = Instant::now();
    match pipeline.answer(question).await {
        Ok(answer) => print_answer(&answer, started.elapsed()),
        Err(e) => eprintln!("Error: {}", e),
    }
    Ok(())
}
