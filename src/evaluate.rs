//! Batch evaluation harness.
//!
//! Runs every question of a JSON dataset through the answering pipeline,
//! one at a time, and scores each reply with a formal heuristic:
//!
//! | Condition | Points |
//! |-----------|--------|
//! | at least one context chunk retrieved | +3 |
//! | answer longer than 20 characters | +2 |
//! | generalization category, no context, answer contains the refusal marker | = 5 |
//! | pipeline call failed | = 0 |
//!
//! The score is a proxy for quality, not a judgment of correctness: a long
//! wrong answer over retrieved context earns 5, and a short correct answer
//! earns 3. Treat the numbers as a regression signal.
//!
//! # Dataset format
//!
//! ```json
//! [
//!   { "question": "What is photosynthesis?", "category": "fact_retrieval" },
//!   { "question": "Who won the 2018 World Cup?", "category": "generalization_negative" }
//! ]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::EvaluationConfig;
use crate::pipeline::{AnswerError, AnsweringPipeline};

const LENGTH_THRESHOLD: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub question: String,
    pub category: String,
}

pub fn load_dataset(path: &Path) -> Result<Vec<TestCase>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Test dataset '{}' not found or unreadable", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse test dataset '{}'", path.display()))
}

/// Outcome of one pipeline call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prediction {
    Answered(String),
    Failed(AnswerError),
}

impl Prediction {
    /// Text shown in reports; failures are rendered with their cause.
    pub fn display_text(&self) -> String {
        match self {
            Prediction::Answered(text) => text.clone(),
            Prediction::Failed(e) => format!("System error: {}", e),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Prediction::Failed(_))
    }
}

/// Knobs for [`score`], taken from `[evaluation]`.
#[derive(Debug, Clone)]
pub struct ScoringRules {
    /// Case-insensitive substring that marks a refusal.
    pub refusal_marker: String,
    /// Categories containing this tag expect a refusal.
    pub generalization_tag: String,
}

impl ScoringRules {
    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self {
            refusal_marker: config.refusal_marker.clone(),
            generalization_tag: config.generalization_tag.clone(),
        }
    }
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self::from_config(&EvaluationConfig::default())
    }
}

/// Score one prediction on the 0 to 5 scale described in the module docs.
pub fn score(category: &str, prediction: &Prediction, context_found: bool, rules: &ScoringRules) -> u8 {
    let answer = match prediction {
        Prediction::Answered(text) => text,
        Prediction::Failed(_) => return 0,
    };

    if category.contains(&rules.generalization_tag)
        && !context_found
        && answer
            .to_lowercase()
            .contains(&rules.refusal_marker.to_lowercase())
    {
        return 5;
    }

    let mut points = 0;
    if context_found {
        points += 3;
    }
    if answer.chars().count() > LENGTH_THRESHOLD {
        points += 2;
    }
    points
}

#[derive(Debug, Clone)]
pub struct EvalRecord {
    pub question: String,
    pub category: String,
    pub prediction: Prediction,
    pub context_found: bool,
    pub score: u8,
    /// Wall-clock seconds for the pipeline call.
    pub latency: f64,
}

#[derive(Debug, Clone)]
pub struct EvalRun {
    pub records: Vec<EvalRecord>,
    /// Sum of per-item latencies, in seconds.
    pub total_time: f64,
}

/// Answer and score every case sequentially. Failures are recorded, never
/// propagated.
pub async fn run_evaluation(
    pipeline: &AnsweringPipeline,
    cases: &[TestCase],
    rules: &ScoringRules,
) -> EvalRun {
    let total = cases.len();
    info!("Starting evaluation: {} scenarios", total);

    let mut records = Vec::with_capacity(total);
    for (i, case) in cases.iter().enumerate() {
        let preview: String = case.question.chars().take(50).collect();
        info!("[{}/{}] {}... ({})", i + 1, total, preview, case.category);

        let started = Instant::now();
        let (prediction, context_found) = match pipeline.answer(&case.question).await {
            Ok(answer) => {
                let found = answer.context_found();
                (Prediction::Answered(answer.text), found)
            }
            Err(e) => {
                warn!("Scenario {} failed: {}", i + 1, e);
                (Prediction::Failed(e), false)
            }
        };
        let latency = started.elapsed().as_secs_f64();

        let score = score(&case.category, &prediction, context_found, rules);
        records.push(EvalRecord {
            question: case.question.clone(),
            category: case.category.clone(),
            prediction,
            context_found,
            score,
            latency,
        });
    }

    let total_time = records.iter().map(|r| r.latency).sum();
    EvalRun {
        records,
        total_time,
    }
}

/// Number of records whose pipeline call failed.
pub fn failure_count(records: &[EvalRecord]) -> usize {
    records.iter().filter(|r| r.prediction.is_failure()).count()
}

/// Mean score per category, categories in first-seen order.
pub fn category_means(records: &[EvalRecord]) -> Vec<(String, f64)> {
    let mut sums: Vec<(String, u32, u32)> = Vec::new();
    for record in records {
        match sums.iter_mut().find(|(cat, _, _)| *cat == record.category) {
            Some((_, sum, count)) => {
                *sum += u32::from(record.score);
                *count += 1;
            }
            None => sums.push((record.category.clone(), u32::from(record.score), 1)),
        }
    }
    sums.into_iter()
        .map(|(cat, sum, count)| (cat, f64::from(sum) / f64::from(count)))
        .collect()
}
