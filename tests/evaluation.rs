//! Evaluation harness and reports driven by an in-process chat model.

use async_trait::async_trait;
use chrono::NaiveDate;
use docqa::config::{Config, EmbeddingConfig, PromptConfig};
use docqa::embedding::HashProvider;
use docqa::evaluate::{self, Prediction, ScoringRules, TestCase};
use docqa::index::{self, IndexHeader, IndexStatus, VectorIndex};
use docqa::llm::{ChatMessage, ChatModel, LlmError};
use docqa::loader;
use docqa::pipeline::{AnswerError, AnsweringPipeline};
use docqa::prompt::PromptTemplate;
use docqa::report;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Answers from the context, refusing for questions about sport.
struct ScriptedModel {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let question = &messages[1].content;
        if question.contains("World Cup") {
            Ok("В документах нет информации об этом".to_string())
        } else {
            Ok("Photosynthesis turns light, water and carbon dioxide into sugar.".to_string())
        }
    }
}

/// Fails every call after the first.
struct FlakyModel {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for FlakyModel {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok("A perfectly reasonable and long answer.".to_string())
        } else {
            Err(LlmError::Timeout)
        }
    }
}

async fn ready_pipeline(tmp: &std::path::Path, model: Arc<dyn ChatModel>) -> AnsweringPipeline {
    let mut config = Config::default();
    config.paths.data_dir = tmp.join("data");
    config.paths.index_dir = tmp.join("vector_store");
    config.embedding.provider = "hash".to_string();
    fs::create_dir_all(&config.paths.data_dir).unwrap();
    fs::write(
        config.paths.data_dir.join("plants.md"),
        "Photosynthesis is the process plants use to turn light into chemical energy.",
    )
    .unwrap();

    let provider = Arc::new(HashProvider::new(384));
    let docs = loader::load_documents(&config.paths.data_dir).unwrap();
    index::build_index(&config, provider.as_ref(), &docs)
        .await
        .unwrap();

    AnsweringPipeline::from_config(&config, index::load_index(&config).await, provider, model)
        .unwrap()
}

fn cases() -> Vec<TestCase> {
    vec![
        TestCase {
            question: "What is photosynthesis?".to_string(),
            category: "fact_retrieval".to_string(),
        },
        TestCase {
            question: "Who won the 2018 World Cup?".to_string(),
            category: "generalization_negative".to_string(),
        },
    ]
}

#[tokio::test]
async fn every_category_scores_five() {
    let tmp = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel {
        calls: AtomicUsize::new(0),
    });
    let pipeline = ready_pipeline(tmp.path(), model.clone()).await;

    let run = evaluate::run_evaluation(&pipeline, &cases(), &ScoringRules::default()).await;
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    assert_eq!(run.records.len(), 2);
    assert!(run.records.iter().all(|r| r.context_found));

    let means = evaluate::category_means(&run.records);
    assert_eq!(
        means,
        vec![
            ("fact_retrieval".to_string(), 5.0),
            ("generalization_negative".to_string(), 5.0),
        ]
    );

    let total: f64 = run.records.iter().map(|r| r.latency).sum();
    assert!((run.total_time - total).abs() < 1e-9);
}

/// Always replies with the refusal phrase.
struct RefusingModel;

#[async_trait]
impl ChatModel for RefusingModel {
    fn name(&self) -> &str {
        "refusing"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        Ok("В документах нет информации об этом".to_string())
    }
}

#[tokio::test]
async fn refusal_without_context_scores_five() {
    let empty = VectorIndex::new(
        IndexHeader {
            model: "feature-hash".to_string(),
            dims: 384,
            built_at: "2025-01-02T09:05:00+00:00".to_string(),
            chunk_size: 500,
            chunk_overlap: 50,
        },
        Vec::new(),
    )
    .unwrap();
    let pipeline = AnsweringPipeline::with_index(
        Arc::new(empty),
        Arc::new(HashProvider::new(384)),
        EmbeddingConfig::default(),
        Arc::new(RefusingModel),
        PromptTemplate::from_config(&PromptConfig::default()),
        4,
    )
    .unwrap();

    let cases = vec![TestCase {
        question: "Who won the 2018 World Cup?".to_string(),
        category: "generalization_negative".to_string(),
    }];
    let run = evaluate::run_evaluation(&pipeline, &cases, &ScoringRules::default()).await;

    assert_eq!(run.records.len(), 1);
    assert!(!run.records[0].context_found);
    assert_eq!(run.records[0].score, 5);
    assert_eq!(
        evaluate::category_means(&run.records),
        vec![("generalization_negative".to_string(), 5.0)]
    );
}

#[tokio::test]
async fn failures_are_recorded_and_batch_continues() {
    let tmp = tempfile::tempdir().unwrap();
    let model = Arc::new(FlakyModel {
        calls: AtomicUsize::new(0),
    });
    let pipeline = ready_pipeline(tmp.path(), model).await;

    let run = evaluate::run_evaluation(&pipeline, &cases(), &ScoringRules::default()).await;
    assert_eq!(run.records.len(), 2);
    assert_eq!(run.records[0].score, 5);
    assert_eq!(
        run.records[1].prediction,
        Prediction::Failed(AnswerError::Model(LlmError::Timeout))
    );
    assert!(!run.records[1].context_found);
    assert_eq!(run.records[1].score, 0);

    let at = NaiveDate::from_ymd_opt(2025, 1, 2)
        .unwrap()
        .and_hms_opt(9, 5, 0)
        .unwrap();
    let summary = report::render_summary(&run.records, run.total_time, "Test v1", at).unwrap();
    assert!(summary.contains("* **System failure (0):** 1"));
    assert!(summary.contains("### Who won the 2018 World Cup?"));
    assert!(!summary.contains("### What is photosynthesis?"));

    let out = tmp.path().join("VALIDATION_REPORT.md");
    assert!(report::write_report(&out, &summary));
    let again = report::render_summary(&run.records, run.total_time, "Test v1", at).unwrap();
    assert!(report::write_report(&out, &again));
    assert_eq!(fs::read_to_string(&out).unwrap(), summary);
}

#[tokio::test]
async fn absent_knowledge_base_blocks_pipeline() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.paths.index_dir = tmp.path().join("nothing_here");
    let status = index::load_index(&config).await;
    assert!(matches!(status, IndexStatus::NotBuilt));

    let result = AnsweringPipeline::from_config(
        &config,
        status,
        Arc::new(HashProvider::new(384)),
        Arc::new(ScriptedModel {
            calls: AtomicUsize::new(0),
        }),
    );
    let err = result.err().expect("pipeline must not be constructed");
    assert!(err.to_string().contains("docqa rebuild"));
}
