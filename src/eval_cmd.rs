//! `docqa eval`: run the evaluation dataset and write both reports.

use anyhow::Result;
use std::path::PathBuf;

use crate::ask;
use crate::config::Config;
use crate::evaluate::{self, ScoringRules};
use crate::report;

pub async fn run_eval(
    config: &Config,
    dataset: Option<PathBuf>,
    report_path: Option<PathBuf>,
    log_path: Option<PathBuf>,
) -> Result<()> {
    let dataset = dataset.unwrap_or_else(|| config.evaluation.dataset.clone());
    let report_path = report_path.unwrap_or_else(|| config.evaluation.report.clone());
    let log_path = log_path.unwrap_or_else(|| config.evaluation.transcript.clone());

    let pipeline = match ask::open_pipeline(config).await? {
        Ok(pipeline) => pipeline,
        Err(unavailable) => anyhow::bail!("{}", unavailable),
    };
    let cases = evaluate::load_dataset(&dataset)?;
    println!("Running {} scenarios against {}...", cases.len(), pipeline.model_name());

    let rules = ScoringRules::from_config(&config.evaluation);
    let run = evaluate::run_evaluation(&pipeline, &cases, &rules).await;

    println!();
    println!("Results by category:");
    for (category, mean) in evaluate::category_means(&run.records) {
        println!("  - {}: {:.2} / 5.00", category, mean);
    }
    let failures = evaluate::failure_count(&run.records);
    if failures > 0 {
        println!("  ({} of {} scenarios failed with a system error)", failures, run.records.len());
    }

    let generated_at = chrono::Local::now().naive_local();
    if let Some(summary) =
        report::render_summary(&run.records, run.total_time, &config.system_name(), generated_at)
    {
        if report::write_report(&report_path, &summary) {
            println!("Report written to {}", report_path.display());
        }
    }
    if let Some(transcript) = report::render_transcript(&run.records, generated_at) {
        if report::write_report(&log_path, &transcript) {
            println!("Transcript written to {}", log_path.display());
        }
    }

    Ok(())
}
