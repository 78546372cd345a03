//! Markdown reports for evaluation runs.
//!
//! Two documents are produced from the same records:
//!
//! - **Summary** ([`render_summary`]): headline statistics, the score
//!   distribution, and a detail block for every scenario scoring 3 or less.
//! - **Transcript** ([`render_transcript`]): every question and answer,
//!   regardless of score.
//!
//! Rendering is pure: the timestamp is passed in, so identical inputs give
//! byte-identical output. [`write_report`] is the only function touching
//! the filesystem and never fails the caller.

use chrono::NaiveDateTime;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{error, info, warn};

use crate::evaluate::EvalRecord;

/// Records at or below this score get a detail block in the summary.
const DETAIL_THRESHOLD: u8 = 3;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Render the summary report. Returns `None` for an empty run.
pub fn render_summary(
    records: &[EvalRecord],
    total_time: f64,
    system_name: &str,
    generated_at: NaiveDateTime,
) -> Option<String> {
    if records.is_empty() {
        warn!("No evaluation results; summary report not generated");
        return None;
    }

    let scores: Vec<u8> = records.iter().map(|r| r.score).collect();
    let latencies: Vec<f64> = records.iter().map(|r| r.latency).collect();
    let mean_score = scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64;
    let count = |range: std::ops::RangeInclusive<u8>| {
        scores.iter().filter(|s| range.contains(*s)).count()
    };

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "# Evaluation Report\n\
         \n\
         **Generated:** {date}\n\
         **System:** {system}\n\
         **Sample size:** {n} test scenarios\n\
         \n\
         ## 1. Summary\n\
         \n\
         | Metric | Value | Note |\n\
         |--------|-------|------|\n\
         | **Mean quality score** | **{mean_score:.2} / 5.00** | target > 4.0 |\n\
         | **Mean latency** | {mean_latency:.2} s | |\n\
         | **Median latency** | {median_latency:.2} s | stability |\n\
         | **Total time** | {total_time:.1} s | |\n\
         \n\
         ## 2. Score distribution\n\
         \n\
         * **High quality (5):** {high}\n\
         * **Acceptable (3-4):** {mid}\n\
         * **Low quality (1-2):** {low}\n\
         * **System failure (0):** {zero}\n\
         \n\
         ## 3. Scenarios needing attention (score <= {threshold})\n",
        date = generated_at.format(DATE_FORMAT),
        system = system_name,
        n = records.len(),
        mean_score = mean_score,
        mean_latency = mean(&latencies),
        median_latency = median(&latencies),
        total_time = total_time,
        high = count(5..=5),
        mid = count(3..=4),
        low = count(1..=2),
        zero = count(0..=0),
        threshold = DETAIL_THRESHOLD,
    );

    for record in records.iter().filter(|r| r.score <= DETAIL_THRESHOLD) {
        let _ = write!(
            out,
            "\n### {question}\n\
             \n\
             * **Category:** {category}\n\
             * **Score:** {score}\n\
             * **Answer:** {answer}\n\
             * **Latency:** {latency:.2} s\n\
             \n\
             ---\n",
            question = record.question,
            category = record.category,
            score = record.score,
            answer = record.prediction.display_text(),
            latency = record.latency,
        );
    }

    Some(out)
}

/// Render the full question/answer transcript. Returns `None` for an empty run.
pub fn render_transcript(records: &[EvalRecord], generated_at: NaiveDateTime) -> Option<String> {
    if records.is_empty() {
        warn!("No evaluation results; transcript not generated");
        return None;
    }

    let mut out = String::new();
    let _ = write!(
        out,
        "# Evaluation Transcript\n\n**Generated:** {}\n**Scenarios:** {}\n",
        generated_at.format(DATE_FORMAT),
        records.len()
    );

    for (i, record) in records.iter().enumerate() {
        let _ = write!(
            out,
            "\n## {n}. {question}\n\
             \n\
             * **Category:** {category}\n\
             * **Score:** {score} / 5\n\
             * **Latency:** {latency:.2} s\n\
             * **Context found:** {found}\n\
             \n\
             **Answer:**\n\
             \n",
            n = i + 1,
            question = record.question,
            category = record.category,
            score = record.score,
            latency = record.latency,
            found = if record.context_found { "yes" } else { "no" },
        );
        for line in record.prediction.display_text().lines() {
            if line.is_empty() {
                out.push_str(">\n");
            } else {
                let _ = writeln!(out, "> {}", line);
            }
        }
        out.push_str("\n---\n");
    }

    Some(out)
}

/// Overwrite `path` with `content`. Failures are logged and reported as `false`.
pub fn write_report(path: &Path, content: &str) -> bool {
    match std::fs::write(path, content) {
        Ok(()) => {
            info!("Report saved to {}", path.display());
            true
        }
        Err(e) => {
            error!("Failed to write report {}: {}", path.display(), e);
            false
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
