//! Results reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::judge::JudgeInfo;
use crate::runner::EvaluationResult;

/// One persisted evaluation row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<u64>,
    /// `provider/model`
    pub model_label: String,
    pub response_text: String,
    pub accuracy_score: f64,
    pub clarity_score: f64,
    pub completeness_score: f64,
    pub reasoning: String,
    pub judged_by: String,
    pub model_version: String,
    /// The judge produced no verdict; scores are placeholders
    #[serde(default)]
    pub judge_failed: bool,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn average_score(&self) -> f64 {
        (self.accuracy_score + self.clarity_score + self.completeness_score) / 3.0
    }
}

/// Mean scores for one model label across a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model_label: String,
    pub evaluations: usize,
    pub failures: usize,
    pub avg_accuracy: f64,
    pub avg_clarity: f64,
    pub avg_completeness: f64,
}

/// JSON results export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsFile {
    pub run_id: String,
    pub timestamp: String,
    pub judged_by: String,
    pub summary: Vec<ModelSummary>,
    pub records: Vec<EvaluationRecord>,
}

impl ResultsFile {
    pub fn new(run_id: impl Into<String>, judge: &JudgeInfo, records: Vec<EvaluationRecord>) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: Utc::now().to_rfc3339(),
            judged_by: judge.model_name.clone(),
            summary: summarize(&records),
            records,
        }
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

/// Per-model means, sorted best first. Rows whose judge failed count as zeros in the means.
pub fn summarize(records: &[EvaluationRecord]) -> Vec<ModelSummary> {
    let mut by_label: BTreeMap<&str, Vec<&EvaluationRecord>> = BTreeMap::new();
    for record in records {
        by_label.entry(record.model_label.as_str()).or_default().push(record);
    }

    let mut summaries: Vec<ModelSummary> = by_label
        .into_iter()
        .map(|(label, rows)| {
            let n = rows.len() as f64;
            let mean = |f: fn(&EvaluationRecord) -> f64| rows.iter().map(|r| f(r)).sum::<f64>() / n;
            ModelSummary {
                model_label: label.to_string(),
                evaluations: rows.len(),
                failures: rows.iter().filter(|r| r.judge_failed).count(),
                avg_accuracy: mean(|r| r.accuracy_score),
                avg_clarity: mean(|r| r.clarity_score),
                avg_completeness: mean(|r| r.completeness_score),
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        let a_avg = a.avg_accuracy + a.avg_clarity + a.avg_completeness;
        let b_avg = b.avg_accuracy + b.avg_clarity + b.avg_completeness;
        b_avg.partial_cmp(&a_avg).unwrap_or(std::cmp::Ordering::Equal)
    });
    summaries
}

/// Print a single evaluation
pub fn print_evaluation(result: &EvaluationResult) {
    println!("\n=== TruthMeter Evaluation ===\n");
    println!("Question: {}", result.question_text);
    println!("Model:    {}", result.candidate.label());
    println!("{:-<50}", "");
    println!("Answer:\n{}\n", result.candidate.text);
    println!("{:-<50}", "");
    println!("Accuracy:     {:>6.1}", result.outcome.accuracy_score());
    println!("Clarity:      {:>6.1}", result.outcome.clarity_score());
    println!("Completeness: {:>6.1}", result.outcome.completeness_score());
    println!("\nReasoning:\n{}", result.outcome.reasoning());
    println!(
        "\nJudged by {} (v{}) in {}ms",
        result.judged_by(),
        result.model_version(),
        result.duration_ms()
    );
}

/// Generate a console report
pub fn print_console_report(records: &[EvaluationRecord]) {
    println!("\n=== TruthMeter Results ===\n");
    println!("Total Evaluations: {}\n", records.len());

    println!("Model Rankings:");
    println!("{:-<70}", "");
    for (i, summary) in summarize(records).iter().enumerate() {
        println!(
            "  {}. {} - Accuracy: {:.1}, Clarity: {:.1}, Completeness: {:.1} ({} runs, {} unjudged)",
            i + 1,
            summary.model_label,
            summary.avg_accuracy,
            summary.avg_clarity,
            summary.avg_completeness,
            summary.evaluations,
            summary.failures
        );
    }
    println!();
}

pub fn print_judge_info(info: &JudgeInfo) {
    println!("\n=== {} ===\n", info.model_name);
    println!("Version:        {}", info.version);
    println!("Training date:  {}", info.training_date);
    println!("Specialization: {}", info.specialization);
    println!("Domains:        {}", info.supported_domains.join(", "));
    println!("\n{}", info.description);
}
