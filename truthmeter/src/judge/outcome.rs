//! Typed judge results

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::{JUDGE_NAME, JUDGE_VERSION};

/// Scores for a judged answer. All three lie in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub accuracy_score: f64,
    pub clarity_score: f64,
    pub completeness_score: f64,
    pub reasoning: String,
    pub judged_by: String,
    pub model_version: String,
}

/// Whether the reasoning follows the rubric's Strengths/Drawbacks structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricCompliance {
    Compliant,
    /// A score is below 100 but the reasoning lists no drawbacks
    MissingDrawbacks,
}

/// A line that opens with a Drawbacks (or Issues) heading, markdown decoration allowed
fn drawbacks_heading() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?im)^[\s>#*_\-\d.)]*(?:drawbacks?|issues)[\s*_]*(?::|$)").unwrap()
    })
}

impl ScoreRecord {
    /// Record stamped with the judge's own attribution
    pub fn attributed(accuracy: f64, clarity: f64, completeness: f64, reasoning: impl Into<String>) -> Self {
        Self {
            accuracy_score: accuracy,
            clarity_score: clarity,
            completeness_score: completeness,
            reasoning: reasoning.into(),
            judged_by: JUDGE_NAME.to_string(),
            model_version: JUDGE_VERSION.to_string(),
        }
    }

    pub fn scores(&self) -> [f64; 3] {
        [self.accuracy_score, self.clarity_score, self.completeness_score]
    }

    pub fn is_perfect(&self) -> bool {
        self.scores().iter().all(|&s| s >= 100.0)
    }

    /// Check the reasoning against the rubric. Advisory only; parsing never rejects on this.
    pub fn rubric_compliance(&self) -> RubricCompliance {
        if self.is_perfect() || drawbacks_heading().is_match(&self.reasoning) {
            RubricCompliance::Compliant
        } else {
            RubricCompliance::MissingDrawbacks
        }
    }
}

/// A judging attempt that produced no usable scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeFailure {
    pub reason: String,
    pub judged_by: String,
    pub model_version: String,
}

impl JudgeFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            judged_by: JUDGE_NAME.to_string(),
            model_version: JUDGE_VERSION.to_string(),
        }
    }
}

/// Either a complete score record or a failure with zeroed scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JudgeOutcome {
    Scored(ScoreRecord),
    Failed(JudgeFailure),
}

impl JudgeOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        JudgeOutcome::Failed(JudgeFailure::new(reason))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JudgeOutcome::Failed(_))
    }

    pub fn accuracy_score(&self) -> f64 {
        match self {
            JudgeOutcome::Scored(r) => r.accuracy_score,
            JudgeOutcome::Failed(_) => 0.0,
        }
    }

    pub fn clarity_score(&self) -> f64 {
        match self {
            JudgeOutcome::Scored(r) => r.clarity_score,
            JudgeOutcome::Failed(_) => 0.0,
        }
    }

    pub fn completeness_score(&self) -> f64 {
        match self {
            JudgeOutcome::Scored(r) => r.completeness_score,
            JudgeOutcome::Failed(_) => 0.0,
        }
    }

    /// Judge reasoning, or the failure reason
    pub fn reasoning(&self) -> &str {
        match self {
            JudgeOutcome::Scored(r) => &r.reasoning,
            JudgeOutcome::Failed(f) => &f.reason,
        }
    }

    pub fn judged_by(&self) -> &str {
        match self {
            JudgeOutcome::Scored(r) => &r.judged_by,
            JudgeOutcome::Failed(f) => &f.judged_by,
        }
    }

    pub fn model_version(&self) -> &str {
        match self {
            JudgeOutcome::Scored(r) => &r.model_version,
            JudgeOutcome::Failed(f) => &f.model_version,
        }
    }

    /// Flatten to a score record; failures become zeros with the reason as reasoning
    pub fn into_score_record(self) -> ScoreRecord {
        match self {
            JudgeOutcome::Scored(r) => r,
            JudgeOutcome::Failed(f) => ScoreRecord {
                accuracy_score: 0.0,
                clarity_score: 0.0,
                completeness_score: 0.0,
                reasoning: f.reason,
                judged_by: f.judged_by,
                model_version: f.model_version,
            },
        }
    }
}
