//! Rubric-driven automated judging
//!
//! The judge renders the rubric prompt, sends it to a single scoring
//! engine at low temperature, and turns the reply into a [`JudgeOutcome`].
//! Every failure (missing key, transport, malformed output) comes back as
//! [`JudgeOutcome::Failed`] with zeroed scores and a readable reason.

pub mod outcome;
pub mod parse;
pub mod prompt;

pub use outcome::{JudgeFailure, JudgeOutcome, RubricCompliance, ScoreRecord};
pub use parse::{parse_judge_output, strip_code_fences, JudgeParseError};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{Credentials, JudgeSettings};
use crate::providers::{CompletionRequest, LLMProvider, Message, OpenAIClient};
use crate::runner::Deadline;

/// Identifier stamped on every judged result
pub const JUDGE_NAME: &str = "TruthMeter-Judge-v1.0";
pub const JUDGE_VERSION: &str = "1.0.0";
pub const TRAINING_DATE: &str = "2024-12";

/// Judge metadata for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeInfo {
    pub model_name: String,
    pub version: String,
    pub training_date: String,
    pub specialization: String,
    pub supported_domains: Vec<String>,
    pub description: String,
}

impl JudgeInfo {
    pub fn current() -> Self {
        Self {
            model_name: JUDGE_NAME.to_string(),
            version: JUDGE_VERSION.to_string(),
            training_date: TRAINING_DATE.to_string(),
            specialization: "Educational Content Evaluation".to_string(),
            supported_domains: ["Mathematics", "Science", "History", "Literature"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
            description: "Rubric-driven grader of educational answers against expert references"
                .to_string(),
        }
    }
}

/// Whether the judge can currently score anything
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeHealth {
    pub status: String,
    pub model: String,
    pub ready: bool,
}

/// Grades candidate answers against reference answers
pub struct Judge {
    engine: Option<Arc<dyn LLMProvider>>,
    settings: JudgeSettings,
    deadline: Deadline,
}

impl Judge {
    /// Build the judge; without the engine key every call fails fast
    pub fn new(settings: &JudgeSettings, credentials: &Credentials) -> Self {
        let engine = credentials.get(&settings.api_key_env).map(|key| {
            let client = OpenAIClient::new(key.to_string())
                .with_base_url(&settings.base_url)
                .with_model(&settings.engine_model);
            Arc::new(client) as Arc<dyn LLMProvider>
        });

        Self {
            engine,
            settings: settings.clone(),
            deadline: Deadline::new(settings.timeout_ms),
        }
    }

    /// Use a specific scoring engine
    pub fn with_engine(mut self, engine: Arc<dyn LLMProvider>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Share a cancellation token with the caller
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.deadline = self.deadline.with_cancellation(token);
        self
    }

    pub fn info(&self) -> JudgeInfo {
        JudgeInfo::current()
    }

    pub fn health(&self) -> JudgeHealth {
        let ready = self.engine.is_some();
        JudgeHealth {
            status: if ready { "operational" } else { "unavailable" }.to_string(),
            model: JUDGE_NAME.to_string(),
            ready,
        }
    }

    /// Score `candidate` against `reference`. Never fails; problems become `Failed` outcomes.
    pub async fn judge(&self, question: &str, reference: &str, candidate: &str) -> JudgeOutcome {
        let Some(engine) = &self.engine else {
            tracing::warn!("Judge engine key {} not configured", self.settings.api_key_env);
            return JudgeOutcome::failure(format!(
                "Error: {} model unavailable (API key not configured: {})",
                JUDGE_NAME, self.settings.api_key_env
            ));
        };

        let request = CompletionRequest::new(vec![Message::user(prompt::build(
            question, reference, candidate,
        ))])
        .with_model(&self.settings.engine_model)
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens);

        let raw = match self.deadline.run(engine.complete(&request)).await {
            Ok(response) => response.content,
            Err(e) => {
                if e.is_deadline() {
                    tracing::warn!("Judge engine call stopped: {}", e);
                } else {
                    tracing::error!("Judge engine call failed: {}", e);
                }
                return JudgeOutcome::failure(format!("{} evaluation failed: {}", JUDGE_NAME, e));
            }
        };

        match parse_judge_output(&raw) {
            Ok(record) => {
                if record.rubric_compliance() == RubricCompliance::MissingDrawbacks {
                    tracing::warn!(
                        "Judge scored below 100 without a drawbacks section (scores {:?})",
                        record.scores()
                    );
                }
                tracing::info!("Judged answer: {:?}", record.scores());
                JudgeOutcome::Scored(record)
            }
            Err(e) => {
                tracing::warn!("Unparseable judge output ({}): {:.200}", e, raw);
                JudgeOutcome::failure(format!("Evaluation failed: {}", e))
            }
        }
    }
}
