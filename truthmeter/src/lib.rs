//! TruthMeter: multi-provider answer generation and rubric-driven judging
//!
//! A question goes to one of several LLM providers. The answer is then
//! graded by a fixed judge model against an expert reference answer on
//! accuracy, clarity and completeness (0-100 each).
//!
//! # Features
//!
//! - OpenAI, Google (Gemini), Anthropic (Claude), Meta (Llama via Groq) and DeepSeek
//! - Missing keys, transport errors and malformed judge output become zero-score records, never panics
//! - Per-call deadlines and shared cancellation
//! - Bounded concurrent batch evaluation
//!
//! # Example
//!
//! ```no_run
//! use truthmeter::{config::Credentials, runner::Evaluator, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default();
//!     let credentials = Credentials::from_env(&config);
//!     let evaluator = Evaluator::new(&config, &credentials);
//!
//!     let result = evaluator
//!         .evaluate("What is 2+2?", "4", "openai", "auto")
//!         .await?;
//!
//!     println!("{}: {:.1}", result.candidate.label(), result.outcome.accuracy_score());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod evaluation;
pub mod judge;
pub mod providers;
pub mod reporting;
pub mod runner;

pub use config::Config;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::{Config, Credentials};
    pub use crate::evaluation::{CandidateAnswer, EvaluationRequest, InputError};
    pub use crate::judge::{Judge, JudgeOutcome, ScoreRecord, JUDGE_NAME, JUDGE_VERSION};
    pub use crate::providers::{
        CompletionRequest, CompletionResponse, DispatchError, Dispatcher, LLMProvider, Message,
        ProviderError, ProviderKind, ProviderResult,
    };
    pub use crate::reporting::{print_console_report, EvaluationRecord, ResultsFile};
    pub use crate::runner::{Deadline, EvaluationResult, Evaluator};
}
