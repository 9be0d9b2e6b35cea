//! Evaluation execution: deadlines and the dispatch-then-judge pipeline

pub mod deadline;
pub mod orchestrator;

pub use deadline::Deadline;
pub use orchestrator::{EvaluationResult, Evaluator};
