//! Dispatch-then-judge evaluation pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Credentials, RunnerConfig};
use crate::evaluation::{CandidateAnswer, EvaluationRequest, InputError};
use crate::judge::{Judge, JudgeOutcome};
use crate::providers::Dispatcher;
use crate::reporting::EvaluationRecord;

/// Candidate answer plus its judgement for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub question_text: String,
    pub candidate: CandidateAnswer,
    pub outcome: JudgeOutcome,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn judged_by(&self) -> &str {
        self.outcome.judged_by()
    }

    pub fn model_version(&self) -> &str {
        self.outcome.model_version()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }

    /// Flatten into the persisted row shape
    pub fn to_record(&self, question_id: Option<u64>) -> EvaluationRecord {
        let scores = self.outcome.clone().into_score_record();
        EvaluationRecord {
            question_id,
            model_label: self.candidate.label(),
            response_text: self.candidate.text.clone(),
            accuracy_score: scores.accuracy_score,
            clarity_score: scores.clarity_score,
            completeness_score: scores.completeness_score,
            reasoning: scores.reasoning,
            judged_by: scores.judged_by,
            model_version: scores.model_version,
            judge_failed: self.outcome.is_failure(),
            timestamp: self.completed_at,
        }
    }
}

/// Composes the dispatcher and the judge.
///
/// Clones share the same clients and cancellation token.
#[derive(Clone)]
pub struct Evaluator {
    dispatcher: Arc<Dispatcher>,
    judge: Arc<Judge>,
    config: RunnerConfig,
    cancel: CancellationToken,
}

impl Evaluator {
    pub fn new(config: &Config, credentials: &Credentials) -> Self {
        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(config, credentials).with_cancellation(cancel.clone());
        let judge = Judge::new(&config.judge, credentials).with_cancellation(cancel.clone());

        Self {
            dispatcher: Arc::new(dispatcher),
            judge: Arc::new(judge),
            config: config.runner.clone(),
            cancel,
        }
    }

    /// Assemble from prebuilt parts. Cancellation only reaches parts built with `cancellation_token()`.
    pub fn from_parts(dispatcher: Dispatcher, judge: Judge, config: RunnerConfig, cancel: CancellationToken) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            judge: Arc::new(judge),
            config,
            cancel,
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Abort every in-flight and future call made through this evaluator
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn judge(&self) -> &Judge {
        &self.judge
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Validate caller input, then run the full pipeline.
    ///
    /// Only invalid input fails; provider and judge problems come back as zero-score outcomes.
    pub async fn evaluate(
        &self,
        question_text: &str,
        reference_answer: &str,
        provider: &str,
        model_name: &str,
    ) -> Result<EvaluationResult, InputError> {
        let request = EvaluationRequest::new(question_text, reference_answer, provider, model_name)?;
        Ok(self.evaluate_request(&request).await)
    }

    /// Dispatch, then always judge, even when dispatch failed
    pub async fn evaluate_request(&self, request: &EvaluationRequest) -> EvaluationResult {
        let started_at = Utc::now();
        let model = self.dispatcher.resolve_model(request.provider, &request.model_name);

        let result = self
            .dispatcher
            .try_dispatch(request.provider, &model, &request.question_text)
            .await;
        // A failed dispatch is still judged, so the zero score carries its reason
        let candidate = CandidateAnswer::from_dispatch(request.provider, model, result);

        let outcome = self
            .judge
            .judge(&request.question_text, &request.reference_answer, &candidate.text)
            .await;

        tracing::info!(
            "Evaluated {}: accuracy {:.1}, clarity {:.1}, completeness {:.1}",
            candidate.label(),
            outcome.accuracy_score(),
            outcome.clarity_score(),
            outcome.completeness_score()
        );

        EvaluationResult {
            question_text: request.question_text.clone(),
            candidate,
            outcome,
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Evaluate independent requests concurrently; results keep input order
    pub async fn evaluate_batch(&self, requests: Vec<EvaluationRequest>) -> Vec<EvaluationResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.parallel_requests.max(1)));
        let total = requests.len();

        let handles: Vec<_> = requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                let evaluator = self.clone();
                let semaphore = semaphore.clone();
                let fallback = request.clone();
                let handle = tokio::spawn(async move {
                    // The semaphore is never closed
                    let _permit = semaphore.acquire_owned().await.ok();
                    tracing::debug!("Evaluating request {}/{}", index + 1, total);
                    evaluator.evaluate_request(&request).await
                });
                (handle, fallback)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (handle, request) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!("Evaluation task aborted: {}", e);
                    results.push(aborted(&request, e.to_string()));
                }
            }
        }
        results
    }
}

fn aborted(request: &EvaluationRequest, reason: String) -> EvaluationResult {
    let now = Utc::now();
    EvaluationResult {
        question_text: request.question_text.clone(),
        candidate: CandidateAnswer::failed(request.provider, request.model_name.clone(), reason.clone()),
        outcome: JudgeOutcome::failure(format!("Evaluation failed: {}", reason)),
        started_at: now,
        completed_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::tests::ScriptedEngine;
    use crate::judge::JUDGE_NAME;
    use crate::providers::ProviderKind;

    fn offline() -> Evaluator {
        Evaluator::new(&Config::default(), &Credentials::default())
    }

    fn with_judge_reply(reply: &str) -> (Evaluator, Arc<ScriptedEngine>) {
        let engine = ScriptedEngine::replying(reply);
        let config = Config::default();
        let cancel = CancellationToken::new();
        let evaluator = Evaluator::from_parts(
            Dispatcher::new(&config, &Credentials::default()).with_cancellation(cancel.clone()),
            Judge::new(&config.judge, &Credentials::default()).with_engine(engine.clone()),
            config.runner.clone(),
            cancel,
        );
        (evaluator, engine)
    }

    #[tokio::test]
    async fn test_no_credentials_still_returns_a_record() {
        let result = offline().evaluate("What is 2+2?", "4", "openai", "auto").await.unwrap();

        assert!(result.candidate.dispatch_failed);
        assert!(result.candidate.text.contains("OPENAI_API_KEY"));
        assert_eq!(result.candidate.model_resolved, "gpt-4o");
        assert!(result.outcome.is_failure());
        assert_eq!(result.outcome.accuracy_score(), 0.0);
        assert_eq!(result.outcome.clarity_score(), 0.0);
        assert_eq!(result.outcome.completeness_score(), 0.0);
        assert!(result.outcome.reasoning().contains("OPENAI_API_KEY"));
        assert_eq!(result.judged_by(), JUDGE_NAME);
    }

    #[tokio::test]
    async fn test_input_errors_fail_the_call() {
        let evaluator = offline();
        assert_eq!(
            evaluator.evaluate("q", "r", "mistral", "auto").await.unwrap_err(),
            InputError::UnknownProvider("mistral".to_string())
        );
        assert!(evaluator.evaluate("", "r", "openai", "auto").await.is_err());
    }

    #[tokio::test]
    async fn test_dispatch_error_is_handed_to_the_judge() {
        let (evaluator, engine) = with_judge_reply(
            r#"{"accuracy_score":0,"clarity_score":0,"completeness_score":0,"reasoning":"Drawbacks: no answer was given"}"#,
        );
        let result = evaluator.evaluate("What is 2+2?", "4", "meta", "auto").await.unwrap();

        assert!(!result.outcome.is_failure());
        let requests = engine.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].messages[0]
            .content
            .contains("Error: GROQ_API_KEY (for Meta) not configured"));
    }

    #[tokio::test]
    async fn test_answer_from_provider_is_judged() {
        let answerer = ScriptedEngine::replying("Four.");
        let judge_engine = ScriptedEngine::replying(
            r#"{"accuracy_score":0,"clarity_score":0,"completeness_score":0,"reasoning":"Drawbacks: spelled out"}"#,
        );
        let config = Config::default();
        let evaluator = Evaluator::from_parts(
            Dispatcher::new(&config, &Credentials::default())
                .with_provider(ProviderKind::OpenAI, answerer.clone()),
            Judge::new(&config.judge, &Credentials::default()).with_engine(judge_engine.clone()),
            config.runner.clone(),
            CancellationToken::new(),
        );

        let result = evaluator.evaluate("What is 2+2?", "4", "openai", "auto").await.unwrap();
        assert!(!result.candidate.dispatch_failed);
        assert_eq!(result.candidate.text, "Four.");
        assert_eq!(answerer.requests.lock().unwrap()[0].model.as_deref(), Some("gpt-4o"));
        assert!(judge_engine.requests.lock().unwrap()[0].messages[0].content.contains("Four."));

        // A real 0/0/0 verdict is a score, not a judge failure
        let record = result.to_record(None);
        assert_eq!(record.accuracy_score, 0.0);
        assert!(!record.judge_failed);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let evaluator = offline();
        let requests: Vec<_> = ProviderKind::ALL
            .iter()
            .map(|kind| EvaluationRequest::new("What is 2+2?", "4", kind.as_str(), "auto").unwrap())
            .collect();

        let results = evaluator.evaluate_batch(requests).await;
        assert_eq!(results.len(), ProviderKind::ALL.len());
        for (result, kind) in results.iter().zip(ProviderKind::ALL) {
            assert_eq!(result.candidate.provider, kind);
            assert!(result.candidate.text.contains(kind.credential_env()));
        }
    }

    #[tokio::test]
    async fn test_to_record() {
        let result = offline().evaluate("What is 2+2?", "4", "deepseek", "auto").await.unwrap();
        let record = result.to_record(Some(42));

        assert_eq!(record.question_id, Some(42));
        assert_eq!(record.model_label, "deepseek/deepseek-chat");
        assert_eq!(record.response_text, "Error: DEEPSEEK_API_KEY not configured");
        assert_eq!(record.accuracy_score, 0.0);
        assert!(record.judge_failed);
        assert_eq!(record.judged_by, JUDGE_NAME);
        assert!(result.duration_ms() >= 0);
    }
}
