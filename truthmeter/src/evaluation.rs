//! Evaluation requests and candidate answers

use serde::{Deserialize, Serialize};

use crate::providers::{DispatchError, ProviderKind};

/// Literal model name that resolves to the provider's default
pub const AUTO_MODEL: &str = "auto";

/// Request validation failures. These are the only errors that fail an evaluation outright.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// A question to put to one provider and grade against a reference answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub question_text: String,
    pub reference_answer: String,
    pub provider: ProviderKind,
    /// Concrete model id, or "auto"
    pub model_name: String,
}

impl EvaluationRequest {
    /// Validate caller input; an empty model name means "auto"
    pub fn new(
        question_text: impl Into<String>,
        reference_answer: impl Into<String>,
        provider: &str,
        model_name: impl Into<String>,
    ) -> Result<Self, InputError> {
        let question_text = question_text.into();
        let reference_answer = reference_answer.into();

        if question_text.trim().is_empty() {
            return Err(InputError::MissingField("question_text"));
        }
        if reference_answer.trim().is_empty() {
            return Err(InputError::MissingField("reference_answer"));
        }

        let provider: ProviderKind = provider.parse()?;

        let model_name = model_name.into();
        let model_name = if model_name.trim().is_empty() {
            AUTO_MODEL.to_string()
        } else {
            model_name.trim().to_string()
        };

        Ok(Self {
            question_text,
            reference_answer,
            provider,
            model_name,
        })
    }
}

/// Text produced by a provider for a question.
///
/// When dispatch fails the text carries the error description, so the
/// judge can still explain the zero score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAnswer {
    pub text: String,
    pub provider: ProviderKind,
    /// Model actually called ("auto" already resolved)
    pub model_resolved: String,
    /// True when `text` is an error description rather than a provider answer
    #[serde(default)]
    pub dispatch_failed: bool,
}

impl CandidateAnswer {
    pub fn answered(provider: ProviderKind, model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            provider,
            model_resolved: model.into(),
            dispatch_failed: false,
        }
    }

    pub fn failed(provider: ProviderKind, model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            text: reason.into(),
            provider,
            model_resolved: model.into(),
            dispatch_failed: true,
        }
    }

    /// Fold a dispatch result into a candidate; a failure becomes its error text
    pub fn from_dispatch(
        provider: ProviderKind,
        model: String,
        result: Result<String, DispatchError>,
    ) -> Self {
        match result {
            Ok(text) => {
                tracing::info!("{}/{} answered with {} chars", provider, model, text.len());
                Self::answered(provider, model, text)
            }
            Err(e) => {
                tracing::warn!("{}/{} produced no answer: {}", provider, model, e);
                Self::failed(provider, model, e.to_string())
            }
        }
    }

    /// `provider/model` label used when persisting results
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model_resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_auto() {
        let request = EvaluationRequest::new("What is 2+2?", "4", "openai", "").unwrap();
        assert_eq!(request.provider, ProviderKind::OpenAI);
        assert_eq!(request.model_name, AUTO_MODEL);
    }

    #[test]
    fn test_unknown_provider_is_input_error() {
        let err = EvaluationRequest::new("q", "r", "mistral", "auto").unwrap_err();
        assert_eq!(err, InputError::UnknownProvider("mistral".to_string()));
    }

    #[test]
    fn test_blank_fields_rejected() {
        assert_eq!(
            EvaluationRequest::new("  ", "4", "openai", "auto").unwrap_err(),
            InputError::MissingField("question_text")
        );
        assert_eq!(
            EvaluationRequest::new("What is 2+2?", "", "openai", "auto").unwrap_err(),
            InputError::MissingField("reference_answer")
        );
    }

    #[test]
    fn test_from_dispatch() {
        let ok = CandidateAnswer::from_dispatch(ProviderKind::OpenAI, "gpt-4o".to_string(), Ok("4".to_string()));
        assert_eq!(ok, CandidateAnswer::answered(ProviderKind::OpenAI, "gpt-4o", "4"));

        let missing = DispatchError::MissingCredential {
            provider: ProviderKind::Google,
            env_var: "GOOGLE_API_KEY".to_string(),
        };
        let failed = CandidateAnswer::from_dispatch(ProviderKind::Google, "gemini-2.5-flash".to_string(), Err(missing));
        assert!(failed.dispatch_failed);
        assert_eq!(failed.text, "Error: GOOGLE_API_KEY not configured");
    }

    #[test]
    fn test_candidate_label() {
        let candidate = CandidateAnswer::answered(ProviderKind::Meta, "llama-3.1-70b-versatile", "4");
        assert_eq!(candidate.label(), "meta/llama-3.1-70b-versatile");
        assert!(!candidate.dispatch_failed);
    }
}
