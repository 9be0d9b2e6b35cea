//! Provider dispatch
//!
//! [`ProviderKind`] is the closed set of supported providers. [`Provider`]
//! wraps one configured client per kind, and [`Dispatcher`] hides every
//! transport behind a single `(provider, model, prompt) -> text` call.

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use google::GoogleClient;
pub use openai::OpenAIClient;
pub use traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Credentials, ProviderSettings};
use crate::evaluation::{CandidateAnswer, InputError, AUTO_MODEL};
use crate::runner::Deadline;

/// Supported answer providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAI,
    Google,
    Anthropic,
    /// Llama models served through Groq
    Meta,
    #[serde(rename = "deepseek")]
    DeepSeek,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::OpenAI,
        ProviderKind::Google,
        ProviderKind::Anthropic,
        ProviderKind::Meta,
        ProviderKind::DeepSeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Google => "google",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Meta => "meta",
            ProviderKind::DeepSeek => "deepseek",
        }
    }

    /// Model used for "auto"
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "gpt-4o",
            ProviderKind::Google => "gemini-2.5-flash",
            ProviderKind::Anthropic => "claude-sonnet-4-5",
            ProviderKind::Meta => "llama-3.1-70b-versatile",
            ProviderKind::DeepSeek => "deepseek-chat",
        }
    }

    /// Environment variable holding the API key
    pub fn credential_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OPENAI_API_KEY",
            ProviderKind::Google => "GOOGLE_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Meta => "GROQ_API_KEY",
            ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => openai::OPENAI_BASE_URL,
            ProviderKind::Google => google::GOOGLE_BASE_URL,
            ProviderKind::Anthropic => anthropic::ANTHROPIC_BASE_URL,
            ProviderKind::Meta => openai::GROQ_BASE_URL,
            ProviderKind::DeepSeek => openai::DEEPSEEK_BASE_URL,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "gpt" => Ok(ProviderKind::OpenAI),
            "google" | "gemini" => Ok(ProviderKind::Google),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "meta" | "llama" | "groq" => Ok(ProviderKind::Meta),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            _ => Err(InputError::UnknownProvider(s.to_string())),
        }
    }
}

/// One configured client per provider kind
pub enum Provider {
    OpenAI(OpenAIClient),
    Google(GoogleClient),
    Anthropic(AnthropicClient),
    Meta(OpenAIClient),
    DeepSeek(OpenAIClient),
}

impl Provider {
    /// Build the client for `kind` against the configured endpoint
    pub fn build(kind: ProviderKind, api_key: String, settings: &ProviderSettings) -> Self {
        match kind {
            ProviderKind::OpenAI => Provider::OpenAI(
                OpenAIClient::new(api_key)
                    .with_base_url(&settings.base_url)
                    .with_model(&settings.default_model),
            ),
            ProviderKind::Google => Provider::Google(
                GoogleClient::new(api_key)
                    .with_base_url(&settings.base_url)
                    .with_model(&settings.default_model),
            ),
            ProviderKind::Anthropic => Provider::Anthropic(
                AnthropicClient::new(api_key)
                    .with_base_url(&settings.base_url)
                    .with_model(&settings.default_model),
            ),
            ProviderKind::Meta => Provider::Meta(
                OpenAIClient::compatible("meta", api_key, &settings.base_url)
                    .with_model(&settings.default_model),
            ),
            ProviderKind::DeepSeek => Provider::DeepSeek(
                OpenAIClient::compatible("deepseek", api_key, &settings.base_url)
                    .with_model(&settings.default_model),
            ),
        }
    }

    /// Get the provider as a trait object
    pub fn as_provider(&self) -> &dyn LLMProvider {
        match self {
            Provider::OpenAI(c) => c,
            Provider::Google(c) => c,
            Provider::Anthropic(c) => c,
            Provider::Meta(c) => c,
            Provider::DeepSeek(c) => c,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::OpenAI(_) => ProviderKind::OpenAI,
            Provider::Google(_) => ProviderKind::Google,
            Provider::Anthropic(_) => ProviderKind::Anthropic,
            Provider::Meta(_) => ProviderKind::Meta,
            Provider::DeepSeek(_) => ProviderKind::DeepSeek,
        }
    }
}

/// Why a dispatch produced no answer
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The provider's key variable was not set
    #[error("Error: {}{} not configured", .env_var, credential_note(.provider))]
    MissingCredential {
        provider: ProviderKind,
        env_var: String,
    },

    /// The remote call failed, timed out or was cancelled
    #[error("Error calling {model}: {source}")]
    Transport {
        model: String,
        #[source]
        source: ProviderError,
    },
}

fn credential_note(provider: &ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Meta => " (for Meta)",
        _ => "",
    }
}

/// Routes a prompt to the selected provider and normalizes the answer to text
pub struct Dispatcher {
    providers: HashMap<ProviderKind, Arc<dyn LLMProvider>>,
    settings: HashMap<ProviderKind, ProviderSettings>,
    deadline: Deadline,
}

impl Dispatcher {
    /// Build clients for every provider with a resolved key
    pub fn new(config: &Config, credentials: &Credentials) -> Self {
        let mut providers: HashMap<ProviderKind, Arc<dyn LLMProvider>> = HashMap::new();
        let mut settings = HashMap::new();

        for kind in ProviderKind::ALL {
            let provider_settings = config.provider(kind);
            if let Some(key) = credentials.get(&provider_settings.api_key_env) {
                let provider = Provider::build(kind, key.to_string(), &provider_settings);
                providers.insert(kind, Arc::new(provider));
            }
            settings.insert(kind, provider_settings);
        }

        tracing::debug!(
            "Dispatcher ready with providers: {:?}",
            providers.keys().map(|k| k.as_str()).collect::<Vec<_>>()
        );

        Self {
            providers,
            settings,
            deadline: Deadline::new(config.runner.timeout_ms),
        }
    }

    /// Replace the client for `kind`, e.g. with a test double
    pub fn with_provider(mut self, kind: ProviderKind, provider: Arc<dyn LLMProvider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    /// Share a cancellation token with the caller
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.deadline = self.deadline.with_cancellation(token);
        self
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    fn settings(&self, kind: ProviderKind) -> ProviderSettings {
        self.settings
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| ProviderSettings::builtin(kind))
    }

    /// Resolve "auto" (or an empty name) to the provider's default model
    pub fn resolve_model(&self, kind: ProviderKind, model_name: &str) -> String {
        let model_name = model_name.trim();
        if model_name.is_empty() || model_name.eq_ignore_ascii_case(AUTO_MODEL) {
            self.settings(kind).default_model
        } else {
            model_name.to_string()
        }
    }

    /// Call the provider, returning the answer text or the reason there is none
    pub async fn try_dispatch(
        &self,
        kind: ProviderKind,
        model: &str,
        prompt: &str,
    ) -> Result<String, DispatchError> {
        let provider = self.providers.get(&kind).ok_or_else(|| DispatchError::MissingCredential {
            provider: kind,
            env_var: self.settings(kind).api_key_env,
        })?;

        self.deadline
            .run(provider.generate(model, prompt))
            .await
            .map_err(|source| DispatchError::Transport {
                model: model.to_string(),
                source,
            })
    }

    /// Dispatch and fold any failure into the candidate text; never fails
    pub async fn dispatch(&self, kind: ProviderKind, model_name: &str, prompt: &str) -> CandidateAnswer {
        let model = self.resolve_model(kind, model_name);
        let result = self.try_dispatch(kind, &model, prompt).await;
        CandidateAnswer::from_dispatch(kind, model, result)
    }
}

#[async_trait::async_trait]
impl LLMProvider for Provider {
    fn name(&self) -> &str {
        self.as_provider().name()
    }

    fn default_model(&self) -> &str {
        self.as_provider().default_model()
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        self.as_provider().complete(request).await
    }
}
