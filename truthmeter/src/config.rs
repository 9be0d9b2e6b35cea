//! Configuration management for the evaluation pipeline
//!
//! Provider endpoints, default models, judge settings and runner limits
//! load from a TOML file. API keys never live in the file: each provider
//! names the environment variable holding its key, and [`Credentials`]
//! reads those variables once at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::providers::openai::OPENAI_BASE_URL;
use crate::providers::ProviderKind;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Overrides keyed by provider id (`openai`, `google`, ...)
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
    #[serde(default)]
    pub judge: JudgeSettings,
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Provider-specific settings. Empty fields fall back to the provider's built-in values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Model used when a request asks for "auto"
    #[serde(default)]
    pub default_model: String,
    #[serde(default)]
    pub base_url: String,
    /// Name of the environment variable holding the API key
    #[serde(default)]
    pub api_key_env: String,
}

/// Scoring engine settings for the judge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeSettings {
    #[serde(default = "default_engine_model")]
    pub engine_model: String,
    #[serde(default = "default_judge_temperature")]
    pub temperature: f32,
    /// Output cap for the engine's reply
    #[serde(default = "default_judge_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_engine_base_url")]
    pub base_url: String,
    #[serde(default = "default_engine_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Evaluation runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Evaluations allowed in flight at once for batch runs
    #[serde(default = "default_parallel_requests")]
    pub parallel_requests: usize,
    /// Deadline for each provider call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

// Default value functions
fn default_engine_model() -> String { "gpt-4o".to_string() }
fn default_judge_temperature() -> f32 { 0.3 }
fn default_judge_max_tokens() -> u32 { 1024 }
fn default_engine_base_url() -> String { OPENAI_BASE_URL.to_string() }
fn default_engine_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_timeout_ms() -> u64 { 120_000 }
fn default_parallel_requests() -> usize { 3 }

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            engine_model: default_engine_model(),
            temperature: default_judge_temperature(),
            max_tokens: default_judge_max_tokens(),
            base_url: default_engine_base_url(),
            api_key_env: default_engine_key_env(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            parallel_requests: default_parallel_requests(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.canonicalize_providers()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = [
            "config/truthmeter.toml",
            "../config/truthmeter.toml",
            "truthmeter/config/truthmeter.toml",
        ];

        for path in &config_paths {
            match Self::from_file(path) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", path);
                    return config;
                }
                Err(ConfigError::Io(_)) => continue,
                Err(e) => tracing::warn!("Ignoring {}: {}", path, e),
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Config with every provider written out, for `init-config`
    pub fn sample() -> Self {
        let providers = ProviderKind::ALL
            .iter()
            .map(|&kind| (kind.as_str().to_string(), ProviderSettings::builtin(kind)))
            .collect();

        Self {
            providers,
            ..Self::default()
        }
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
            }
        }
        fs::write(path, content)
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Effective settings for a provider: file overrides on top of built-ins
    pub fn provider(&self, kind: ProviderKind) -> ProviderSettings {
        let builtin = ProviderSettings::builtin(kind);
        let mut settings = self
            .providers
            .get(kind.as_str())
            .cloned()
            .unwrap_or_default();

        if settings.default_model.is_empty() {
            settings.default_model = builtin.default_model;
        }
        if settings.base_url.is_empty() {
            settings.base_url = builtin.base_url;
        }
        if settings.api_key_env.is_empty() {
            settings.api_key_env = builtin.api_key_env;
        }
        settings
    }

    /// Re-key provider sections by canonical id, so `[providers.gpt]` configures openai
    fn canonicalize_providers(&mut self) -> Result<(), ConfigError> {
        let mut canonical: HashMap<String, ProviderSettings> = HashMap::new();
        let mut seen: HashMap<ProviderKind, String> = HashMap::new();

        for (name, settings) in std::mem::take(&mut self.providers) {
            let kind: ProviderKind = name
                .parse()
                .map_err(|_| ConfigError::Parse(format!("unknown provider section [providers.{}]", name)))?;
            if let Some(previous) = seen.insert(kind, name.clone()) {
                return Err(ConfigError::Parse(format!(
                    "[providers.{}] and [providers.{}] both configure {}",
                    previous, name, kind
                )));
            }
            canonical.insert(kind.as_str().to_string(), settings);
        }

        self.providers = canonical;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runner.parallel_requests == 0 {
            return Err(ConfigError::Parse("runner.parallel_requests must be at least 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.judge.temperature) {
            return Err(ConfigError::Parse(format!(
                "judge.temperature must be within [0, 2], got {}",
                self.judge.temperature
            )));
        }
        Ok(())
    }
}

impl ProviderSettings {
    /// Built-in endpoint, default model and key variable for a provider
    pub fn builtin(kind: ProviderKind) -> Self {
        Self {
            default_model: kind.default_model().to_string(),
            base_url: kind.default_base_url().to_string(),
            api_key_env: kind.credential_env().to_string(),
        }
    }
}

/// API keys resolved once from the environment.
///
/// Immutable after construction; hand it by reference to the dispatcher
/// and the judge. A missing key is not an error here, it surfaces later as
/// a "not configured" result for that provider.
#[derive(Clone, Default)]
pub struct Credentials {
    keys: HashMap<String, String>,
}

impl Credentials {
    /// Read every key variable the config refers to
    pub fn from_env(config: &Config) -> Self {
        let mut names: Vec<String> = ProviderKind::ALL
            .iter()
            .map(|&kind| config.provider(kind).api_key_env)
            .collect();
        names.push(config.judge.api_key_env.clone());

        let mut credentials = Self::default();
        for name in names {
            if let Ok(value) = std::env::var(&name) {
                credentials = credentials.with(name, value);
            }
        }

        tracing::debug!("Resolved credentials for: {:?}", credentials.configured());
        credentials
    }

    /// Add a key; blank values are treated as absent
    pub fn with(mut self, env_var: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.trim().is_empty() {
            self.keys.insert(env_var.into(), key);
        }
        self
    }

    pub fn get(&self, env_var: &str) -> Option<&str> {
        self.keys.get(env_var).map(String::as_str)
    }

    pub fn contains(&self, env_var: &str) -> bool {
        self.keys.contains_key(env_var)
    }

    /// Names of the variables that resolved, sorted
    pub fn configured(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("configured", &self.configured())
            .finish()
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
