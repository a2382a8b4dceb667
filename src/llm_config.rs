//! LLM configuration and validation utilities

use crate::llm_providers::{GroqProvider, DEFAULT_GROQ_MODEL, GROQ_API_BASE};
use crate::SummarizeError;
use tracing::warn;

pub const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";
pub const GROQ_MODEL_ENV: &str = "GROQ_MODEL";
pub const GROQ_API_BASE_ENV: &str = "GROQ_API_BASE";

/// API key validation utilities
pub struct ApiKeyValidator;

impl ApiKeyValidator {
    /// Validate a Groq API key.
    ///
    /// Only emptiness is an error; keys without the usual `gsk_` prefix are
    /// accepted with a warning so proxies and gateways keep working.
    pub fn validate_groq_key(api_key: &str) -> Result<(), SummarizeError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(SummarizeError::MissingApiKey);
        }

        if !api_key.starts_with("gsk_") {
            warn!("Groq API key does not start with 'gsk_'");
        }

        Ok(())
    }

    /// Validate a model name
    pub fn validate_model_name(model: &str) -> Result<(), SummarizeError> {
        if model.trim().is_empty() {
            return Err(SummarizeError::InvalidConfiguration(
                "model name cannot be empty".to_string(),
            ));
        }
        if model.chars().any(char::is_whitespace) {
            return Err(SummarizeError::InvalidConfiguration(format!(
                "model name '{model}' contains whitespace"
            )));
        }
        Ok(())
    }
}

/// Settings used to build a chat model
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub max_tokens: Option<u16>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_GROQ_MODEL.to_string(),
            api_base: GROQ_API_BASE.to_string(),
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

impl LlmConfig {
    /// Defaults overridden by `GROQ_MODEL` and `GROQ_API_BASE`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model: std::env::var(GROQ_MODEL_ENV).unwrap_or(defaults.model),
            api_base: std::env::var(GROQ_API_BASE_ENV).unwrap_or(defaults.api_base),
            ..defaults
        }
    }

    /// Build a Groq provider for `api_key`
    pub fn groq_provider(&self, api_key: &str) -> Result<GroqProvider, SummarizeError> {
        ApiKeyValidator::validate_groq_key(api_key)?;
        ApiKeyValidator::validate_model_name(&self.model)?;

        let mut provider =
            GroqProvider::with_api_base(api_key.trim().to_string(), self.api_base.clone())
                .with_model(self.model.clone())
                .with_temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            provider = provider.with_max_tokens(max_tokens);
        }
        Ok(provider)
    }

    /// Create a Groq provider from `GROQ_API_KEY` and the other environment variables
    pub fn groq_from_env() -> Result<GroqProvider, SummarizeError> {
        let api_key = std::env::var(GROQ_API_KEY_ENV).map_err(|_| SummarizeError::MissingApiKey)?;
        Self::from_env().groq_provider(&api_key)
    }
}
