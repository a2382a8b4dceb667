//! Chat model providers
//!
//! `GroqProvider` talks to Groq's OpenAI-compatible endpoint; `MockProvider`
//! answers from a script and records every prompt it receives.

use crate::SummarizeError;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, instrument};

pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";

/// Token usage information
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// One model reply.
#[derive(Clone, Debug)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Trait for chat model providers
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Get the name of the provider
    fn name(&self) -> &str;

    /// Model identifier sent to the provider
    fn model(&self) -> &str;

    /// Send `prompt` as a single user message and return the reply
    async fn complete(&self, prompt: String) -> Result<Completion, SummarizeError>;

    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// Groq provider implementation
pub struct GroqProvider {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: Option<u16>,
}

impl GroqProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_api_base(api_key, GROQ_API_BASE.to_string())
    }

    /// Point at another OpenAI-compatible endpoint (proxies, local gateways)
    pub fn with_api_base(api_key: String, api_base: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self {
            client: Client::with_config(config),
            model: DEFAULT_GROQ_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u16) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

fn groq_error(e: impl std::fmt::Display) -> SummarizeError {
    SummarizeError::ExternalServiceError {
        service: "Groq".to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl ChatModel for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(level = "debug", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn complete(&self, prompt: String) -> Result<Completion, SummarizeError> {
        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(groq_error)?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.model)
            .messages(vec![ChatCompletionRequestMessage::User(user_message)])
            .temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            request.max_tokens(max_tokens);
        }
        let request = request.build().map_err(groq_error)?;

        let response = self.client.chat().create(request).await.map_err(groq_error)?;

        let usage = response.usage.as_ref().map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| groq_error("No content in response"))?;

        debug!(reply_len = text.len(), ?usage, "Received completion");
        Ok(Completion {
            text: text.trim().to_string(),
            usage,
        })
    }
}

/// Mock chat model for testing
///
/// Scripted replies are returned in order; once they run out the model
/// answers `"summary of: <first 40 chars of the prompt's payload>"`.
pub struct MockProvider {
    name: String,
    model: String,
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            model: "mock-model".to_string(),
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    fn push(&self, reply: Result<String, String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Every prompt received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: String) -> Result<Completion, SummarizeError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        let scripted = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        let text = match scripted {
            Some(Ok(reply)) => reply,
            Some(Err(message)) => {
                return Err(SummarizeError::ExternalServiceError {
                    service: "mock".to_string(),
                    message,
                })
            }
            None => {
                let payload = prompt
                    .split('"')
                    .nth(1)
                    .unwrap_or(prompt.as_str())
                    .chars()
                    .take(40)
                    .collect::<String>();
                format!("summary of: {payload}")
            }
        };

        let prompt_tokens = estimate_tokens(&prompt) as u32;
        let completion_tokens = estimate_tokens(&text) as u32;
        Ok(Completion {
            text,
            usage: Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }
}
