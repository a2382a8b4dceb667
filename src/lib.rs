//! Load a web page and summarize it with a hosted LLM.
//!
//! Pages are loaded with a plain HTTP client first and, when that yields
//! nothing, rendered in a headless browser over MCP. The text is then fed to
//! one of three summarization chains (`stuff`, `map_reduce`, `refine`).

#[cfg(feature = "browser")]
mod browser_fetcher;
mod cache;
mod chains;
mod document;
mod error;
mod extractor;
mod fetcher;
mod llm_config;
mod llm_providers;
mod loader;
mod logging;
#[cfg(feature = "browser")]
mod mcp_client;
mod request;
mod security;
mod summarizer_service;
mod splitter;
mod utils;

#[cfg(feature = "browser")]
pub use browser_fetcher::{BrowserLoader, DEFAULT_REMOVE_SELECTORS};
#[cfg(feature = "cache")]
pub use cache::Cache;
pub use chains::{
    ChainOptions, ChainOutput, ChainType, SummarizeChain, CONCISE_SUMMARY_PROMPT, REFINE_PROMPT,
};
pub use document::{Document, DocumentMetadata, LoaderKind};
pub use error::SummarizeError;
pub use extractor::{ElementKind, ExtractedPage, TextElement, TextExtractor};
pub use fetcher::{FetcherConfig, HttpLoader};
pub use llm_config::{ApiKeyValidator, LlmConfig, GROQ_API_KEY_ENV};
pub use llm_providers::{
    estimate_tokens, ChatModel, Completion, GroqProvider, MockProvider, TokenUsage,
    DEFAULT_GROQ_MODEL, GROQ_API_BASE,
};
pub use loader::{DocumentLoader, FallbackLoader};
pub use logging::{log_error_card, log_summary_card, setup_logging, LogConfig, LogLevelGuard};
#[cfg(feature = "browser")]
pub use mcp_client::{McpClient, McpConfig};
pub use request::{SummarizeRequest, ValidatedRequest};
pub use security::{ContentLimits, UrlValidationConfig, UrlValidator};
pub use summarizer_service::{ServiceConfig, SummarizerService, MAX_CONCURRENT_REQUESTS};
pub use splitter::RecursiveCharacterSplitter;

use serde::{Deserialize, Serialize};

/// The result of summarizing one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub url: String,
    pub title: Option<String>,
    pub method: ChainType,
    pub model: String,
    /// Loader that produced the page text.
    pub loader: LoaderKind,
    pub summary: String,
    /// Documents handed to the chain (more than one when chunking is on).
    pub documents: usize,
    pub llm_calls: usize,
    pub usage: Option<TokenUsage>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// Return a cached summary when there is one, store new ones.
    #[default]
    UseCache,
    /// Neither read nor write the cache.
    NoCache,
    /// Always summarize again and overwrite the cached entry.
    ForceUpdate,
}
