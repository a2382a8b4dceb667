#[cfg(feature = "browser")]
use crate::browser_fetcher::{BrowserLoader, DEFAULT_REMOVE_SELECTORS};
#[cfg(feature = "cache")]
use crate::cache::Cache;
use crate::chains::{ChainOptions, ChainType, SummarizeChain};
use crate::fetcher::{FetcherConfig, HttpLoader};
use crate::llm_config::LlmConfig;
use crate::llm_providers::ChatModel;
use crate::loader::FallbackLoader;
#[cfg(feature = "browser")]
use crate::mcp_client::McpConfig;
use crate::request::SummarizeRequest;
use crate::security::{UrlValidationConfig, UrlValidator};
use crate::splitter::RecursiveCharacterSplitter;
use crate::{CacheStrategy, SummarizeError, Summary};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};
use url::Url;

pub const MAX_CONCURRENT_REQUESTS: usize = 16;

/// Everything needed to build a [`SummarizerService`].
pub struct ServiceConfig {
    pub fetcher: FetcherConfig,
    /// Browser fallback; `None` turns it off.
    #[cfg(feature = "browser")]
    pub mcp_config: Option<McpConfig>,
    #[cfg(feature = "browser")]
    pub remove_selectors: Vec<String>,
    pub llm: LlmConfig,
    pub chain_options: ChainOptions,
    /// Split pages into chunks of this many characters before summarizing.
    pub chunk_size: Option<usize>,
    pub chunk_overlap: usize,
    pub url_validation: UrlValidationConfig,
    /// Most summaries kept in the cache; the oldest is evicted beyond this.
    pub cache_capacity: usize,
    pub cache_strategy: CacheStrategy,
    pub max_concurrent_requests: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            #[cfg(feature = "browser")]
            mcp_config: Some(McpConfig::default()),
            #[cfg(feature = "browser")]
            remove_selectors: DEFAULT_REMOVE_SELECTORS.iter().map(|s| s.to_string()).collect(),
            llm: LlmConfig::default(),
            chain_options: ChainOptions::default(),
            chunk_size: None,
            chunk_overlap: crate::splitter::DEFAULT_CHUNK_OVERLAP,
            url_validation: UrlValidationConfig::default(),
            cache_capacity: 100,
            cache_strategy: CacheStrategy::UseCache,
            max_concurrent_requests: MAX_CONCURRENT_REQUESTS,
        }
    }

    pub fn with_llm(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_fetcher(mut self, fetcher: FetcherConfig) -> Self {
        self.fetcher = fetcher;
        self
    }

    #[cfg(feature = "browser")]
    pub fn with_mcp_config(mut self, mcp_config: McpConfig) -> Self {
        self.mcp_config = Some(mcp_config);
        self
    }

    #[cfg_attr(not(feature = "browser"), allow(unused_mut))]
    pub fn without_browser(mut self) -> Self {
        #[cfg(feature = "browser")]
        {
            self.mcp_config = None;
        }
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_cache_strategy(mut self, cache_strategy: CacheStrategy) -> Self {
        self.cache_strategy = cache_strategy;
        self
    }
}

/// Validates requests, loads pages through the fallback loader and runs the
/// selected chain.
pub struct SummarizerService {
    loader: FallbackLoader,
    #[cfg(feature = "browser")]
    browser: Option<Arc<BrowserLoader>>,
    validator: UrlValidator,
    llm: LlmConfig,
    chain_options: ChainOptions,
    splitter: Option<RecursiveCharacterSplitter>,
    #[cfg(feature = "cache")]
    cache: Cache,
    #[cfg_attr(not(feature = "cache"), allow(dead_code))]
    cache_strategy: CacheStrategy,
    // Max Concurrent Requests
    semaphore: Arc<Semaphore>,
}

impl SummarizerService {
    pub fn new(config: ServiceConfig) -> Result<Self, SummarizeError> {
        let http = Arc::new(HttpLoader::new_with_config(config.fetcher.clone())?);
        let loader = FallbackLoader::new(http);

        #[cfg(feature = "browser")]
        let browser = match &config.mcp_config {
            Some(mcp_config) => Some(Arc::new(BrowserLoader::with_remove_selectors(
                mcp_config.clone(),
                &config.remove_selectors,
            )?)),
            None => None,
        };
        #[cfg(feature = "browser")]
        let loader = match &browser {
            Some(browser) => loader.with_fallback(browser.clone()),
            None => loader,
        };

        #[cfg_attr(not(feature = "browser"), allow(unused_mut))]
        let mut service = Self::with_loader(config, loader)?;
        #[cfg(feature = "browser")]
        {
            service.browser = browser;
        }
        Ok(service)
    }

    /// Build the service around a caller-supplied loader; the fetcher and
    /// browser settings in `config` are ignored.
    pub fn with_loader(config: ServiceConfig, loader: FallbackLoader) -> Result<Self, SummarizeError> {
        let splitter = config
            .chunk_size
            .map(|size| RecursiveCharacterSplitter::new(size, config.chunk_overlap.min(size / 2)))
            .transpose()?;

        debug!(
            fallback = loader.has_fallback(),
            chunk_size = ?config.chunk_size,
            cache_strategy = ?config.cache_strategy,
            "SummarizerService initialized"
        );

        Ok(Self {
            loader,
            #[cfg(feature = "browser")]
            browser: None,
            validator: UrlValidator::new(config.url_validation),
            llm: config.llm,
            chain_options: config.chain_options,
            splitter,
            #[cfg(feature = "cache")]
            cache: Cache::new(config.cache_capacity),
            cache_strategy: config.cache_strategy,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
        })
    }

    pub fn has_browser_fallback(&self) -> bool {
        self.loader.has_fallback()
    }

    /// Validate the request, build a Groq model for its key and summarize.
    #[instrument(level = "debug", skip(self, request), fields(method = %request.method))]
    pub async fn summarize(&self, request: &SummarizeRequest) -> Result<Summary, SummarizeError> {
        let validated = request.validate_with(&self.validator).inspect_err(|e| e.log())?;
        let model = self
            .llm
            .groq_provider(&validated.api_key)
            .inspect_err(|e| e.log())?;

        self.run(validated.url, validated.method, Arc::new(model)).await
    }

    /// Summarize `url` with an already-built model.
    #[instrument(level = "debug", skip(self, model), fields(model = model.model()))]
    pub async fn summarize_with_model(
        &self,
        url: &str,
        method: ChainType,
        model: Arc<dyn ChatModel>,
    ) -> Result<Summary, SummarizeError> {
        let url = self.validator.validate(url).inspect_err(|e| e.log())?;
        self.run(url, method, model).await
    }

    async fn run(
        &self,
        url: Url,
        method: ChainType,
        model: Arc<dyn ChatModel>,
    ) -> Result<Summary, SummarizeError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| SummarizeError::ConcurrencyLimitError)?;

        #[cfg(feature = "cache")]
        let cache_key = Cache::key(method, model.model(), url.as_str());

        #[cfg(feature = "cache")]
        if let CacheStrategy::UseCache = self.cache_strategy {
            if let Some(cached) = self.cache.get(&cache_key).await {
                debug!(url = %url, "Returning cached summary");
                return Ok(cached);
            }
        }

        let summary = self
            .summarize_page(&url, method, model)
            .await
            .inspect_err(|e| e.log())?;

        #[cfg(feature = "cache")]
        if self.cache_strategy != CacheStrategy::NoCache {
            self.cache.set(cache_key, summary.clone()).await;
        }

        Ok(summary)
    }

    async fn summarize_page(
        &self,
        url: &Url,
        method: ChainType,
        model: Arc<dyn ChatModel>,
    ) -> Result<Summary, SummarizeError> {
        let started = Instant::now();

        let documents = self.loader.load(url.as_str()).await?;
        let first = documents
            .first()
            .filter(|doc| !doc.is_blank())
            .ok_or_else(|| SummarizeError::EmptyContent(url.to_string()))?;
        let loader = first.metadata.loader;
        let title = first.metadata.title.clone();

        let documents = match &self.splitter {
            Some(splitter) => splitter.split_documents(&documents),
            None => documents,
        };
        debug!(documents = documents.len(), loader = %loader, "Page loaded");

        let model_name = model.model().to_string();
        let chain = SummarizeChain::with_options(model, method, self.chain_options.clone());
        let output = chain.run(&documents).await?;

        let summary = Summary {
            url: url.to_string(),
            title,
            method,
            model: model_name,
            loader,
            summary: output.summary,
            documents: documents.len(),
            llm_calls: output.llm_calls,
            usage: output.usage,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            url = %summary.url,
            method = %summary.method,
            loader = %summary.loader,
            llm_calls = summary.llm_calls,
            elapsed_ms = summary.elapsed_ms,
            "Summary generated"
        );
        Ok(summary)
    }

    /// Stop the browser, if one was started.
    pub async fn shutdown(&self) -> Result<(), SummarizeError> {
        #[cfg(feature = "browser")]
        if let Some(browser) = &self.browser {
            browser.shutdown().await?;
        }
        Ok(())
    }
}
