use crate::document::{Document, LoaderKind};
use crate::extractor::TextExtractor;
use crate::loader::DocumentLoader;
use crate::security::ContentLimits;
use crate::SummarizeError;
use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Options for the plain HTTP loader.
///
/// # Examples
/// ```ignore
/// let loader = HttpLoader::new_with_config(FetcherConfig {
///     user_agent: "my-agent/1.0".to_string(),
///     timeout: Duration::from_secs(20),
///     ..FetcherConfig::default()
/// })?;
/// ```
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Skip TLS certificate verification (on by default so self-signed and
    /// misconfigured sites still load).
    pub accept_invalid_certs: bool,
    pub headers: Option<HeaderMap>,
    pub max_redirects: usize,
    pub limits: ContentLimits,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("page-summarizer/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(10),
            accept_invalid_certs: true,
            headers: None,
            max_redirects: 10,
            limits: ContentLimits::default(),
        }
    }
}

/// Fast loader: one GET request, HTML turned into text elements.
#[derive(Clone)]
pub struct HttpLoader {
    client: Client,
    limits: ContentLimits,
    extractor: TextExtractor,
}

impl HttpLoader {
    pub fn new() -> Result<Self, SummarizeError> {
        debug!("HttpLoader initialized with default configuration");
        Self::new_with_config(FetcherConfig::default())
    }

    pub fn new_with_config(config: FetcherConfig) -> Result<Self, SummarizeError> {
        let timeout = config
            .timeout
            .min(Duration::from_secs(config.limits.max_download_time));
        let mut client_builder = Client::builder()
            .user_agent(config.user_agent)
            .timeout(timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .pool_max_idle_per_host(10);

        if let Some(headers) = config.headers {
            client_builder = client_builder.default_headers(headers);
        }

        let client = client_builder.build().map_err(|e| {
            error!(error = %e, "Failed to create HTTP client");
            SummarizeError::InvalidConfiguration(format!("Failed to initialize HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            limits: config.limits,
            extractor: TextExtractor::default(),
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            limits: ContentLimits::default(),
            extractor: TextExtractor::default(),
        }
    }

    /// Fetch the raw body of `url`, enforcing status, content type and size limits.
    /// Returns the body together with its declared content type.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn fetch(&self, url: &str) -> Result<(String, String), SummarizeError> {
        debug!(url = %url, "Starting fetch request");

        let mut response = self.client.get(url).send().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to send request");
            SummarizeError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, url = %url, "Non-success response");
            return Err(SummarizeError::from_status(status.as_u16(), url));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        if !self.limits.is_content_type_allowed(&content_type) {
            return Err(SummarizeError::InvalidContentType(content_type));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.limits.max_content_size {
                return Err(SummarizeError::ContentTooLarge {
                    size: length as usize,
                    limit: self.limits.max_content_size,
                });
            }
        }

        // bodies without Content-Length are checked as they stream in
        let limit = self.limits.max_content_size;
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to read response body");
            SummarizeError::FetchError(e.to_string())
        })? {
            bytes.extend_from_slice(&chunk);
            if bytes.len() > limit {
                warn!(url = %url, read = bytes.len(), limit, "Response body over size limit");
                return Err(SummarizeError::ContentTooLarge {
                    size: bytes.len(),
                    limit,
                });
            }
        }
        let body = String::from_utf8_lossy(&bytes).into_owned();

        debug!(url = %url, content_length = body.len(), "Successfully fetched page");
        Ok((body, content_type))
    }
}

#[async_trait]
impl DocumentLoader for HttpLoader {
    fn kind(&self) -> LoaderKind {
        LoaderKind::Http
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn load(&self, url: &str) -> Result<Vec<Document>, SummarizeError> {
        let (body, content_type) = self.fetch(url).await?;

        let document = if content_type.to_ascii_lowercase().starts_with("text/plain") {
            Document::new(body.trim().to_string(), url, LoaderKind::Http)
        } else {
            let page = self.extractor.extract(&body);
            Document::new(page.text(), url, LoaderKind::Http).with_title(page.title)
        };

        if document.is_blank() {
            return Err(SummarizeError::EmptyContent(url.to_string()));
        }

        debug!(
            url = %url,
            chars = document.page_content.len(),
            "Loaded document over HTTP"
        );
        Ok(vec![document])
    }
}
