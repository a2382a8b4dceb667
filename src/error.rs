use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("Please enter your Groq API Key")]
    MissingApiKey,

    #[error("Please enter a URL to summarize")]
    MissingUrl,

    #[error("Please enter a valid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("URL scheme not allowed: {0}")]
    InvalidUrlScheme(String),

    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    #[error("Domain blocked: {0}")]
    DomainBlocked(String),

    #[error("Localhost URLs are blocked")]
    LocalhostBlocked,

    #[error("Private IP address blocked: {0}")]
    PrivateIpBlocked(String),

    #[error("Failed to fetch content: {0}")]
    FetchError(String),

    #[error("DNS resolution failed: {0}")]
    DnsError(String),

    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Request timeout: {0}")]
    TimeoutError(String),

    #[error("Page not found: {0}")]
    NotFound(String),

    #[error("Client error ({status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("Content too large: {size} bytes (limit {limit})")]
    ContentTooLarge { size: usize, limit: usize },

    #[error("Failed to load content from {0}. The page might be empty or protected.")]
    EmptyContent(String),

    #[error("Failed to extract text: {0}")]
    ExtractError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Summarization chain failed: {0}")]
    ChainError(String),

    #[error("Concurrency limit reached")]
    ConcurrencyLimitError,

    #[error("External service error: {service} - {message}")]
    ExternalServiceError { service: String, message: String },
}

impl From<serde_json::Error> for SummarizeError {
    fn from(e: serde_json::Error) -> Self {
        SummarizeError::ParseError(e.to_string())
    }
}

impl From<reqwest::Error> for SummarizeError {
    fn from(e: reqwest::Error) -> Self {
        let message = e.to_string();
        if e.is_timeout() {
            return SummarizeError::TimeoutError(message);
        }
        if e.is_connect() {
            // reqwest reports resolver failures as connect errors; the source chain
            // carries the resolver's wording.
            let detail = std::error::Error::source(&e)
                .map(|s| s.to_string())
                .unwrap_or_default()
                .to_lowercase();
            if detail.contains("dns") || detail.contains("resolve") || detail.contains("lookup") {
                return SummarizeError::DnsError(message);
            }
            return SummarizeError::ConnectionError(message);
        }
        if let Some(status) = e.status() {
            return SummarizeError::from_status(status.as_u16(), message);
        }
        SummarizeError::FetchError(message)
    }
}

impl SummarizeError {
    /// Map a non-success HTTP status to the matching variant.
    pub fn from_status(status: u16, url: impl Into<String>) -> Self {
        let url = url.into();
        match status {
            404 => SummarizeError::NotFound(format!("{url} not found")),
            400..=499 => SummarizeError::ClientError {
                status,
                message: format!("request to {url} was rejected"),
            },
            500..=599 => SummarizeError::ServerError {
                status,
                message: format!("{url} failed on the server side"),
            },
            _ => SummarizeError::FetchError(format!("unexpected status {status} from {url}")),
        }
    }

    /// Errors caused by what the user typed rather than by the page or the model.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SummarizeError::MissingApiKey
                | SummarizeError::MissingUrl
                | SummarizeError::InvalidUrl(_)
                | SummarizeError::UrlParseError(_)
                | SummarizeError::InvalidUrlScheme(_)
                | SummarizeError::DomainNotAllowed(_)
                | SummarizeError::DomainBlocked(_)
                | SummarizeError::LocalhostBlocked
                | SummarizeError::PrivateIpBlocked(_)
        )
    }

    pub fn log(&self) {
        match self {
            SummarizeError::MissingApiKey | SummarizeError::MissingUrl => {
                warn!(error = %self, "Missing input");
            }
            SummarizeError::InvalidUrl(e) => {
                warn!(error = %e, "URL validation failed");
            }
            SummarizeError::UrlParseError(e) => {
                warn!(error = %e, "URL parsing failed");
            }
            SummarizeError::InvalidUrlScheme(_)
            | SummarizeError::DomainNotAllowed(_)
            | SummarizeError::DomainBlocked(_)
            | SummarizeError::LocalhostBlocked
            | SummarizeError::PrivateIpBlocked(_) => {
                warn!(error = %self, "URL rejected by security policy");
            }
            SummarizeError::FetchError(e) => {
                error!(error = %e, "Content fetch failed");
            }
            SummarizeError::DnsError(e) => {
                error!(error = %e, "DNS resolution failed");
            }
            SummarizeError::ConnectionError(e) => {
                error!(error = %e, "Connection failed");
            }
            SummarizeError::TimeoutError(e) => {
                warn!(error = %e, "Request timed out");
            }
            SummarizeError::NotFound(e) => {
                warn!(error = %e, "Page not found");
            }
            SummarizeError::ClientError { status, message } => {
                warn!(status = %status, error = %message, "Client error response");
            }
            SummarizeError::ServerError { status, message } => {
                error!(status = %status, error = %message, "Server error response");
            }
            SummarizeError::InvalidContentType(e) => {
                warn!(error = %e, "Invalid content type received");
            }
            SummarizeError::ContentTooLarge { size, limit } => {
                warn!(size = %size, limit = %limit, "Content exceeds size limit");
            }
            SummarizeError::EmptyContent(url) => {
                warn!(url = %url, "No text content loaded");
            }
            SummarizeError::ExtractError(e) => {
                error!(error = %e, "Text extraction failed");
            }
            SummarizeError::ParseError(e) => {
                error!(error = %e, "Parsing failed");
            }
            SummarizeError::InvalidConfiguration(e) => {
                error!(error = %e, "Invalid configuration");
            }
            SummarizeError::ChainError(e) => {
                error!(error = %e, "Summarization chain failed");
            }
            SummarizeError::ConcurrencyLimitError => {
                warn!("Concurrency limit reached");
            }
            SummarizeError::ExternalServiceError { service, message } => {
                error!(
                    service = %service,
                    error = %message,
                    "External service error occurred"
                );
            }
        }
    }
}
