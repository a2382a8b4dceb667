//! Document loading with a single fallback step.

use crate::document::{Document, LoaderKind};
use crate::SummarizeError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Anything that can turn a URL into documents.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    fn kind(&self) -> LoaderKind;

    async fn load(&self, url: &str) -> Result<Vec<Document>, SummarizeError>;
}

/// Tries `primary` first and, when it fails, hands the URL to `fallback` once.
///
/// A primary result whose documents are all blank counts as a failure.
#[derive(Clone)]
pub struct FallbackLoader {
    primary: Arc<dyn DocumentLoader>,
    fallback: Option<Arc<dyn DocumentLoader>>,
}

impl FallbackLoader {
    pub fn new(primary: Arc<dyn DocumentLoader>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn DocumentLoader>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn load(&self, url: &str) -> Result<Vec<Document>, SummarizeError> {
        let primary_error = match self.primary.load(url).await {
            Ok(docs) if docs.iter().any(|d| !d.is_blank()) => {
                debug!(loader = %self.primary.kind(), count = docs.len(), "Primary loader succeeded");
                return Ok(docs);
            }
            Ok(_) => SummarizeError::EmptyContent(url.to_string()),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_error);
        };

        warn!(
            loader = %self.primary.kind(),
            error = %primary_error,
            "Simple loader failed, trying robust loader ({})",
            fallback.kind()
        );

        let docs = fallback.load(url).await?;
        info!(loader = %fallback.kind(), count = docs.len(), "Fallback loader finished");
        Ok(docs)
    }
}
