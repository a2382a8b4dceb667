//! Browser-based document loader using MCP integration
//!
//! Renders the page in a headless browser so JavaScript-heavy sites and pages
//! that reject plain HTTP clients still yield text.

use crate::document::{Document, LoaderKind};
use crate::extractor::TextExtractor;
use crate::loader::DocumentLoader;
use crate::mcp_client::{McpClient, McpConfig};
use crate::SummarizeError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Page regions stripped before extraction.
pub const DEFAULT_REMOVE_SELECTORS: &[&str] = &["header", "footer"];

/// Browser-based document loader
pub struct BrowserLoader {
    mcp_client: Arc<McpClient>,
    extractor: TextExtractor,
    /// One page at a time: the MCP server drives a single browser tab.
    page_lock: Mutex<()>,
}

impl BrowserLoader {
    pub fn new(config: McpConfig) -> Self {
        Self {
            mcp_client: Arc::new(McpClient::new(config)),
            extractor: TextExtractor::new(DEFAULT_REMOVE_SELECTORS)
                .unwrap_or_default(),
            page_lock: Mutex::new(()),
        }
    }

    pub fn with_remove_selectors<S: AsRef<str>>(
        config: McpConfig,
        remove_selectors: &[S],
    ) -> Result<Self, SummarizeError> {
        Ok(Self {
            mcp_client: Arc::new(McpClient::new(config)),
            extractor: TextExtractor::new(remove_selectors)?,
            page_lock: Mutex::new(()),
        })
    }

    pub fn remove_selectors(&self) -> &[String] {
        self.extractor.remove_selectors()
    }

    /// Start the browser ahead of the first load
    pub async fn initialize(&self) -> Result<(), SummarizeError> {
        self.mcp_client.start().await
    }

    pub async fn shutdown(&self) -> Result<(), SummarizeError> {
        self.mcp_client.stop().await
    }

    /// Render `url` and return the resulting HTML with removal selectors applied
    #[instrument(skip(self))]
    pub async fn fetch_with_browser(&self, url: &str) -> Result<String, SummarizeError> {
        self.mcp_client.start().await?;
        let _page = self.page_lock.lock().await;

        debug!("Fetching content with browser for URL: {}", url);
        self.mcp_client.navigate(url).await?;
        self.mcp_client.wait_for_load().await?;

        if let Err(e) = self
            .mcp_client
            .remove_elements(self.extractor.remove_selectors())
            .await
        {
            // the extractor skips the same selectors, so the text is unaffected
            warn!(error = %e, "Failed to remove elements in the page");
        }

        let html = self.mcp_client.get_page_html().await?;
        debug!("Successfully fetched {} bytes of HTML", html.len());
        Ok(html)
    }
}

#[async_trait]
impl DocumentLoader for BrowserLoader {
    fn kind(&self) -> LoaderKind {
        LoaderKind::Browser
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn load(&self, url: &str) -> Result<Vec<Document>, SummarizeError> {
        let html = self.fetch_with_browser(url).await?;
        let page = self.extractor.extract(&html);

        let document = Document::new(page.text(), url, LoaderKind::Browser).with_title(page.title);
        if document.is_blank() {
            return Err(SummarizeError::EmptyContent(url.to_string()));
        }
        Ok(vec![document])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_remove_selectors() {
        let loader = BrowserLoader::new(McpConfig::default());
        assert_eq!(loader.remove_selectors(), &["header", "footer"]);
        assert_eq!(loader.kind(), LoaderKind::Browser);
    }

    #[test]
    fn test_custom_remove_selectors() {
        let loader =
            BrowserLoader::with_remove_selectors(McpConfig::default(), &["nav", ".cookie-banner"])
                .unwrap();
        assert_eq!(loader.remove_selectors(), &["nav", ".cookie-banner"]);

        assert!(BrowserLoader::with_remove_selectors(McpConfig::default(), &["<<"]).is_err());
    }

    #[tokio::test]
    async fn test_load_fails_without_browser() {
        let loader = BrowserLoader::new(McpConfig {
            server_command: vec!["definitely-not-a-real-mcp-server-binary".to_string()],
            ..McpConfig::default()
        });

        let err = loader.load("https://example.com").await.unwrap_err();
        assert!(matches!(err, SummarizeError::ExternalServiceError { .. }));
    }

    /// Stdio MCP server that answers slowly to `initialize` and rejects tool
    /// calls until `notifications/initialized` arrives.
    #[cfg(unix)]
    const STRICT_MCP_SERVER: &str = r####"
initialized=0
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\)}$/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      sleep 0.3
      printf '%s\n' '{"jsonrpc":"2.0","id":'"$id"',"result":{"protocolVersion":"2024-11-05","capabilities":{}}}' ;;
    *'"method":"notifications/initialized"'*)
      initialized=1 ;;
    *'"method":"tools/list"'*)
      printf '%s\n' '{"jsonrpc":"2.0","id":'"$id"',"result":{"tools":[]}}' ;;
    *'"method":"tools/call"'*)
      if [ "$initialized" = 1 ]; then
        printf '%s\n' '{"jsonrpc":"2.0","id":'"$id"',"result":{"content":[{"type":"text","text":"### Result\n\"<html><body><header>Menu</header><p>Rendered page</p></body></html>\""}]}}'
      else
        printf '%s\n' '{"jsonrpc":"2.0","id":'"$id"',"error":{"code":-32002,"message":"server not initialized"}}'
      fi ;;
  esac
done
"####;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concurrent_first_loads_wait_for_handshake() {
        let loader = Arc::new(BrowserLoader::new(McpConfig {
            server_command: vec![
                "sh".to_string(),
                "-c".to_string(),
                STRICT_MCP_SERVER.to_string(),
            ],
            browser_timeout: 5,
            settle_time: 0,
        }));

        let (a, b) = tokio::join!(
            loader.load("https://example.com/a"),
            loader.load("https://example.com/b")
        );

        for result in [a, b] {
            let docs = result.unwrap();
            assert_eq!(docs[0].page_content, "Rendered page");
            assert_eq!(docs[0].metadata.loader, LoaderKind::Browser);
        }
        loader.shutdown().await.unwrap();
    }
}
