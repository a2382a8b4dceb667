use serde::{Deserialize, Serialize};
use std::fmt;

/// Which loader produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderKind {
    /// Plain HTTP request plus HTML text extraction.
    Http,
    /// Rendered through a headless browser.
    Browser,
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderKind::Http => write!(f, "http"),
            LoaderKind::Browser => write!(f, "browser"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    pub title: Option<String>,
    pub loader: LoaderKind,
}

/// Text loaded from a page, ready to be fed to a summarization chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(page_content: impl Into<String>, source: impl Into<String>, loader: LoaderKind) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                title: None,
                loader,
            },
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.metadata.title = title;
        self
    }

    pub fn is_blank(&self) -> bool {
        self.page_content.trim().is_empty()
    }
}
