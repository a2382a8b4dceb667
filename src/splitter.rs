//! Character-count text splitting
//!
//! Wraps `text_splitter::TextSplitter`, which splits at the coarsest semantic
//! boundary that still fits (paragraphs, then lines, sentences, words and
//! finally graphemes) and packs the pieces into chunks of at most
//! `chunk_size` characters, overlapping neighbours by up to `chunk_overlap`.

use crate::document::Document;
use crate::SummarizeError;
use ::text_splitter::{ChunkConfig, Characters, TextSplitter};

pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    splitter: TextSplitter<Characters>,
}

impl std::fmt::Debug for RecursiveCharacterSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecursiveCharacterSplitter")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish()
    }
}

impl RecursiveCharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SummarizeError> {
        if chunk_size == 0 {
            return Err(SummarizeError::InvalidConfiguration(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        let config = ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| {
                SummarizeError::InvalidConfiguration(format!(
                    "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size}): {e}"
                ))
            })?;

        Ok(Self {
            chunk_size,
            chunk_overlap,
            splitter: TextSplitter::new(config),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.splitter
            .chunks(text)
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Split every document, copying its metadata onto each chunk.
    pub fn split_documents(&self, docs: &[Document]) -> Vec<Document> {
        docs.iter()
            .flat_map(|doc| {
                self.split_text(&doc.page_content)
                    .into_iter()
                    .map(move |chunk| Document {
                        page_content: chunk,
                        metadata: doc.metadata.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LoaderKind;

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = RecursiveCharacterSplitter::new(100, 10).unwrap();
        assert_eq!(splitter.split_text("hello world"), vec!["hello world"]);
        assert!(splitter.split_text("").is_empty());
    }

    #[test]
    fn test_splits_on_paragraphs_first() {
        let splitter = RecursiveCharacterSplitter::new(20, 0).unwrap();
        let chunks = splitter.split_text("first paragraph\n\nsecond paragraph\n\nthird");

        assert_eq!(chunks, vec!["first paragraph", "second paragraph", "third"]);
    }

    #[test]
    fn test_chunks_respect_size() {
        let splitter = RecursiveCharacterSplitter::new(10, 0).unwrap();
        let chunks = splitter.split_text("aaaa bbbb cccc dddd");

        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| char_len(c) <= 10));
        assert_eq!(chunks.join(" "), "aaaa bbbb cccc dddd");
    }

    #[test]
    fn test_unbreakable_word_is_split() {
        let splitter = RecursiveCharacterSplitter::new(4, 0).unwrap();
        let chunks = splitter.split_text("abcdefghij");

        assert_eq!(chunks.concat(), "abcdefghij");
        assert!(chunks.iter().all(|c| char_len(c) <= 4));
    }

    #[test]
    fn test_overlap_repeats_content() {
        let text = "one two three four five six seven eight nine ten";
        let splitter = RecursiveCharacterSplitter::new(15, 6).unwrap();
        let chunks = splitter.split_text(text);

        let words: usize = chunks.iter().map(|c| c.split_whitespace().count()).sum();
        assert!(words > text.split_whitespace().count());
        assert!(chunks.iter().all(|c| char_len(c) <= 15));
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(RecursiveCharacterSplitter::new(0, 0).is_err());
        assert!(matches!(
            RecursiveCharacterSplitter::new(100, 100),
            Err(SummarizeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_split_documents_keeps_metadata() {
        let splitter = RecursiveCharacterSplitter::new(12, 0).unwrap();
        let doc = Document::new("one two three four", "https://example.com/a", LoaderKind::Browser)
            .with_title(Some("Title".to_string()));

        let chunks = splitter.split_documents(&[doc]);

        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert_eq!(chunk.metadata.source, "https://example.com/a");
            assert_eq!(chunk.metadata.loader, LoaderKind::Browser);
            assert_eq!(chunk.metadata.title.as_deref(), Some("Title"));
        }
    }
}
