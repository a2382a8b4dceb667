//! HTML to plain-text extraction
//!
//! Splits a page into a flat list of text elements (titles, paragraphs, list
//! items, table rows) and joins them into the text a summarization chain
//! reads.

use crate::utils::collapse_whitespace;
use crate::SummarizeError;
use ego_tree::iter::Edge;
use ego_tree::NodeId;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Separator placed between elements in the joined page text.
pub const ELEMENT_SEPARATOR: &str = "\n\n";

/// Subtrees that never carry readable content.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "object", "embed", "svg", "canvas",
    "head", "meta", "link", "base", "title", "input", "button", "select", "textarea", "option",
    "audio", "video", "source", "track",
];

/// Elements whose whole text becomes a single narrative element.
const PARAGRAPH_TAGS: &[&str] = &["p", "blockquote", "figcaption", "dt", "dd", "caption", "address"];

/// Containers that break the inline text flow but are walked into.
const CONTAINER_TAGS: &[&str] = &[
    "html", "body", "div", "section", "article", "main", "header", "footer", "nav", "aside",
    "ul", "ol", "dl", "table", "thead", "tbody", "tfoot", "form", "fieldset", "figure",
    "details", "summary", "hr", "center",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    Title,
    NarrativeText,
    ListItem,
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    pub kind: ElementKind,
    pub text: String,
}

/// Result of extracting a page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    /// Contents of `<title>`, if any.
    pub title: Option<String>,
    pub elements: Vec<TextElement>,
}

impl ExtractedPage {
    /// Page text as fed to the summarizer.
    pub fn text(&self) -> String {
        self.elements
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(ELEMENT_SEPARATOR)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Text extractor, optionally dropping every subtree that matches one of
/// `remove_selectors`.
#[derive(Debug, Clone, Default)]
pub struct TextExtractor {
    remove_selectors: Vec<String>,
    compiled: Vec<Selector>,
}

impl TextExtractor {
    pub fn new<S: AsRef<str>>(remove_selectors: &[S]) -> Result<Self, SummarizeError> {
        let remove_selectors = remove_selectors
            .iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let compiled = remove_selectors
            .iter()
            .map(|selector| {
                Selector::parse(selector).map_err(|e| {
                    SummarizeError::ExtractError(format!("Invalid selector '{selector}': {e:?}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            remove_selectors,
            compiled,
        })
    }

    pub fn remove_selectors(&self) -> &[String] {
        &self.remove_selectors
    }

    #[instrument(level = "debug", skip_all, fields(html_len = html.len()))]
    pub fn extract(&self, html: &str) -> ExtractedPage {
        let document = Html::parse_document(html);

        let title = Selector::parse("title").ok().and_then(|selector| {
            document
                .select(&selector)
                .next()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .filter(|t| !t.is_empty())
        });

        let mut walker = Walker::new(&self.compiled);

        let body = Selector::parse("body")
            .ok()
            .and_then(|selector| document.select(&selector).next());
        match body {
            Some(body) => walker.walk(body),
            None => walker.walk(document.root_element()),
        }
        walker.flush();

        debug!(elements = walker.elements.len(), "Extracted text elements");

        ExtractedPage {
            title,
            elements: walker.elements,
        }
    }
}

/// Open element on the walker's stack.
enum Frame {
    /// Block container; flushes loose text when opened and closed.
    Container,
    /// Captures its whole text as one element of this kind.
    Block(ElementKind),
    Pre,
    Row(Vec<String>),
    Cell,
    /// Container nested inside a captured element; its text is padded with spaces.
    Spaced,
    Inline,
}

struct Walker<'a> {
    removed: &'a [Selector],
    elements: Vec<TextElement>,
    inline: String,
    frames: Vec<Frame>,
    capture: Option<String>,
    skip: Option<NodeId>,
}

impl<'a> Walker<'a> {
    fn new(removed: &'a [Selector]) -> Self {
        Self {
            removed,
            elements: Vec::new(),
            inline: String::new(),
            frames: Vec::new(),
            capture: None,
            skip: None,
        }
    }

    fn is_skipped(&self, element: ElementRef) -> bool {
        SKIPPED_TAGS.contains(&element.value().name())
            || self.removed.iter().any(|selector| selector.matches(&element))
    }

    fn push(&mut self, kind: ElementKind, text: String) {
        if !text.is_empty() {
            self.elements.push(TextElement { kind, text });
        }
    }

    fn flush(&mut self) {
        let text = collapse_whitespace(&self.inline);
        self.inline.clear();
        self.push(ElementKind::NarrativeText, text);
    }

    fn start_capture(&mut self, frame: Frame) -> Frame {
        self.capture = Some(String::new());
        frame
    }

    fn take_capture(&mut self) -> String {
        self.capture.take().unwrap_or_default()
    }

    /// Walks `root` in document order, keeping open elements on `frames`
    /// instead of the call stack.
    fn walk(&mut self, root: ElementRef<'_>) {
        for edge in root.traverse() {
            match edge {
                Edge::Open(node) => {
                    if self.skip.is_some() {
                        continue;
                    }
                    match node.value() {
                        Node::Text(text) => self.text(text),
                        Node::Element(_) => {
                            if let Some(element) = ElementRef::wrap(node) {
                                self.open(element);
                            }
                        }
                        _ => {}
                    }
                }
                Edge::Close(node) => {
                    if let Some(id) = self.skip {
                        if id == node.id() {
                            self.skip = None;
                        }
                        continue;
                    }
                    if node.value().is_element() {
                        self.close();
                    }
                }
            }
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(capture) = self.capture.as_mut() {
            capture.push_str(text);
        } else if !matches!(self.frames.last(), Some(Frame::Row(_))) {
            self.inline.push_str(text);
        }
    }

    fn open(&mut self, element: ElementRef) {
        let in_row = matches!(self.frames.last(), Some(Frame::Row(_)));
        let name = element.value().name();
        let is_cell = matches!(name, "td" | "th");
        if self.is_skipped(element) || (in_row && !is_cell) {
            self.skip = Some(element.id());
            return;
        }

        let frame = if let Some(capture) = self.capture.as_mut() {
            if name == "br" {
                capture.push('\n');
                Frame::Inline
            } else if CONTAINER_TAGS.contains(&name) || name == "li" {
                capture.push(' ');
                Frame::Spaced
            } else {
                Frame::Inline
            }
        } else if in_row {
            self.start_capture(Frame::Cell)
        } else {
            match name {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    self.flush();
                    self.start_capture(Frame::Block(ElementKind::Title))
                }
                "li" => {
                    self.flush();
                    self.start_capture(Frame::Block(ElementKind::ListItem))
                }
                "tr" => {
                    self.flush();
                    Frame::Row(Vec::new())
                }
                "pre" => {
                    self.flush();
                    self.start_capture(Frame::Pre)
                }
                "br" => {
                    self.inline.push(' ');
                    Frame::Inline
                }
                _ if PARAGRAPH_TAGS.contains(&name) => {
                    self.flush();
                    self.start_capture(Frame::Block(ElementKind::NarrativeText))
                }
                _ if CONTAINER_TAGS.contains(&name) => {
                    self.flush();
                    Frame::Container
                }
                _ => Frame::Inline,
            }
        };
        self.frames.push(frame);
    }

    fn close(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        match frame {
            Frame::Container => self.flush(),
            Frame::Block(kind) => {
                let text = collapse_whitespace(&self.take_capture());
                self.push(kind, text);
            }
            Frame::Pre => {
                let captured = self.take_capture();
                let text = captured.trim_matches('\n');
                if !text.trim().is_empty() {
                    self.push(ElementKind::NarrativeText, text.to_string());
                }
            }
            Frame::Row(cells) => self.push(ElementKind::Table, cells.join(" | ")),
            Frame::Cell => {
                let cell = collapse_whitespace(&self.take_capture());
                if let Some(Frame::Row(cells)) = self.frames.last_mut() {
                    if !cell.is_empty() {
                        cells.push(cell);
                    }
                }
            }
            Frame::Spaced => {
                if let Some(capture) = self.capture.as_mut() {
                    capture.push(' ');
                }
            }
            Frame::Inline => {}
        }
    }
}
