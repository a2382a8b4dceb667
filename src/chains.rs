//! Summarization chains
//!
//! Three ways of turning a list of documents into one summary:
//!
//! - **stuff**: everything goes into a single prompt.
//! - **map_reduce**: every document is summarized on its own (concurrently),
//!   the partial summaries are collapsed until they fit `token_max`, then
//!   combined into the final summary.
//! - **refine**: the first document is summarized, and the summary is refined
//!   with each following document in turn.

use crate::document::Document;
use crate::llm_providers::{ChatModel, Completion, TokenUsage};
use crate::SummarizeError;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const DOCUMENT_SEPARATOR: &str = "\n\n";

pub const CONCISE_SUMMARY_PROMPT: &str =
    "Write a concise summary of the following:\n\n\n\"{text}\"\n\n\nCONCISE SUMMARY:";

pub const REFINE_PROMPT: &str = "Your job is to produce a final summary\n\
We have provided an existing summary up to a certain point: {existing_answer}\n\
We have the opportunity to refine the existing summary (only if needed) with some more context below.\n\
------------\n\
{text}\n\
------------\n\
Given the new context, refine the original summary.\n\
If the context isn't useful, return the original summary.";

const SINGLE_DOCUMENT_TOO_LONG: &str =
    "A single document was longer than the context length, we cannot handle this.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainType {
    Stuff,
    MapReduce,
    Refine,
}

impl ChainType {
    pub const ALL: [ChainType; 3] = [ChainType::Stuff, ChainType::MapReduce, ChainType::Refine];

    /// Lowercase identifier (`stuff`, `map_reduce`, `refine`)
    pub fn key(&self) -> &'static str {
        match self {
            ChainType::Stuff => "stuff",
            ChainType::MapReduce => "map_reduce",
            ChainType::Refine => "refine",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChainType::Stuff => "Fastest, but only works for smaller articles.",
            ChainType::MapReduce => {
                "Best for very large articles, processes chunks in parallel."
            }
            ChainType::Refine => {
                "Iteratively builds a detailed summary, good for coherent narratives."
            }
        }
    }
}

impl Default for ChainType {
    fn default() -> Self {
        ChainType::Stuff
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChainType::Stuff => "Stuff",
            ChainType::MapReduce => "map_reduce",
            ChainType::Refine => "Refine",
        };
        f.write_str(label)
    }
}

impl FromStr for ChainType {
    type Err = SummarizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stuff" => Ok(ChainType::Stuff),
            "map_reduce" | "map-reduce" | "mapreduce" => Ok(ChainType::MapReduce),
            "refine" => Ok(ChainType::Refine),
            other => Err(SummarizeError::InvalidConfiguration(format!(
                "unknown summarization method '{other}' (expected stuff, map_reduce or refine)"
            ))),
        }
    }
}

/// Tuning knobs shared by all chain types.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOptions {
    /// Upper bound, in estimated tokens, of the combine prompt in map_reduce.
    pub token_max: usize,
    /// Concurrent model calls during the map and collapse steps.
    pub max_concurrency: usize,
    /// Give up after this many collapse rounds (`None` = keep going).
    pub collapse_max_retries: Option<usize>,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            token_max: 3000,
            max_concurrency: 4,
            collapse_max_retries: Some(5),
        }
    }
}

/// Final result of a chain run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainOutput {
    pub summary: String,
    pub llm_calls: usize,
    pub usage: Option<TokenUsage>,
}

#[derive(Default)]
struct Tally {
    calls: usize,
    usage: Option<TokenUsage>,
}

impl Tally {
    fn record(&mut self, completion: &Completion) {
        self.calls += 1;
        if let Some(usage) = completion.usage {
            *self.usage.get_or_insert_with(TokenUsage::default) += usage;
        }
    }

    fn finish(self, summary: String) -> ChainOutput {
        ChainOutput {
            summary,
            llm_calls: self.calls,
            usage: self.usage,
        }
    }
}

fn fill(template: &str, text: &str) -> String {
    render(template, &[("text", text)])
}

/// Substitute `{name}` placeholders in one pass over `template`. Substituted
/// values are never scanned again, so braces inside them survive.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let value = values.iter().find_map(|(name, value)| {
            tail.strip_prefix('{')
                .and_then(|t| t.strip_prefix(*name))
                .and_then(|t| t.strip_prefix('}'))
                .map(|remaining| (*value, remaining))
        });
        match value {
            Some((value, remaining)) => {
                out.push_str(value);
                rest = remaining;
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn join_contents<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

pub struct SummarizeChain {
    model: Arc<dyn ChatModel>,
    chain_type: ChainType,
    options: ChainOptions,
}

impl SummarizeChain {
    pub fn new(model: Arc<dyn ChatModel>, chain_type: ChainType) -> Self {
        Self::with_options(model, chain_type, ChainOptions::default())
    }

    pub fn with_options(
        model: Arc<dyn ChatModel>,
        chain_type: ChainType,
        options: ChainOptions,
    ) -> Self {
        Self {
            model,
            chain_type,
            options,
        }
    }

    pub fn chain_type(&self) -> ChainType {
        self.chain_type
    }

    #[instrument(level = "debug", skip_all, fields(chain = %self.chain_type, documents = docs.len()))]
    pub async fn run(&self, docs: &[Document]) -> Result<ChainOutput, SummarizeError> {
        if docs.is_empty() {
            return Err(SummarizeError::ChainError(
                "no documents to summarize".to_string(),
            ));
        }

        let output = match self.chain_type {
            ChainType::Stuff => self.run_stuff(docs).await?,
            ChainType::MapReduce => self.run_map_reduce(docs).await?,
            ChainType::Refine => self.run_refine(docs).await?,
        };

        info!(
            chain = %self.chain_type,
            llm_calls = output.llm_calls,
            summary_len = output.summary.len(),
            "Summarization chain finished"
        );
        Ok(output)
    }

    async fn call(&self, prompt: String, tally: &mut Tally) -> Result<String, SummarizeError> {
        let completion = self.model.complete(prompt).await?;
        tally.record(&completion);
        Ok(completion.text)
    }

    /// Summarize each text with the concise prompt, at most `max_concurrency` at a time.
    /// Output order follows input order.
    async fn summarize_each(
        &self,
        texts: Vec<String>,
        tally: &mut Tally,
    ) -> Result<Vec<String>, SummarizeError> {
        let model = &self.model;
        let completions: Vec<Completion> = stream::iter(texts)
            .map(|text| model.complete(fill(CONCISE_SUMMARY_PROMPT, &text)))
            .buffered(self.options.max_concurrency.max(1))
            .try_collect()
            .await?;

        Ok(completions
            .into_iter()
            .map(|completion| {
                tally.record(&completion);
                completion.text
            })
            .collect())
    }

    async fn run_stuff(&self, docs: &[Document]) -> Result<ChainOutput, SummarizeError> {
        let mut tally = Tally::default();
        let contents: Vec<&str> = docs.iter().map(|d| d.page_content.as_str()).collect();
        let summary = self
            .call(fill(CONCISE_SUMMARY_PROMPT, &join_contents(&contents)), &mut tally)
            .await?;
        Ok(tally.finish(summary))
    }

    async fn run_map_reduce(&self, docs: &[Document]) -> Result<ChainOutput, SummarizeError> {
        let mut tally = Tally::default();

        let texts = docs.iter().map(|d| d.page_content.clone()).collect();
        let mut partials = self.summarize_each(texts, &mut tally).await?;
        debug!(partials = partials.len(), "Map step finished");

        let mut rounds = 0;
        while self.combine_prompt_tokens(&partials) > self.options.token_max {
            let groups = self.split_to_fit(&partials)?;
            let merged = groups.iter().map(|group| join_contents(group)).collect();
            partials = self.summarize_each(merged, &mut tally).await?;
            rounds += 1;
            debug!(round = rounds, partials = partials.len(), "Collapse step finished");

            if let Some(max) = self.options.collapse_max_retries {
                if rounds >= max && self.combine_prompt_tokens(&partials) > self.options.token_max {
                    return Err(SummarizeError::ChainError(format!(
                        "Exceeded {max} tries to collapse documents to {} tokens.",
                        self.options.token_max
                    )));
                }
            }
        }

        let summary = self
            .call(fill(CONCISE_SUMMARY_PROMPT, &join_contents(&partials)), &mut tally)
            .await?;
        Ok(tally.finish(summary))
    }

    async fn run_refine(&self, docs: &[Document]) -> Result<ChainOutput, SummarizeError> {
        let mut tally = Tally::default();

        let (first, rest) = docs
            .split_first()
            .ok_or_else(|| SummarizeError::ChainError("no documents to summarize".to_string()))?;

        let mut summary = self
            .call(fill(CONCISE_SUMMARY_PROMPT, &first.page_content), &mut tally)
            .await?;

        for (step, doc) in rest.iter().enumerate() {
            let prompt = render(
                REFINE_PROMPT,
                &[("existing_answer", summary.as_str()), ("text", doc.page_content.as_str())],
            );
            summary = self.call(prompt, &mut tally).await?;
            debug!(step = step + 1, summary_len = summary.len(), "Refined summary");
        }

        Ok(tally.finish(summary))
    }

    fn combine_prompt_tokens<S: AsRef<str>>(&self, parts: &[S]) -> usize {
        self.model
            .count_tokens(&fill(CONCISE_SUMMARY_PROMPT, &join_contents(parts)))
    }

    /// Greedily pack consecutive partial summaries into groups whose combine
    /// prompt stays within `token_max`.
    fn split_to_fit(&self, parts: &[String]) -> Result<Vec<Vec<String>>, SummarizeError> {
        let mut groups = Vec::new();
        let mut current: Vec<String> = Vec::new();

        for part in parts {
            current.push(part.clone());
            if self.combine_prompt_tokens(&current) > self.options.token_max {
                if current.len() == 1 {
                    return Err(SummarizeError::ChainError(SINGLE_DOCUMENT_TOO_LONG.to_string()));
                }
                let last = current.pop().unwrap_or_default();
                groups.push(std::mem::take(&mut current));
                current.push(last);
            }
        }
        groups.push(current);
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LoaderKind;
    use crate::llm_providers::MockProvider;

    fn doc(text: &str) -> Document {
        Document::new(text, "https://example.com", LoaderKind::Http)
    }

    #[test]
    fn test_chain_type_parsing() {
        assert_eq!("Stuff".parse::<ChainType>().unwrap(), ChainType::Stuff);
        assert_eq!("map_reduce".parse::<ChainType>().unwrap(), ChainType::MapReduce);
        assert_eq!("Map-Reduce".parse::<ChainType>().unwrap(), ChainType::MapReduce);
        assert_eq!(" Refine ".parse::<ChainType>().unwrap(), ChainType::Refine);
        assert!("summarize".parse::<ChainType>().is_err());
    }

    #[test]
    fn test_chain_type_labels() {
        let labels: Vec<String> = ChainType::ALL.iter().map(|c| c.to_string()).collect();
        assert_eq!(labels, vec!["Stuff", "map_reduce", "Refine"]);
        assert_eq!(ChainType::MapReduce.key(), "map_reduce");
        assert_eq!(ChainType::default(), ChainType::Stuff);
    }

    #[tokio::test]
    async fn test_stuff_single_call() {
        let model = Arc::new(MockProvider::new().with_reply("A short summary."));
        let chain = SummarizeChain::new(model.clone(), ChainType::Stuff);

        let output = chain.run(&[doc("first part"), doc("second part")]).await.unwrap();

        assert_eq!(output.summary, "A short summary.");
        assert_eq!(output.llm_calls, 1);
        assert!(output.usage.is_some());
        assert_eq!(
            model.prompts()[0],
            "Write a concise summary of the following:\n\n\n\"first part\n\nsecond part\"\n\n\nCONCISE SUMMARY:"
        );
    }

    #[tokio::test]
    async fn test_refine_threads_summary() {
        let model = Arc::new(
            MockProvider::new()
                .with_reply("summary one")
                .with_reply("summary two")
                .with_reply("summary three"),
        );
        let chain = SummarizeChain::new(model.clone(), ChainType::Refine);

        let output = chain
            .run(&[doc("alpha"), doc("beta"), doc("gamma")])
            .await
            .unwrap();

        assert_eq!(output.summary, "summary three");
        assert_eq!(output.llm_calls, 3);

        let prompts = model.prompts();
        assert!(prompts[0].contains("\"alpha\""));
        assert!(prompts[1].contains("existing summary up to a certain point: summary one"));
        assert!(prompts[1].contains("------------\nbeta\n------------"));
        assert!(prompts[2].contains("summary two"));
        assert!(prompts[2].contains("gamma"));
    }

    #[test]
    fn test_render_is_single_pass() {
        assert_eq!(
            render("{a} and {b}", &[("a", "{b}"), ("b", "two")]),
            "{b} and two"
        );
        assert_eq!(render("{unknown} {a}", &[("a", "x")]), "{unknown} x");
        assert_eq!(render("trailing {", &[("a", "x")]), "trailing {");
    }

    #[tokio::test]
    async fn test_refine_keeps_placeholders_in_summary() {
        let model = Arc::new(
            MockProvider::new()
                .with_reply("Python uses \"{text}\" placeholders in templates.")
                .with_reply("done"),
        );
        let chain = SummarizeChain::new(model.clone(), ChainType::Refine);

        chain
            .run(&[doc("format strings"), doc("SECOND_CHUNK")])
            .await
            .unwrap();

        let prompt = &model.prompts()[1];
        assert!(prompt.contains(
            "existing summary up to a certain point: Python uses \"{text}\" placeholders"
        ));
        assert_eq!(prompt.matches("SECOND_CHUNK").count(), 1);
        assert!(prompt.contains("------------\nSECOND_CHUNK\n------------"));
    }

    #[tokio::test]
    async fn test_map_reduce_maps_then_combines() {
        let model = Arc::new(MockProvider::new());
        let chain = SummarizeChain::new(model.clone(), ChainType::MapReduce);

        let output = chain.run(&[doc("one"), doc("two"), doc("three")]).await.unwrap();

        // three map calls plus the final combine
        assert_eq!(output.llm_calls, 4);
        let prompts = model.prompts();
        assert!(prompts[0].contains("\"one\""));
        assert!(prompts[1].contains("\"two\""));
        assert!(prompts[2].contains("\"three\""));
        assert!(prompts[3].contains("summary of: one\n\nsummary of: two\n\nsummary of: three"));
        assert!(output.summary.starts_with("summary of: summary of: one"));
    }

    #[tokio::test]
    async fn test_map_reduce_collapses_when_over_budget() {
        let long = "x".repeat(200);
        let model = Arc::new(
            MockProvider::new()
                .with_reply(long.clone())
                .with_reply(long.clone())
                .with_reply(long.clone())
                .with_reply("collapsed a")
                .with_reply("collapsed b")
                .with_reply("final"),
        );
        let options = ChainOptions {
            token_max: 130,
            max_concurrency: 1,
            collapse_max_retries: Some(3),
        };
        let chain = SummarizeChain::with_options(model.clone(), ChainType::MapReduce, options);

        let output = chain.run(&[doc("a"), doc("b"), doc("c")]).await.unwrap();

        // 3 map + 2 collapse groups + 1 combine
        assert_eq!(output.summary, "final");
        assert_eq!(output.llm_calls, 6);
        assert!(model.prompts()[5].contains("collapsed a\n\ncollapsed b"));
    }

    #[tokio::test]
    async fn test_map_reduce_gives_up_after_collapse_retries() {
        // each reply fits the budget alone but no two fit together
        let long = "z".repeat(300);
        let model = (0..9).fold(MockProvider::new(), |m, _| m.with_reply(long.clone()));
        let model = Arc::new(model);
        let options = ChainOptions {
            token_max: 130,
            max_concurrency: 2,
            collapse_max_retries: Some(2),
        };
        let chain = SummarizeChain::with_options(model.clone(), ChainType::MapReduce, options);

        match chain.run(&[doc("a"), doc("b"), doc("c")]).await {
            Err(SummarizeError::ChainError(msg)) => {
                assert_eq!(msg, "Exceeded 2 tries to collapse documents to 130 tokens.")
            }
            other => panic!("expected ChainError, got {other:?}"),
        }
        // 3 map calls, then 3 per collapse round
        assert_eq!(model.call_count(), 9);
    }

    #[tokio::test]
    async fn test_map_reduce_single_document_too_long() {
        let model = Arc::new(MockProvider::new().with_reply("y".repeat(2000)));
        let options = ChainOptions {
            token_max: 100,
            ..ChainOptions::default()
        };
        let chain = SummarizeChain::with_options(model, ChainType::MapReduce, options);

        match chain.run(&[doc("a")]).await {
            Err(SummarizeError::ChainError(msg)) => assert!(msg.contains("single document")),
            other => panic!("expected ChainError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_input_and_model_failure() {
        let model = Arc::new(MockProvider::new().with_failure("quota exceeded"));
        let chain = SummarizeChain::new(model.clone(), ChainType::Stuff);

        assert!(matches!(chain.run(&[]).await, Err(SummarizeError::ChainError(_))));
        assert_eq!(model.call_count(), 0);

        assert!(matches!(
            chain.run(&[doc("text")]).await,
            Err(SummarizeError::ExternalServiceError { .. })
        ));
    }
}
