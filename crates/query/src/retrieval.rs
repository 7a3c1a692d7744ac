use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use index::{Embedder, MetadataFilter, SearchResult, VectorIndex};
use provider::ProviderError;

use crate::error::{PipelineError, Stage};
use crate::llm::Generator;
use crate::prompt::{self, EMPTY_COMPLETION_FALLBACK, GROUNDING_INSTRUCTION, NO_ANSWER};
use crate::retry::{with_timeout, RetryPolicy};

pub const DEFAULT_TOP_K: usize = 5;
pub const EXCERPT_CHARS: usize = 200;
pub const EXCERPT_MARKER: &str = "...";
pub const UNKNOWN_DOCUMENT: &str = "Unknown Document";

/// A citation shown next to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub document_id: String,
    pub document_name: String,
    pub page_number: u32,
    pub excerpt: String,
}

impl From<&SearchResult> for Source {
    fn from(result: &SearchResult) -> Self {
        Self {
            document_id: result.document_id.clone(),
            document_name: result
                .document_name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(UNKNOWN_DOCUMENT)
                .to_string(),
            page_number: result.page_number.filter(|p| *p > 0).unwrap_or(1),
            excerpt: excerpt(&result.content),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub content: String,
    pub sources: Vec<Source>,
}

impl AnswerResult {
    /// The answer given when nothing relevant was found.
    pub fn no_answer() -> Self {
        Self {
            content: NO_ANSWER.to_string(),
            sources: Vec::new(),
        }
    }
}

/// First [`EXCERPT_CHARS`] characters of `content` followed by
/// [`EXCERPT_MARKER`]. The marker is appended even when nothing was cut.
pub fn excerpt(content: &str) -> String {
    let mut excerpt: String = content.chars().take(EXCERPT_CHARS).collect();
    excerpt.push_str(EXCERPT_MARKER);
    excerpt
}

/// Chunk contents in rank order, separated by blank lines.
pub fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub top_k: usize,
    pub embed_timeout: Duration,
    pub search_timeout: Duration,
    pub generate_timeout: Duration,
    /// Applied to embed and search. Generation is retried at most once.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            embed_timeout: Duration::from_secs(10),
            search_timeout: Duration::from_secs(10),
            generate_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

/// Embed -> search -> generate, with citations for the chunks used.
pub struct RetrievalPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    config: PipelineConfig,
}

impl RetrievalPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Answer `query` from the indexed documents, optionally restricted to
    /// one document by name.
    ///
    /// `user_id` is only recorded; callers are expected to have scoped the
    /// index to what the user may read.
    #[tracing::instrument(
        name = "answer",
        skip_all,
        fields(user_id = %user_id, document = selected_document_name.unwrap_or("*"))
    )]
    pub async fn answer(
        &self,
        query: &str,
        user_id: &str,
        selected_document_name: Option<&str>,
    ) -> Result<AnswerResult, PipelineError> {
        // Step 1: Embed the query
        let embedding = self
            .run_stage(Stage::Embed, self.config.embed_timeout, self.config.retry, || {
                self.embedder.embed(query)
            })
            .await?;

        // Step 2: Restrict to the selected document, if any
        let filter = selected_document_name
            .filter(|name| !name.trim().is_empty())
            .map(|name| MetadataFilter::document_name(name));
        if let Some(name) = selected_document_name.filter(|_| filter.is_some()) {
            info!(document = name, "filtering search results to document");
        }

        // Step 3: Vector search
        let results = self
            .run_stage(Stage::Search, self.config.search_timeout, self.config.retry, || {
                self.index.query(&embedding, self.config.top_k, filter.as_ref())
            })
            .await?;

        if results.is_empty() {
            info!("no relevant chunks found");
            return Ok(AnswerResult::no_answer());
        }

        // Step 4: Context and citations
        let context = build_context(&results);
        let sources: Vec<Source> = results.iter().map(Source::from).collect();

        // Step 5: Grounded generation
        let user_prompt = prompt::build_answer_prompt(query, &context);
        let generated = self
            .run_stage(
                Stage::Generate,
                self.config.generate_timeout,
                self.config.retry.capped(1),
                || self.generator.complete(Some(GROUNDING_INSTRUCTION), &user_prompt),
            )
            .await?;

        let content = if generated.trim().is_empty() {
            info!("model returned no text, using fallback answer");
            EMPTY_COMPLETION_FALLBACK.to_string()
        } else {
            generated
        };

        info!(sources = sources.len(), context_chars = context.len(), "answered query");

        Ok(AnswerResult { content, sources })
    }

    async fn run_stage<T, F, Fut>(
        &self,
        stage: Stage,
        limit: Duration,
        policy: RetryPolicy,
        mut call: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        policy
            .retry(stage.as_str(), || with_timeout(stage.as_str(), limit, call()))
            .await
            .map_err(|source| {
                error!(stage = %stage, error = %source, "pipeline stage failed");
                PipelineError::new(stage, source)
            })
    }
}
