//! Hand-rolled doubles for the provider traits.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use index::{Chunk, Embedder, MetadataFilter, SearchResult, VectorIndex};
use provider::ProviderError;

use crate::llm::Generator;

pub fn transient() -> ProviderError {
    ProviderError::Status {
        provider: "stub".to_string(),
        status: 503,
        body: "unavailable".to_string(),
    }
}

pub fn unauthorized() -> ProviderError {
    ProviderError::Status {
        provider: "stub".to_string(),
        status: 401,
        body: "bad key".to_string(),
    }
}

/// Pops a scripted outcome per call and repeats the last one once the script runs out.
struct Script<T: Clone> {
    outcomes: Mutex<VecDeque<Result<T, ProviderError>>>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    fn new(outcomes: Vec<Result<T, ProviderError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Result<T, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.len() > 1 {
            outcomes.pop_front().unwrap()
        } else {
            outcomes.front().cloned().unwrap()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct StubEmbedder {
    script: Script<Vec<f32>>,
}

impl StubEmbedder {
    pub fn returning(vector: Vec<f32>) -> Self {
        Self::scripted(vec![Ok(vector)])
    }

    pub fn scripted(outcomes: Vec<Result<Vec<f32>, ProviderError>>) -> Self {
        Self {
            script: Script::new(outcomes),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        self.script.next()
    }

    fn dimensions(&self) -> usize {
        4
    }
}

pub struct StubIndex {
    script: Script<Vec<SearchResult>>,
    pub seen: Mutex<Vec<(usize, Option<MetadataFilter>)>>,
}

impl StubIndex {
    pub fn returning(results: Vec<SearchResult>) -> Self {
        Self::scripted(vec![Ok(results)])
    }

    pub fn scripted(outcomes: Vec<Result<Vec<SearchResult>, ProviderError>>) -> Self {
        Self {
            script: Script::new(outcomes),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }

    pub fn last_filter(&self) -> Option<MetadataFilter> {
        self.seen.lock().unwrap().last().and_then(|(_, f)| f.clone())
    }
}

#[async_trait]
impl VectorIndex for StubIndex {
    async fn query(
        &self,
        _vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        self.seen.lock().unwrap().push((top_k, filter.cloned()));
        self.script.next()
    }

    async fn upsert(&self, _chunks: &[Chunk]) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn delete_document(&self, _document_id: &str) -> Result<(), ProviderError> {
        Ok(())
    }
}

pub struct StubGenerator {
    script: Script<String>,
    delay: Option<Duration>,
    pub requests: Mutex<Vec<(Option<String>, String)>>,
}

impl StubGenerator {
    pub fn returning(text: &str) -> Self {
        Self::scripted(vec![Ok(text.to_string())])
    }

    pub fn failing(err: ProviderError) -> Self {
        Self::scripted(vec![Err(err)])
    }

    pub fn scripted(outcomes: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Script::new(outcomes),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn slow(text: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::returning(text)
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn complete(
        &self,
        system_instruction: Option<&str>,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        self.requests
            .lock()
            .unwrap()
            .push((system_instruction.map(str::to_string), prompt.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script.next()
    }
}

pub fn result(name: Option<&str>, page: Option<u32>, content: &str, score: f32) -> SearchResult {
    SearchResult {
        document_id: "doc-1".to_string(),
        document_name: name.map(str::to_string),
        page_number: page,
        content: content.to_string(),
        score,
    }
}
