//! In-process index with brute-force cosine search. Meant for tests and local
//! development; everything lives in a single map behind a `tokio` lock.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use provider::ProviderError;

use crate::vector_index::{Chunk, MetadataFilter, SearchResult, VectorIndex};

#[derive(Debug, Default)]
pub struct MemoryIndex {
    points: RwLock<BTreeMap<u64, Chunk>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let points = self.points.read().await;

        let mut scored: Vec<(f32, &Chunk)> = points
            .values()
            .filter(|chunk| filter.is_none_or(|f| f.matches(chunk)))
            .map(|chunk| (cosine_similarity(vector, &chunk.embedding), chunk))
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, chunk)| SearchResult::from_chunk(chunk, score))
            .collect())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<(), ProviderError> {
        let mut points = self.points.write().await;
        for chunk in chunks {
            points.insert(chunk.point_id(), chunk.clone());
        }
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), ProviderError> {
        let mut points = self.points.write().await;
        points.retain(|_, chunk| chunk.document_id != document_id);
        Ok(())
    }
}
