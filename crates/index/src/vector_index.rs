use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use provider::ProviderError;

/// Payload keys shared by every index backend.
pub mod fields {
    pub const CONTENT: &str = "content";
    pub const DOCUMENT_ID: &str = "documentId";
    pub const DOCUMENT_NAME: &str = "documentName";
    pub const PAGE_NUMBER: &str = "pageNumber";
}

/// A unit of indexed document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub document_id: String,
    pub document_name: String,
    pub page_number: u32,
    pub content: String,
    pub embedding: Vec<f32>,
}

impl Chunk {
    pub fn new(
        document_id: String,
        document_name: String,
        page_number: Option<u32>,
        content: String,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            document_id,
            document_name,
            page_number: page_number.filter(|p| *p > 0).unwrap_or(1),
            content,
            embedding,
        }
    }

    /// Stable id: re-indexing the same text of the same page replaces the
    /// earlier point instead of duplicating it.
    pub fn point_id(&self) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.document_id.as_bytes());
        hasher.update(self.page_number.to_be_bytes());
        hasher.update(self.content.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(bytes)
    }

    /// Metadata value as matched by a [`MetadataFilter`].
    pub fn metadata(&self, key: &str) -> Option<String> {
        match key {
            fields::DOCUMENT_ID => Some(self.document_id.clone()),
            fields::DOCUMENT_NAME => Some(self.document_name.clone()),
            fields::PAGE_NUMBER => Some(self.page_number.to_string()),
            fields::CONTENT => Some(self.content.clone()),
            _ => None,
        }
    }
}

/// A chunk's metadata plus its similarity to the query vector.
///
/// Metadata written by other ingestion tools may be incomplete, so the
/// display fields stay optional here.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub document_id: String,
    pub document_name: Option<String>,
    pub page_number: Option<u32>,
    pub content: String,
    pub score: f32,
}

impl SearchResult {
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            document_id: chunk.document_id.clone(),
            document_name: Some(chunk.document_name.clone()).filter(|n| !n.trim().is_empty()),
            page_number: Some(chunk.page_number),
            content: chunk.content.clone(),
            score,
        }
    }
}

/// Exact-match conditions on chunk metadata, all of which must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, String>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.conditions.insert(key.to_string(), value.into());
        self
    }

    pub fn document_name(name: impl Into<String>) -> Self {
        Self::new().with(fields::DOCUMENT_NAME, name)
    }

    pub fn document_id(id: impl Into<String>) -> Self {
        Self::new().with(fields::DOCUMENT_ID, id)
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.conditions
            .iter()
            .all(|(key, value)| chunk.metadata(key).as_deref() == Some(value.as_str()))
    }
}

/// Nearest-neighbour search over stored chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// At most `top_k` results, most similar first. No match is an empty
    /// vector, never an error.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, ProviderError>;

    /// Insert or replace chunks.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<(), ProviderError>;

    /// Remove every chunk belonging to `document_id`.
    async fn delete_document(&self, document_id: &str) -> Result<(), ProviderError>;

    /// Cheap reachability probe used by health checks.
    async fn health(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(name: &str, page: Option<u32>, content: &str) -> Chunk {
        Chunk::new("doc-1".to_string(), name.to_string(), page, content.to_string(), vec![1.0])
    }

    #[test]
    fn test_page_number_defaults_to_one() {
        assert_eq!(chunk("a.pdf", None, "x").page_number, 1);
        assert_eq!(chunk("a.pdf", Some(0), "x").page_number, 1);
        assert_eq!(chunk("a.pdf", Some(7), "x").page_number, 7);
    }

    #[test]
    fn test_point_id_is_stable_and_content_sensitive() {
        let a = chunk("a.pdf", Some(1), "alpha");
        let b = chunk("a.pdf", Some(1), "alpha");
        let c = chunk("a.pdf", Some(2), "alpha");
        let d = chunk("a.pdf", Some(1), "beta");

        assert_eq!(a.point_id(), b.point_id());
        assert_ne!(a.point_id(), c.point_id());
        assert_ne!(a.point_id(), d.point_id());
    }

    #[test]
    fn test_filter_matches_exactly() {
        let c = chunk("contract.pdf", Some(3), "x");

        assert!(MetadataFilter::new().matches(&c));
        assert!(MetadataFilter::document_name("contract.pdf").matches(&c));
        assert!(!MetadataFilter::document_name("contract").matches(&c));
        assert!(!MetadataFilter::document_name("CONTRACT.pdf").matches(&c));
        assert!(MetadataFilter::document_name("contract.pdf")
            .with(fields::PAGE_NUMBER, "3")
            .matches(&c));
        assert!(!MetadataFilter::new().with("unknownKey", "x").matches(&c));
    }

    #[test]
    fn test_chunk_serializes_camel_case() {
        let json = serde_json::to_value(chunk("a.pdf", Some(2), "text")).unwrap();
        assert_eq!(json["documentId"], "doc-1");
        assert_eq!(json["documentName"], "a.pdf");
        assert_eq!(json["pageNumber"], 2);
    }

    #[test]
    fn test_blank_document_name_is_reported_as_missing() {
        let result = SearchResult::from_chunk(&chunk("  ", Some(2), "text"), 0.5);
        assert_eq!(result.document_name, None);
        assert_eq!(result.page_number, Some(2));

        let named = SearchResult::from_chunk(&chunk("a.pdf", Some(2), "text"), 0.5);
        assert_eq!(named.document_name.as_deref(), Some("a.pdf"));
    }
}
