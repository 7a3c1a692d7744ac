use std::time::Duration;

use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use provider::{http, ProviderError};

use crate::vector_index::{Chunk, MetadataFilter, SearchResult, VectorIndex};

const PROVIDER: &str = "qdrant";

/// Qdrant collection accessed through its REST API.
pub struct QdrantIndex {
    base_url: String,
    collection_name: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: String,
}

#[derive(Serialize)]
struct UpsertPoints {
    points: Vec<Point>,
}

#[derive(Serialize)]
struct Point {
    id: u64,
    vector: Vec<f32>,
    payload: ChunkPayload,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkPayload {
    #[serde(default)]
    content: String,
    #[serde(default)]
    document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    document_name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_page_number"
    )]
    page_number: Option<u32>,
}

/// Page numbers as other writers may have stored them.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPageNumber {
    Integer(u64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

/// Accept `3`, `3.0` or `"3"`. Anything else reads as missing so one odd
/// point cannot fail a whole search.
fn lenient_page_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let page = match Option::<RawPageNumber>::deserialize(deserializer)? {
        Some(RawPageNumber::Integer(n)) => u32::try_from(n).ok(),
        Some(RawPageNumber::Float(f)) if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => {
            Some(f as u32)
        }
        Some(RawPageNumber::Text(text)) => text.trim().parse().ok(),
        _ => None,
    };
    Ok(page)
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Filter>,
}

#[derive(Serialize)]
struct DeletePoints {
    filter: Filter,
}

#[derive(Serialize)]
struct Filter {
    must: Vec<FieldCondition>,
}

#[derive(Serialize)]
struct FieldCondition {
    key: String,
    #[serde(rename = "match")]
    matches: MatchValue,
}

#[derive(Serialize)]
struct MatchValue {
    value: String,
}

impl From<&MetadataFilter> for Filter {
    fn from(filter: &MetadataFilter) -> Self {
        Self {
            must: filter
                .conditions()
                .map(|(key, value)| FieldCondition {
                    key: key.to_string(),
                    matches: MatchValue {
                        value: value.to_string(),
                    },
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<ChunkPayload>,
}

#[derive(Deserialize)]
struct CollectionsResponse {
    result: CollectionsResult,
}

#[derive(Deserialize)]
struct CollectionsResult {
    collections: Vec<Collection>,
}

#[derive(Deserialize)]
struct Collection {
    name: String,
}

impl QdrantIndex {
    pub fn new(
        base_url: String,
        collection_name: String,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            collection_name,
            timeout,
            client,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Create the collection with cosine distance unless it already exists.
    pub async fn ensure_collection(&self, dimension: usize) -> Result<(), ProviderError> {
        let url = format!("{}/collections", self.base_url);
        let info: CollectionsResponse =
            http::send_json(PROVIDER, self.client.get(&url), self.timeout).await?;

        let exists = info
            .result
            .collections
            .iter()
            .any(|c| c.name == self.collection_name);

        if exists {
            info!(collection = %self.collection_name, "collection already exists");
            return Ok(());
        }

        let url = format!("{}/collections/{}", self.base_url, self.collection_name);
        let create_req = CreateCollection {
            vectors: VectorParams {
                size: dimension,
                distance: "Cosine".to_string(),
            },
        };

        let _: IgnoredAny =
            http::send_json(PROVIDER, self.client.put(&url).json(&create_req), self.timeout).await?;

        info!(collection = %self.collection_name, dimension, "collection created");
        Ok(())
    }

    fn points_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}/points{}",
            self.base_url, self.collection_name, suffix
        )
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let body = SearchRequest {
            vector,
            limit: top_k,
            with_payload: true,
            filter: filter.filter(|f| !f.is_empty()).map(Filter::from),
        };

        let response: SearchResponse = http::send_json(
            PROVIDER,
            self.client.post(self.points_url("/search")).json(&body),
            self.timeout,
        )
        .await?;

        let mut results = Vec::with_capacity(response.result.len());
        for point in response.result.into_iter().take(top_k) {
            let Some(payload) = point.payload else {
                warn!(collection = %self.collection_name, "skipping point without payload");
                continue;
            };
            results.push(SearchResult {
                document_id: payload.document_id,
                document_name: payload.document_name.filter(|n| !n.trim().is_empty()),
                page_number: payload.page_number,
                content: payload.content,
                score: point.score,
            });
        }

        Ok(results)
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<(), ProviderError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let body = UpsertPoints {
            points: chunks
                .iter()
                .map(|chunk| Point {
                    id: chunk.point_id(),
                    vector: chunk.embedding.clone(),
                    payload: ChunkPayload {
                        content: chunk.content.clone(),
                        document_id: chunk.document_id.clone(),
                        document_name: Some(chunk.document_name.clone()),
                        page_number: Some(chunk.page_number),
                    },
                })
                .collect(),
        };

        let _: IgnoredAny = http::send_json(
            PROVIDER,
            self.client.put(self.points_url("?wait=true")).json(&body),
            self.timeout,
        )
        .await?;

        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), ProviderError> {
        let body = DeletePoints {
            filter: Filter::from(&MetadataFilter::document_id(document_id)),
        };

        let _: IgnoredAny = http::send_json(
            PROVIDER,
            self.client.post(self.points_url("/delete?wait=true")).json(&body),
            self.timeout,
        )
        .await?;

        info!(collection = %self.collection_name, document_id, "deleted document chunks");
        Ok(())
    }

    async fn health(&self) -> Result<(), ProviderError> {
        let url = format!("{}/collections/{}", self.base_url, self.collection_name);
        let _: IgnoredAny = http::send_json(PROVIDER, self.client.get(&url), self.timeout).await?;
        Ok(())
    }
}
