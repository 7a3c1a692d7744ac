use async_trait::async_trait;
use tracing::debug;

use provider::{ProviderError, SharedGeminiClient};

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
/// Native width of `text-embedding-004`.
pub const DEFAULT_NATIVE_DIMENSIONS: usize = 768;
/// Width of the index slot embeddings are stored in.
pub const DEFAULT_TARGET_DIMENSIONS: usize = 1024;

/// Turns text into a vector of [`Embedder::dimensions`] floats.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    fn dimensions(&self) -> usize;
}

/// Embeddings from the Gemini `embedContent` endpoint, at native width.
#[derive(Clone)]
pub struct GeminiEmbedder {
    client: SharedGeminiClient,
    model: String,
    native_dimensions: usize,
}

impl GeminiEmbedder {
    pub fn new(client: SharedGeminiClient, model: String, native_dimensions: usize) -> Self {
        Self {
            client,
            model,
            native_dimensions,
        }
    }

    pub fn with_defaults(client: SharedGeminiClient) -> Self {
        Self::new(client, DEFAULT_EMBEDDING_MODEL.to_string(), DEFAULT_NATIVE_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let client = self.client.get()?;

        debug!(
            model = %self.model,
            preview = %text.chars().take(100).collect::<String>(),
            "creating embedding"
        );

        client.embed_content(&self.model, text).await
    }

    fn dimensions(&self) -> usize {
        self.native_dimensions
    }
}

/// Adapts any [`Embedder`] to a fixed output width by zero-padding the tail.
///
/// Wider native vectors are rejected with [`ProviderError::DimensionOverflow`];
/// values are never dropped.
pub struct DimensionAdapter<E> {
    inner: E,
    target: usize,
}

impl<E: Embedder> DimensionAdapter<E> {
    pub fn new(inner: E, target: usize) -> Self {
        Self { inner, target }
    }
}

#[async_trait]
impl<E: Embedder> Embedder for DimensionAdapter<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let native = self.inner.embed(text).await?;
        if native.is_empty() {
            return Err(ProviderError::invalid_response("embedder", "embedding was empty"));
        }

        let native_len = native.len();
        let padded = pad_embedding(native, self.target)?;
        if native_len != self.target {
            debug!(from = native_len, to = self.target, "padded embedding");
        }
        Ok(padded)
    }

    fn dimensions(&self) -> usize {
        self.target
    }
}

/// Zero-pad `embedding` at the tail to exactly `target` values.
pub fn pad_embedding(mut embedding: Vec<f32>, target: usize) -> Result<Vec<f32>, ProviderError> {
    if embedding.len() > target {
        return Err(ProviderError::DimensionOverflow {
            native: embedding.len(),
            target,
        });
    }
    embedding.resize(target, 0.0);
    Ok(embedding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use provider::LazyClient;
    use std::sync::Arc;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(self.0.clone())
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn test_pad_768_to_1024() {
        let native: Vec<f32> = (0..768).map(|i| i as f32 + 1.0).collect();
        let padded = pad_embedding(native.clone(), 1024).unwrap();

        assert_eq!(padded.len(), 1024);
        assert_eq!(&padded[..768], native.as_slice());
        assert!(padded[768..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_exact_width_passes_through() {
        let native = vec![0.5; 4];
        assert_eq!(pad_embedding(native.clone(), 4).unwrap(), native);
    }

    #[test]
    fn test_oversized_embedding_fails_fast() {
        let err = pad_embedding(vec![1.0; 5], 4).unwrap_err();
        assert_eq!(err, ProviderError::DimensionOverflow { native: 5, target: 4 });
    }

    proptest! {
        #[test]
        fn prop_padding_keeps_prefix_and_zero_tail(
            native in proptest::collection::vec(-1.0f32..1.0f32, 1..64),
            extra in 0usize..64,
        ) {
            let target = native.len() + extra;
            let padded = pad_embedding(native.clone(), target).unwrap();

            prop_assert_eq!(padded.len(), target);
            prop_assert_eq!(&padded[..native.len()], native.as_slice());
            prop_assert!(padded[native.len()..].iter().all(|v| *v == 0.0));
        }
    }

    #[tokio::test]
    async fn test_adapter_pads_and_reports_target() {
        let adapter = DimensionAdapter::new(FixedEmbedder(vec![1.0, 2.0]), 4);

        assert_eq!(adapter.dimensions(), 4);
        assert_eq!(adapter.embed("x").await.unwrap(), vec![1.0, 2.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_adapter_rejects_empty_embedding() {
        let adapter = DimensionAdapter::new(FixedEmbedder(Vec::new()), 4);
        let err = adapter.embed("x").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_gemini_embedder_surfaces_configuration_error() {
        let client: SharedGeminiClient =
            Arc::new(LazyClient::new(|| Err(ProviderError::configuration("no key"))));
        let embedder = GeminiEmbedder::with_defaults(client);

        let err = embedder.embed("hello").await.unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(embedder.dimensions(), DEFAULT_NATIVE_DIMENSIONS);
    }
}
