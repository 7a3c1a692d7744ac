use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use index::embeddings::{DEFAULT_EMBEDDING_MODEL, DEFAULT_NATIVE_DIMENSIONS, DEFAULT_TARGET_DIMENSIONS};
use provider::gemini::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL};
use provider::GeminiSettings;
use query::llm::DEFAULT_GENERATION_MODEL;
use query::retrieval::DEFAULT_TOP_K;
use query::{PipelineConfig, RetryPolicy};

/// Path of an optional JSON config file; `DOCCHAT_*` variables override it.
pub const CONFIG_PATH_ENV: &str = "DOCCHAT_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub qdrant: QdrantConfig,
    pub retrieval: RetrievalConfig,
    pub timeouts: TimeoutConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Mount `/api/admin/*`. These routes are unauthenticated.
    pub enable_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub embedding_model: String,
    pub native_dimensions: usize,
    pub generation_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub target_dimensions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub request_timeout_secs: u64,
    pub embed_timeout_ms: u64,
    pub search_timeout_ms: u64,
    pub generate_timeout_ms: u64,
    pub title_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            enable_admin: false,
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            native_dimensions: DEFAULT_NATIVE_DIMENSIONS,
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
        }
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "docchat_chunks".to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            target_dimensions: DEFAULT_TARGET_DIMENSIONS,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            embed_timeout_ms: 10_000,
            search_timeout_ms: 10_000,
            generate_timeout_ms: 60_000,
            title_timeout_ms: 15_000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

impl AppConfig {
    /// Defaults, then the file named by `DOCCHAT_CONFIG`, then environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Apply `DOCCHAT_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DOCCHAT_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("DOCCHAT_ENABLE_ADMIN") {
            self.server.enable_admin = parse("DOCCHAT_ENABLE_ADMIN", &v)?;
        }
        if let Some(v) = lookup("DOCCHAT_GEMINI_BASE_URL") {
            self.gemini.base_url = v;
        }
        if let Some(v) = lookup("DOCCHAT_GEMINI_API_KEY_ENV") {
            self.gemini.api_key_env = v;
        }
        if let Some(v) = lookup("DOCCHAT_EMBEDDING_MODEL") {
            self.gemini.embedding_model = v;
        }
        if let Some(v) = lookup("DOCCHAT_GENERATION_MODEL") {
            self.gemini.generation_model = v;
        }
        if let Some(v) = lookup("DOCCHAT_QDRANT_URL") {
            self.qdrant.url = v;
        }
        if let Some(v) = lookup("DOCCHAT_QDRANT_COLLECTION") {
            self.qdrant.collection = v;
        }
        if let Some(v) = lookup("DOCCHAT_NATIVE_DIMENSIONS") {
            self.gemini.native_dimensions = parse("DOCCHAT_NATIVE_DIMENSIONS", &v)?;
        }
        if let Some(v) = lookup("DOCCHAT_TARGET_DIMENSIONS") {
            self.retrieval.target_dimensions = parse("DOCCHAT_TARGET_DIMENSIONS", &v)?;
        }
        if let Some(v) = lookup("DOCCHAT_TOP_K") {
            self.retrieval.top_k = parse("DOCCHAT_TOP_K", &v)?;
        }
        if let Some(v) = lookup("DOCCHAT_MAX_RETRIES") {
            self.retry.max_retries = parse("DOCCHAT_MAX_RETRIES", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be greater than zero");
        }
        if self.retrieval.target_dimensions == 0 {
            anyhow::bail!("retrieval.target_dimensions must be greater than zero");
        }
        if self.gemini.native_dimensions > self.retrieval.target_dimensions {
            anyhow::bail!(
                "embedding model produces {} dimensions but the index holds {}",
                self.gemini.native_dimensions,
                self.retrieval.target_dimensions
            );
        }
        Ok(())
    }

    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            base_url: self.gemini.base_url.clone(),
            api_key_env: self.gemini.api_key_env.clone(),
            request_timeout: Duration::from_secs(self.timeouts.request_timeout_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            self.retry.initial_backoff_ms,
            self.retry.max_backoff_ms,
        )
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            top_k: self.retrieval.top_k,
            embed_timeout: Duration::from_millis(self.timeouts.embed_timeout_ms),
            search_timeout: Duration::from_millis(self.timeouts.search_timeout_ms),
            generate_timeout: Duration::from_millis(self.timeouts.generate_timeout_ms),
            retry: self.retry_policy(),
        }
    }

    pub fn title_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.title_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.request_timeout_secs)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {key}: {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_gemini_and_index() {
        let config = AppConfig::default();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.target_dimensions, 1024);
        assert_eq!(config.gemini.native_dimensions, 768);
        assert_eq!(config.gemini.api_key_env, "GEMINI_API_KEY");
        assert!(!config.server.enable_admin);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup(&[
                ("DOCCHAT_QDRANT_URL", "http://qdrant:6333"),
                ("DOCCHAT_TOP_K", " 8 "),
                ("DOCCHAT_MAX_RETRIES", "2"),
                ("DOCCHAT_ENABLE_ADMIN", "true"),
            ]))
            .unwrap();

        assert_eq!(config.qdrant.url, "http://qdrant:6333");
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.pipeline_config().top_k, 8);
        assert_eq!(config.retry_policy().max_retries(), 2);
        assert!(config.server.enable_admin);
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(lookup(&[("DOCCHAT_TOP_K", "five")]))
            .unwrap_err();
        assert!(err.to_string().contains("DOCCHAT_TOP_K"));
    }

    #[test]
    fn test_oversized_native_dimensions_fail_validation() {
        let mut config = AppConfig::default();
        config.gemini.native_dimensions = 3072;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"qdrant": {"collection": "contracts"}, "retrieval": {"top_k": 3}}"#).unwrap();

        assert_eq!(config.qdrant.collection, "contracts");
        assert_eq!(config.qdrant.url, "http://localhost:6333");
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.target_dimensions, 1024);
    }

    #[test]
    fn test_timeouts_feed_pipeline_config() {
        let config = AppConfig::default();
        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.embed_timeout, Duration::from_secs(10));
        assert_eq!(pipeline.generate_timeout, Duration::from_secs(60));
        assert_eq!(config.title_timeout(), Duration::from_secs(15));
    }
}
