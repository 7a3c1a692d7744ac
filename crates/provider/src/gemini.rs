use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use crate::http;
use crate::lazy::LazyClient;

pub const PROVIDER: &str = "gemini";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Process-wide Gemini client shared by the embedder and the generator.
pub type SharedGeminiClient = Arc<LazyClient<GeminiClient>>;

/// Everything needed to build a [`GeminiClient`] except the key itself,
/// which is read from the environment on first use.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub base_url: String,
    pub api_key_env: String,
    pub request_timeout: Duration,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

pub struct GeminiClient {
    base_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<hidden>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, empty when the model produced none.
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl GeminiClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::configuration("Gemini API key is empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
            client,
        })
    }

    /// Build a client with the key found in `settings.api_key_env`.
    pub fn from_env(settings: &GeminiSettings) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
            ProviderError::configuration(format!(
                "no Gemini API key found in environment variable {}",
                settings.api_key_env
            ))
        })?;
        Self::new(settings.base_url.clone(), api_key, settings.request_timeout)
    }

    /// A lazily constructed client reading its key from the environment.
    pub fn shared(settings: GeminiSettings) -> SharedGeminiClient {
        Arc::new(LazyClient::new(move || Self::from_env(&settings)))
    }

    /// Embed `text` with `model`, returning the provider's native vector.
    pub async fn embed_content(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderError> {
        let model = model_name(model);
        let url = format!("{}/v1beta/models/{}:embedContent", self.base_url, model);
        let request = EmbedContentRequest {
            model: format!("models/{model}"),
            content: Content::text(None, text),
        };

        let response: EmbedContentResponse = self.post(&url, &request).await?;
        let values = response
            .embedding
            .map(|e| e.values)
            .ok_or_else(|| ProviderError::invalid_response(PROVIDER, "response carried no embedding"))?;

        if values.is_empty() {
            return Err(ProviderError::invalid_response(PROVIDER, "embedding was empty"));
        }

        Ok(values)
    }

    /// Run a single-turn completion. An empty string means the model
    /// answered without text.
    pub async fn generate_content(
        &self,
        model: &str,
        system_instruction: Option<&str>,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let model = model_name(model);
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let request = GenerateContentRequest {
            system_instruction: system_instruction.map(|s| Content::text(None, s)),
            contents: vec![Content::text(Some("user"), prompt)],
        };

        let response: GenerateContentResponse = self.post(&url, &request).await?;
        Ok(response.into_text())
    }

    async fn post<B, R>(&self, url: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(provider = PROVIDER, url, "sending request");

        let request = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body);

        http::send_json(PROVIDER, request, self.timeout).await
    }
}

fn model_name(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_shape() {
        let request = GenerateContentRequest {
            system_instruction: Some(Content::text(None, "be brief")),
            contents: vec![Content::text(Some("user"), "hello")],
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_generate_request_without_instruction() {
        let request = GenerateContentRequest {
            system_instruction: None,
            contents: vec![Content::text(Some("user"), "hello")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_response_text_joins_first_candidate_parts() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "Hello, "}, {"text": "world"}]}},
                {"content": {"role": "model", "parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(response.into_text(), "Hello, world");
    }

    #[test]
    fn test_response_without_candidates_is_empty_text() {
        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({"promptFeedback": {}})).unwrap();
        assert_eq!(response.into_text(), "");

        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({"candidates": [{"finishReason": "SAFETY"}]})).unwrap();
        assert_eq!(response.into_text(), "");
    }

    #[test]
    fn test_model_prefix_is_stripped() {
        assert_eq!(model_name("models/text-embedding-004"), "text-embedding-004");
        assert_eq!(model_name("gemini-1.5-flash"), "gemini-1.5-flash");
    }

    #[test]
    fn test_empty_key_is_a_configuration_error() {
        let err = GeminiClient::new(DEFAULT_BASE_URL.to_string(), "  ".to_string(), Duration::from_secs(1))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_missing_env_key_is_a_configuration_error() {
        let settings = GeminiSettings {
            api_key_env: "DOCCHAT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..GeminiSettings::default()
        };
        let err = GeminiClient::from_env(&settings).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("DOCCHAT_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_debug_hides_key() {
        let client =
            GeminiClient::new(DEFAULT_BASE_URL.to_string(), "secret".to_string(), Duration::from_secs(1)).unwrap();
        assert!(!format!("{client:?}").contains("secret"));
    }
}
