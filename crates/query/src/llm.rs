use async_trait::async_trait;
use tracing::debug;

use provider::{ProviderError, SharedGeminiClient};

pub const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash";

/// A hosted LLM answering a single prompt, optionally under a system
/// instruction. An empty string is a valid (if unhelpful) answer.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(
        &self,
        system_instruction: Option<&str>,
        prompt: &str,
    ) -> Result<String, ProviderError>;
}

#[derive(Clone)]
pub struct GeminiGenerator {
    client: SharedGeminiClient,
    model: String,
}

impl GeminiGenerator {
    pub fn new(client: SharedGeminiClient, model: String) -> Self {
        Self { client, model }
    }

    pub fn with_defaults(client: SharedGeminiClient) -> Self {
        Self::new(client, DEFAULT_GENERATION_MODEL.to_string())
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn complete(
        &self,
        system_instruction: Option<&str>,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let client = self.client.get()?;

        debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            grounded = system_instruction.is_some(),
            "requesting completion"
        );

        client
            .generate_content(&self.model, system_instruction, prompt)
            .await
    }
}
