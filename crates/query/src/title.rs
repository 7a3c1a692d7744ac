use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::llm::Generator;
use crate::prompt::{build_title_prompt, DEFAULT_TITLE};
use crate::retry::with_timeout;

/// Names a conversation after its first message.
///
/// A title is cosmetic, so every failure (including a provider that never
/// initialised) degrades to [`DEFAULT_TITLE`] instead of an error.
pub struct TitleGenerator {
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl TitleGenerator {
    pub fn new(generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub async fn generate_title(&self, first_message: &str) -> String {
        let prompt = build_title_prompt(first_message);

        match with_timeout("title", self.timeout, self.generator.complete(None, &prompt)).await {
            Ok(text) => clean_title(&text).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            Err(e) => {
                warn!(error = %e, "title generation failed, using default");
                DEFAULT_TITLE.to_string()
            }
        }
    }
}

/// Trim whitespace and one pair of wrapping quotes; `None` if nothing but
/// quote characters is left.
fn clean_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed)
        .trim();

    let only_quotes = unquoted.chars().all(|c| c == '"' || c == '\'');
    (!only_quotes).then(|| unquoted.to_string())
}
