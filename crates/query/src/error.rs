use std::fmt;

use serde::Serialize;
use thiserror::Error;

use provider::ProviderError;

/// The external call a pipeline failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Embed,
    Search,
    Generate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Embed => "embed",
            Stage::Search => "search",
            Stage::Generate => "generate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed `answer` call: which stage failed and the provider error behind it.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: ProviderError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: ProviderError) -> Self {
        Self { stage, source }
    }

    pub fn is_configuration(&self) -> bool {
        self.source.is_configuration()
    }

    pub fn is_timeout(&self) -> bool {
        self.source.is_timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names_stage() {
        let err = PipelineError::new(Stage::Search, ProviderError::invalid_response("qdrant", "bad json"));
        assert_eq!(
            err.to_string(),
            "search stage failed: qdrant returned an unusable response: bad json"
        );
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_stage_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Stage::Generate).unwrap(), "generate");
    }
}
