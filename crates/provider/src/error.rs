use std::time::Duration;

use thiserror::Error;

/// Failure of a call to an external provider (embedding, vector index or LLM).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// Missing credentials or unusable configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The native embedding is wider than the index slot it has to fit.
    #[error("embedding has {native} dimensions but the target is {target}")]
    DimensionOverflow { native: usize, target: usize },

    #[error("{provider} request timed out after {}ms", .after.as_millis())]
    Timeout { provider: String, after: Duration },

    /// Connection-level failure (refused, reset, DNS).
    #[error("{provider} request failed: {message}")]
    Transport { provider: String, message: String },

    /// The provider answered with a non-success HTTP status.
    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// The provider answered but the body carried nothing usable.
    #[error("{provider} returned an unusable response: {message}")]
    InvalidResponse { provider: String, message: String },
}

impl ProviderError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn invalid_response(provider: &str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Failures worth another attempt: timeouts, dropped connections,
    /// rate limiting and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Configuration(_) | Self::DimensionOverflow { .. } | Self::InvalidResponse { .. } => {
                false
            }
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::DimensionOverflow { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Classify a `reqwest` error raised before a status code was seen.
    pub fn from_reqwest(provider: &str, err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
                after: timeout,
            }
        } else if err.is_decode() {
            Self::invalid_response(provider, err.to_string())
        } else {
            Self::Transport {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }
}
