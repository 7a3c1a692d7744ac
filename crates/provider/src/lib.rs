//! Plumbing shared by every external provider adapter: the error taxonomy,
//! the lazily initialised process-wide client and the Gemini REST client.

pub mod error;
pub mod gemini;
pub mod http;
pub mod lazy;

pub use error::ProviderError;
pub use gemini::{GeminiClient, GeminiSettings, SharedGeminiClient};
pub use lazy::LazyClient;
