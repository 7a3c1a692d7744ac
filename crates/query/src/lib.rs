pub mod error;
pub mod llm;
pub mod prompt;
pub mod retrieval;
pub mod retry;
pub mod title;

#[cfg(test)]
mod test_support;

pub use error::{PipelineError, Stage};
pub use llm::{GeminiGenerator, Generator};
pub use retrieval::{AnswerResult, PipelineConfig, RetrievalPipeline, Source};
pub use retry::RetryPolicy;
pub use title::TitleGenerator;
