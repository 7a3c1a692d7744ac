pub mod embeddings;
pub mod memory_index;
pub mod qdrant_index;
pub mod vector_index;

pub use embeddings::{pad_embedding, DimensionAdapter, Embedder, GeminiEmbedder};
pub use memory_index::MemoryIndex;
pub use qdrant_index::QdrantIndex;
pub use vector_index::{fields, Chunk, MetadataFilter, SearchResult, VectorIndex};
