pub mod embeddings;
pub mod generate;
pub mod rerank;

pub use embeddings::EmbeddingClient;
pub use generate::GenerationClient;
pub use rerank::RerankClient;
