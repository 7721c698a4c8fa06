//! Embeddings module - Turn text into fixed-length vectors
//!
//! Provides trait-based abstraction over embedding generation:
//! - `HashingEmbedder`: deterministic feature hashing, no model files needed
//! - `OllamaEmbedder`: delegates to the model server's `/api/embeddings`

mod hashing;
mod ollama;
mod similarity;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;
pub use similarity::{cosine_similarity, normalize};

use anyhow::Result;

use crate::config::{Config, EmbedderKind};

/// Trait for embedding generation engines
///
/// Requires Send + Sync because the knowledge repository is shared across
/// request threads.
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get embedding dimension (e.g., 384 for all-MiniLM-L6-v2)
    fn dimension(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Factory function to create the embedder selected in configuration
pub fn create_embedder(config: &Config) -> Result<Box<dyn Embedder>> {
    match config.knowledge.embedder {
        EmbedderKind::Hashing => Ok(Box::new(HashingEmbedder::new(config.knowledge.dimension))),
        EmbedderKind::Ollama => Ok(Box::new(OllamaEmbedder::new(
            &config.ollama.base_url,
            &config.knowledge.embedding_model,
            config.ollama.connect_timeout(),
        )?)),
    }
}
