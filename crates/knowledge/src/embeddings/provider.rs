//! Embedding backend trait and factory.

use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::providers::{hashing::HashingBackend, ollama::OllamaBackend};
use grounded_core::{AppError, AppResult};
use std::sync::Arc;

/// A raw text-to-vector model.
///
/// Backends see text exactly as given. The query/passage markers and
/// normalization are applied by [`crate::embeddings::Embedder`], which is
/// the only type the rest of the crate embeds through.
#[async_trait::async_trait]
pub trait EmbeddingBackend: Send + Sync + std::fmt::Debug {
    /// Get backend name (e.g., "hashing", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate one embedding per input text, in order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;
}

/// Create an embedding backend based on configuration.
pub fn create_backend(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingBackend>> {
    match config.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingBackend::new(config.dimensions))),
        "ollama" => Ok(Arc::new(OllamaBackend::new(config)?)),
        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: hashing, ollama",
            config.provider
        ))),
    }
}
