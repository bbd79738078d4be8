//! Embedding generation under the asymmetric query/passage contract.
//!
//! Text is embedded only through [`Embedder`]. Passages get the
//! `"passage: "` marker and queries the `"query: "` marker before they reach
//! the backend, and every vector that comes back is length-checked and
//! L2-normalized.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_backend, EmbeddingBackend};

use grounded_core::{AppError, AppResult};
use std::sync::Arc;
use tracing::debug;

/// Marker prepended to every query before embedding.
pub const QUERY_MARKER: &str = "query: ";

/// Marker prepended to every passage before embedding.
pub const PASSAGE_MARKER: &str = "passage: ";

/// Public embedding entry point.
#[derive(Debug, Clone)]
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    batch_size: usize,
}

impl Embedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, batch_size: usize) -> AppResult<Self> {
        if batch_size == 0 {
            return Err(AppError::Config(
                "Embedding batch size must be positive".to_string(),
            ));
        }
        Ok(Self {
            backend,
            batch_size,
        })
    }

    /// Build the configured backend and wrap it.
    pub fn from_config(config: &EmbeddingConfig) -> AppResult<Self> {
        Self::new(create_backend(config)?, config.batch_size)
    }

    pub fn dimensions(&self) -> usize {
        self.backend.dimensions()
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn provider_name(&self) -> &str {
        self.backend.provider_name()
    }

    /// Embed passages in batches. Output order matches input order, and the
    /// result is the same as embedding each passage on its own.
    pub async fn embed_passages(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let marked: Vec<String> = batch
                .iter()
                .map(|t| format!("{}{}", PASSAGE_MARKER, t))
                .collect();
            let raw = self.backend.embed_batch(&marked).await?;
            if raw.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "Backend returned {} vectors for a batch of {}",
                    raw.len(),
                    batch.len()
                )));
            }
            for vector in raw {
                vectors.push(self.finish(vector)?);
            }
        }

        debug!(count = vectors.len(), "Embedded passages");
        Ok(vectors)
    }

    /// Embed a single query.
    pub async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        let marked = vec![format!("{}{}", QUERY_MARKER, text)];
        let vector = self
            .backend
            .embed_batch(&marked)
            .await?
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))?;
        self.finish(vector)
    }

    fn finish(&self, mut vector: Vec<f32>) -> AppResult<Vec<f32>> {
        if vector.len() != self.backend.dimensions() {
            return Err(AppError::Embedding(format!(
                "Unexpected embedding dimensions from '{}': got {}, expected {}",
                self.backend.model_name(),
                vector.len(),
                self.backend.dimensions()
            )));
        }
        normalize(&mut vector);
        Ok(vector)
    }
}

/// Scale to unit L2 norm in place. A zero vector is left unchanged.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity; 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}
