//! Embedding configuration.

use grounded_core::config::EmbeddingSettings;
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings needed to build an embedding backend and [`super::Embedder`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Backend name: "hashing" or "ollama"
    pub provider: String,

    /// Model identifier (backend-specific)
    pub model: String,

    /// Backend base URL; ignored by "hashing"
    pub endpoint: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum texts per backend call
    pub batch_size: usize,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::from_settings(&EmbeddingSettings::default(), 30)
    }
}

impl EmbeddingConfig {
    pub fn from_settings(settings: &EmbeddingSettings, timeout_secs: u64) -> Self {
        Self {
            provider: settings.provider.clone(),
            model: settings.model.clone(),
            endpoint: settings.endpoint.clone(),
            dimensions: settings.dimensions,
            batch_size: settings.batch_size,
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check that a stored collection dimension agrees with this model.
    pub fn validate_dimension(&self, collection_dimension: usize) -> AppResult<()> {
        if self.dimensions != collection_dimension {
            return Err(AppError::Validation(format!(
                "Dimension mismatch: embedding model '{}' produces {}, collection expects {}",
                self.model, self.dimensions, collection_dimension
            )));
        }
        Ok(())
    }
}
