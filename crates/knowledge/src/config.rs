//! Pipeline configuration derived from [`AppConfig`].

use crate::embeddings::EmbeddingConfig;
use crate::segment::SegmenterConfig;
use crate::types::{CollectionSchema, DistanceMetric, SearchParams};
use grounded_core::{AppConfig, AppResult};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the ingestion and answering pipelines need, resolved and
/// validated once from the application config.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Resolved vector database URI
    pub db_uri: String,

    /// Options forwarded to the database connection, including the API key
    pub storage_options: BTreeMap<String, String>,

    /// Requested collection schema
    pub collection: CollectionSchema,

    pub embedding: EmbeddingConfig,
    pub segmenter: SegmenterConfig,
    pub search: SearchParams,

    /// Points written per upsert call
    pub upsert_batch_size: usize,

    /// Configured corpus sources
    pub sources: Vec<String>,

    pub llm_provider: String,
    pub llm_endpoint: String,
    pub llm_model: String,
    pub temperature: Option<f32>,

    pub prompt_file: Option<PathBuf>,
    pub timeout: Duration,
}

impl PipelineConfig {
    pub fn from_app_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let distance: DistanceMetric = config.vector_db.distance.parse()?;

        let mut storage_options = config.vector_db.storage_options.clone();
        if let Some(key) = &config.vector_db.api_key {
            storage_options.insert("api_key".to_string(), key.clone());
        }

        let prompt_file = config.prompt_file.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                config.workspace.join(p)
            }
        });

        Ok(Self {
            db_uri: config.vector_db_uri(),
            storage_options,
            collection: CollectionSchema::new(
                config.vector_db.collection.clone(),
                config.embedding.dimensions,
                distance,
            ),
            embedding: EmbeddingConfig::from_settings(&config.embedding, config.timeout_secs),
            segmenter: SegmenterConfig::from_settings(&config.segmentation)?,
            search: SearchParams::from(&config.retrieval),
            upsert_batch_size: config.ingest.upsert_batch_size,
            sources: config.ingest.sources.clone(),
            llm_provider: config.llm.provider.clone(),
            llm_endpoint: config.llm.endpoint.clone(),
            llm_model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            prompt_file,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}
