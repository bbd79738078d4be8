//! Retrieval-augmented question answering over a pre-indexed corpus.
//!
//! Ingestion turns source text into overlapping, semantically coherent
//! chunks, embeds them as passages and upserts them into a vector
//! collection. Answering embeds the question, retrieves a diverse set of
//! passages with MMR, and asks the generative model with the passages as
//! context.

pub mod config;
pub mod embeddings;
pub mod fetch;
pub mod index;
pub mod ingest;
pub mod progress;
pub mod rag;
pub mod segment;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use embeddings::{Embedder, EmbeddingBackend, EmbeddingConfig};
pub use fetch::{HttpFetcher, SourceFetcher};
pub use index::{CollectionLookup, LanceDbIndex, MemoryIndex, VectorIndex};
pub use ingest::Ingestor;
pub use progress::{ProgressEvent, ProgressReporter};
pub use rag::{AnswerSettings, Answerer, ConversationExchange, RagResponse, SourceRef};
pub use segment::{parse_corpus, SourceDocument, TextSegmenter};
pub use types::{
    Chunk, CollectionSchema, DistanceMetric, IngestStats, RetrievalResult, SearchParams,
};

use grounded_core::AppResult;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// What to ingest in one run.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    /// Locations to fetch: URLs, files or directories
    pub sources: Vec<String>,

    /// Corpus file with `### Source:` headers
    pub corpus: Option<PathBuf>,

    /// Delete every point in the collection before writing
    pub reset: bool,
}

/// Collection summary for `stats`.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub backend: String,
    pub uri: String,
    pub collection: String,
    pub exists: bool,
    pub dimension: Option<usize>,
    pub distance_metric: Option<DistanceMetric>,
    pub points: usize,
}

/// Connect to the configured vector database.
pub async fn open_index(config: &PipelineConfig) -> AppResult<Arc<dyn VectorIndex>> {
    let index = LanceDbIndex::connect(&config.db_uri, &config.storage_options).await?;
    Ok(Arc::new(index))
}

/// Run one ingestion into the configured collection.
pub async fn ingest(
    config: &PipelineConfig,
    request: IngestRequest,
    progress: ProgressReporter,
) -> AppResult<IngestStats> {
    tracing::info!(
        collection = %config.collection.name,
        sources = request.sources.len(),
        corpus = ?request.corpus,
        reset = request.reset,
        "Starting ingestion"
    );

    let documents = match &request.corpus {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            parse_corpus(&text)
        }
        None => Vec::new(),
    };

    let embedder = Embedder::from_config(&config.embedding)?;
    let index = open_index(config).await?;
    let fetcher = Arc::new(HttpFetcher::new(config.timeout)?);

    let ingestor = Ingestor::new(
        embedder,
        index,
        fetcher,
        config.collection.clone(),
        config.segmenter,
        config.upsert_batch_size,
    )?
    .with_progress(progress);

    ingestor
        .ingest(documents, &request.sources, request.reset)
        .await
}

/// Build an [`Answerer`] from configuration.
pub async fn build_answerer(config: &PipelineConfig) -> AppResult<Answerer> {
    let embedder = Embedder::from_config(&config.embedding)?;
    let index = open_index(config).await?;
    let llm = grounded_llm::create_client(
        &config.llm_provider,
        Some(&config.llm_endpoint),
        config.timeout,
    )?;
    let prompt = grounded_prompt::load_prompt_or_default(config.prompt_file.as_deref())?;

    Answerer::new(
        embedder,
        index,
        llm,
        prompt,
        AnswerSettings {
            collection: config.collection.clone(),
            search: config.search,
            model: config.llm_model.clone(),
            temperature: config.temperature,
        },
    )
    .await
}

/// Describe the configured collection without creating it.
pub async fn stats(config: &PipelineConfig) -> AppResult<CollectionStats> {
    let index = open_index(config).await?;
    collection_stats(index.as_ref(), &config.db_uri, &config.collection.name).await
}

pub async fn collection_stats(
    index: &dyn VectorIndex,
    uri: &str,
    collection: &str,
) -> AppResult<CollectionStats> {
    let mut stats = CollectionStats {
        backend: index.backend_name().to_string(),
        uri: uri.to_string(),
        collection: collection.to_string(),
        exists: false,
        dimension: None,
        distance_metric: None,
        points: 0,
    };

    if let CollectionLookup::Found(schema) = index.collection_info(collection).await? {
        stats.exists = true;
        stats.dimension = Some(schema.dimension);
        stats.distance_metric = Some(schema.distance_metric);
        stats.points = index.count(collection).await?;
    }

    Ok(stats)
}
