//! Batch ingestion: fetch → segment → embed passages → upsert.
//!
//! Re-running over the same corpus overwrites points in place because
//! point ids are derived from `(source, sequence_index)`. Points left over
//! from a source that has since shrunk are only removed by a reset.

use crate::embeddings::Embedder;
use crate::fetch::SourceFetcher;
use crate::index::VectorIndex;
use crate::progress::ProgressReporter;
use crate::segment::{SegmenterConfig, SourceDocument, TextSegmenter};
use crate::types::{CollectionSchema, FailedSource, IngestStats};
use chrono::Utc;
use grounded_core::{AppError, AppResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Drives one ingestion run into a single collection.
pub struct Ingestor {
    embedder: Embedder,
    segmenter: TextSegmenter,
    index: Arc<dyn VectorIndex>,
    fetcher: Arc<dyn SourceFetcher>,
    schema: CollectionSchema,
    upsert_batch_size: usize,
    progress: ProgressReporter,
}

impl Ingestor {
    pub fn new(
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        fetcher: Arc<dyn SourceFetcher>,
        schema: CollectionSchema,
        segmenter: SegmenterConfig,
        upsert_batch_size: usize,
    ) -> AppResult<Self> {
        if upsert_batch_size == 0 {
            return Err(AppError::Config(
                "Upsert batch size must be positive".to_string(),
            ));
        }

        Ok(Self {
            segmenter: TextSegmenter::new(embedder.clone(), segmenter)?,
            embedder,
            index,
            fetcher,
            schema,
            upsert_batch_size,
            progress: ProgressReporter::noop(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Fetch every source. A failing source is logged and recorded, never fatal.
    pub async fn fetch_sources(
        &self,
        sources: &[String],
    ) -> (Vec<SourceDocument>, Vec<FailedSource>) {
        let mut documents = Vec::new();
        let mut failed = Vec::new();

        for (i, location) in sources.iter().enumerate() {
            match self.fetcher.fetch(location).await {
                Ok(docs) if docs.iter().any(|d| !d.text.trim().is_empty()) => {
                    documents.extend(docs);
                }
                Ok(_) => {
                    warn!("Source {} has no text content; skipping", location);
                    failed.push(FailedSource {
                        location: location.clone(),
                        error: "no text content".to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to fetch {}: {}", location, e);
                    failed.push(FailedSource {
                        location: location.clone(),
                        error: e.to_string(),
                    });
                }
            }
            self.progress.fetch(i as u64 + 1, sources.len() as u64, location);
        }

        (documents, failed)
    }

    /// Ingest in-memory documents plus whatever can be fetched from `sources`.
    pub async fn ingest(
        &self,
        documents: Vec<SourceDocument>,
        sources: &[String],
        reset: bool,
    ) -> AppResult<IngestStats> {
        if documents.is_empty() && sources.is_empty() {
            return Err(AppError::Validation(
                "No corpus sources configured".to_string(),
            ));
        }

        let started_at = Utc::now();
        let timer = Instant::now();
        let mut documents = documents;
        let (fetched, failed) = self.fetch_sources(sources).await;
        documents.extend(fetched);
        self.run(documents, failed, reset, started_at, timer).await
    }

    /// Fetch the given locations and ingest whatever could be read.
    pub async fn ingest_sources(&self, sources: &[String], reset: bool) -> AppResult<IngestStats> {
        self.ingest(Vec::new(), sources, reset).await
    }

    /// Ingest documents that are already in memory, e.g. a parsed corpus file.
    pub async fn ingest_documents(
        &self,
        documents: Vec<SourceDocument>,
        reset: bool,
    ) -> AppResult<IngestStats> {
        self.ingest(documents, &[], reset).await
    }

    async fn run(
        &self,
        documents: Vec<SourceDocument>,
        failed_sources: Vec<FailedSource>,
        reset: bool,
        started_at: chrono::DateTime<Utc>,
        timer: Instant,
    ) -> AppResult<IngestStats> {
        let documents: Vec<SourceDocument> = documents
            .into_iter()
            .filter(|d| !d.text.trim().is_empty())
            .collect();
        if documents.is_empty() {
            return Err(AppError::Validation(format!(
                "Corpus is empty: no source produced text ({} failed)",
                failed_sources.len()
            )));
        }

        if self.embedder.dimensions() != self.schema.dimension {
            return Err(AppError::Validation(format!(
                "Dimension mismatch: embedding model '{}' produces {}, collection '{}' expects {}",
                self.embedder.model_name(),
                self.embedder.dimensions(),
                self.schema.name,
                self.schema.dimension
            )));
        }

        let schema = self.index.ensure_collection(&self.schema).await?;
        if reset {
            info!("Resetting collection {}", schema.name);
            self.index.clear(&schema.name).await?;
        }

        let segmented = self.segmenter.chunk_documents(&documents).await?;
        self.progress
            .segment(documents.len() as u64, segmented.chunks.len() as u64);

        let total = segmented.chunks.len() as u64;
        let mut points_upserted = 0;
        for batch in segmented.chunks.chunks(self.upsert_batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_passages(&texts).await?;
            self.progress.embed(
                (points_upserted + batch.len()) as u64,
                total,
                self.embedder.model_name(),
            );

            points_upserted += self.index.upsert(&schema.name, batch, &vectors).await?;
            self.progress.index(points_upserted as u64, total, &schema.name);
        }

        let sources: BTreeSet<&str> = documents.iter().map(|d| d.source.as_str()).collect();
        let stats = IngestStats {
            collection: schema.name.clone(),
            sources_ingested: sources.len(),
            failed_sources,
            segments: segmented.segments,
            chunks: segmented.chunks.len(),
            points_upserted,
            started_at,
            duration_ms: timer.elapsed().as_millis() as u64,
        };

        info!(
            collection = %stats.collection,
            sources = stats.sources_ingested,
            failed = stats.failed_sources.len(),
            chunks = stats.chunks,
            "Ingestion complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::HashingBackend;
    use crate::index::MemoryIndex;
    use crate::progress::ProgressEvent;
    use crate::types::DistanceMetric;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves fixed documents; unknown locations fail.
    struct FakeFetcher {
        pages: HashMap<String, String>,
    }

    impl FakeFetcher {
        fn new(pages: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl SourceFetcher for FakeFetcher {
        async fn fetch(&self, location: &str) -> AppResult<Vec<SourceDocument>> {
            self.pages
                .get(location)
                .map(|text| vec![SourceDocument::new(location, text.clone())])
                .ok_or_else(|| AppError::unavailable("fake", format!("{} is down", location)))
        }
    }

    const DIM: usize = 64;

    fn ingestor(index: Arc<MemoryIndex>, fetcher: Arc<FakeFetcher>, dim: usize) -> Ingestor {
        let embedder = Embedder::new(Arc::new(HashingBackend::new(DIM)), 32).unwrap();
        Ingestor::new(
            embedder,
            index,
            fetcher,
            CollectionSchema::new("docs", dim, DistanceMetric::Cosine),
            SegmenterConfig {
                target_words: 5,
                ..SegmenterConfig::default()
            },
            4,
        )
        .unwrap()
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[tokio::test]
    async fn test_failing_source_is_skipped() {
        let index = Arc::new(MemoryIndex::new());
        let fetcher = FakeFetcher::new(&[("good", "Rust has ownership. Borrowing is checked.")]);
        let ingestor = ingestor(index.clone(), fetcher, DIM);

        let stats = ingestor
            .ingest_sources(&["good".to_string(), "bad".to_string()], false)
            .await
            .unwrap();

        assert_eq!(stats.sources_ingested, 1);
        assert_eq!(stats.failed_sources.len(), 1);
        assert_eq!(stats.failed_sources[0].location, "bad");
        assert!(stats.chunks > 0);
        assert_eq!(stats.points_upserted, stats.chunks);
        assert_eq!(index.count("docs").await.unwrap(), stats.chunks);
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_validation_error() {
        let index = Arc::new(MemoryIndex::new());
        let ingestor = ingestor(index, FakeFetcher::new(&[]), DIM);

        let err = ingestor
            .ingest_sources(&["a".to_string(), "b".to_string()], false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_no_sources_is_validation_error() {
        let ingestor = ingestor(Arc::new(MemoryIndex::new()), FakeFetcher::new(&[]), DIM);
        let err = ingestor.ingest_sources(&[], false).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rerun_does_not_duplicate() {
        let index = Arc::new(MemoryIndex::new());
        let fetcher = FakeFetcher::new(&[("doc", words(23).as_str())]);
        let ingestor = ingestor(index.clone(), fetcher, DIM);
        let sources = vec!["doc".to_string()];

        let first = ingestor.ingest_sources(&sources, false).await.unwrap();
        let second = ingestor.ingest_sources(&sources, false).await.unwrap();

        assert_eq!(first.chunks, second.chunks);
        assert_eq!(index.count("docs").await.unwrap(), first.chunks);
    }

    #[tokio::test]
    async fn test_reset_removes_stale_points() {
        let index = Arc::new(MemoryIndex::new());
        let long = ingestor(index.clone(), FakeFetcher::new(&[("doc", words(40).as_str())]), DIM);
        let long_stats = long.ingest_sources(&["doc".to_string()], false).await.unwrap();

        let short = ingestor(index.clone(), FakeFetcher::new(&[("doc", words(8).as_str())]), DIM);
        let short_stats = short.ingest_sources(&["doc".to_string()], false).await.unwrap();
        assert!(short_stats.chunks < long_stats.chunks);
        // Without a reset the tail of the longer run survives.
        assert_eq!(index.count("docs").await.unwrap(), long_stats.chunks);

        short.ingest_sources(&["doc".to_string()], true).await.unwrap();
        assert_eq!(index.count("docs").await.unwrap(), short_stats.chunks);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_checked_before_create() {
        let index = Arc::new(MemoryIndex::new());
        let ingestor = ingestor(index.clone(), FakeFetcher::new(&[("doc", "Some text.")]), DIM * 2);

        let err = ingestor
            .ingest_sources(&["doc".to_string()], false)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            index.collection_info("docs").await.unwrap(),
            crate::index::CollectionLookup::NotFound
        );
    }

    #[tokio::test]
    async fn test_upserts_in_batches() {
        let index = Arc::new(MemoryIndex::new());
        let events = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
        let sink = events.clone();
        let ingestor = ingestor(index, FakeFetcher::new(&[]), DIM).with_progress(
            ProgressReporter::new(Arc::new(move |e: ProgressEvent| sink.lock().unwrap().push(e))),
        );

        let stats = ingestor
            .ingest_documents(vec![SourceDocument::new("doc", words(40))], false)
            .await
            .unwrap();

        let index_events: Vec<u64> = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.phase == "index")
            .map(|e| e.current)
            .collect();
        assert_eq!(index_events.len(), stats.chunks.div_ceil(4));
        assert_eq!(index_events.last().copied(), Some(stats.chunks as u64));
    }

    #[tokio::test]
    async fn test_blank_documents_rejected() {
        let ingestor = ingestor(Arc::new(MemoryIndex::new()), FakeFetcher::new(&[]), DIM);
        let err = ingestor
            .ingest_documents(vec![SourceDocument::new("doc", "  \n")], false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
