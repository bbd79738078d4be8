//! Vector index abstraction.
//!
//! A collection holds one point per chunk: the chunk's vector plus its
//! text, source, position and extra metadata. Search is two-phase: fetch
//! the `fetch_k` nearest points by the collection metric, then re-rank
//! them with MMR down to `k`.

pub mod lance;
pub mod memory;
pub mod mmr;

pub use lance::LanceDbIndex;
pub use memory::MemoryIndex;
pub use mmr::mmr_select;

use crate::types::{Chunk, CollectionSchema, RetrievalResult, SearchParams};
use async_trait::async_trait;
use grounded_core::{AppError, AppResult};

/// Outcome of looking up a collection. Backend failures are `Err`, never
/// `NotFound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionLookup {
    Found(CollectionSchema),
    NotFound,
}

/// A nearest-neighbour hit with its stored vector, for re-ranking.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    /// Similarity to the query under the collection metric
    pub similarity: f32,
}

/// Trait for vector index backends.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn backend_name(&self) -> &str;

    /// Read collection metadata.
    async fn collection_info(&self, name: &str) -> AppResult<CollectionLookup>;

    /// Create a collection. Fails if it already exists.
    async fn create_collection(&self, schema: &CollectionSchema) -> AppResult<()>;

    /// Insert or overwrite points, keyed by [`Chunk::point_id`]. One vector
    /// per chunk, same order. Everything written is visible to searches once
    /// this returns. Returns the number of points written.
    async fn upsert(&self, collection: &str, chunks: &[Chunk], vectors: &[Vec<f32>])
        -> AppResult<usize>;

    /// The `fetch_k` points nearest to `query`, most similar first.
    async fn nearest(
        &self,
        collection: &str,
        query: &[f32],
        fetch_k: usize,
    ) -> AppResult<Vec<ScoredPoint>>;

    /// Number of points in the collection.
    async fn count(&self, collection: &str) -> AppResult<usize>;

    /// Delete every point, keeping the collection and its schema.
    async fn clear(&self, collection: &str) -> AppResult<()>;

    /// Create the collection if it does not exist.
    ///
    /// Returns the schema in effect. An existing collection keeps its
    /// original schema; a dimension that disagrees with it is rejected.
    async fn ensure_collection(&self, schema: &CollectionSchema) -> AppResult<CollectionSchema> {
        match self.collection_info(&schema.name).await? {
            CollectionLookup::Found(existing) => {
                if existing.dimension != schema.dimension {
                    return Err(AppError::Validation(format!(
                        "Collection '{}' has dimension {}, embeddings have {}",
                        existing.name, existing.dimension, schema.dimension
                    )));
                }
                if existing.distance_metric != schema.distance_metric {
                    tracing::warn!(
                        collection = %existing.name,
                        existing = %existing.distance_metric,
                        requested = %schema.distance_metric,
                        "Collection already exists with a different metric; keeping it"
                    );
                }
                Ok(existing)
            }
            CollectionLookup::NotFound => {
                tracing::info!(
                    collection = %schema.name,
                    dimension = schema.dimension,
                    metric = %schema.distance_metric,
                    "Creating collection"
                );
                self.create_collection(schema).await?;
                Ok(schema.clone())
            }
        }
    }

    /// Diversity-aware search.
    ///
    /// Returns at most `min(k, fetch_k, points available)` results. A pool
    /// smaller than `k` is not an error and is not padded.
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        params: &SearchParams,
    ) -> AppResult<Vec<RetrievalResult>> {
        if params.k == 0 || params.fetch_k == 0 {
            return Ok(Vec::new());
        }
        let pool = self.nearest(collection, query, params.fetch_k).await?;
        tracing::debug!(
            collection,
            pool = pool.len(),
            k = params.k,
            lambda = params.diversity_lambda,
            "Re-ranking nearest neighbours"
        );
        Ok(mmr_select(pool, params.k, params.diversity_lambda))
    }
}

/// Shared argument checks for `upsert`.
pub(crate) fn check_upsert(
    schema: &CollectionSchema,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> AppResult<()> {
    if chunks.len() != vectors.len() {
        return Err(AppError::Validation(format!(
            "Upsert needs one vector per chunk: {} chunks, {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }
    check_dimension(schema, vectors.iter().map(Vec::len))
}

pub(crate) fn check_dimension(
    schema: &CollectionSchema,
    lengths: impl IntoIterator<Item = usize>,
) -> AppResult<()> {
    for len in lengths {
        if len != schema.dimension {
            return Err(AppError::Validation(format!(
                "Vector length {} does not match collection '{}' dimension {}",
                len, schema.name, schema.dimension
            )));
        }
    }
    Ok(())
}

/// Sort hits by descending similarity, keeping input order for ties.
pub(crate) fn sort_by_similarity(points: &mut [ScoredPoint]) {
    points.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
}
