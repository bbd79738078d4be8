//! In-process vector index.
//!
//! Exact nearest-neighbour search over everything held in memory. Used for
//! tests and for one-shot runs that do not need persistence.

use super::{check_dimension, check_upsert, sort_by_similarity, CollectionLookup, ScoredPoint, VectorIndex};
use crate::types::{Chunk, CollectionSchema};
use async_trait::async_trait;
use grounded_core::{AppError, AppResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
struct Collection {
    schema: CollectionSchema,
    /// Keyed by point id; ordered so equal scores come back deterministically
    points: BTreeMap<String, (Chunk, Vec<f32>)>,
}

/// Vector index backed by a map of collections.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .read()
            .map_err(|_| AppError::Index("In-memory index lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .write()
            .map_err(|_| AppError::Index("In-memory index lock poisoned".to_string()))
    }
}

fn missing(name: &str) -> AppError {
    AppError::Index(format!("Collection '{}' does not exist", name))
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn collection_info(&self, name: &str) -> AppResult<CollectionLookup> {
        Ok(match self.read()?.get(name) {
            Some(collection) => CollectionLookup::Found(collection.schema.clone()),
            None => CollectionLookup::NotFound,
        })
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> AppResult<()> {
        let mut collections = self.write()?;
        if collections.contains_key(&schema.name) {
            return Err(AppError::Index(format!(
                "Collection '{}' already exists",
                schema.name
            )));
        }
        collections.insert(
            schema.name.clone(),
            Collection {
                schema: schema.clone(),
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> AppResult<usize> {
        let mut collections = self.write()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        check_upsert(&target.schema, chunks, vectors)?;

        for (chunk, vector) in chunks.iter().zip(vectors) {
            target
                .points
                .insert(chunk.point_id(), (chunk.clone(), vector.clone()));
        }
        Ok(chunks.len())
    }

    async fn nearest(
        &self,
        collection: &str,
        query: &[f32],
        fetch_k: usize,
    ) -> AppResult<Vec<ScoredPoint>> {
        let collections = self.read()?;
        let target = collections.get(collection).ok_or_else(|| missing(collection))?;
        check_dimension(&target.schema, [query.len()])?;

        let metric = target.schema.distance_metric;
        let mut points: Vec<ScoredPoint> = target
            .points
            .values()
            .map(|(chunk, vector)| ScoredPoint {
                chunk: chunk.clone(),
                vector: vector.clone(),
                similarity: metric.similarity(query, vector),
            })
            .collect();

        sort_by_similarity(&mut points);
        points.truncate(fetch_k);
        Ok(points)
    }

    async fn count(&self, collection: &str) -> AppResult<usize> {
        let collections = self.read()?;
        let target = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(target.points.len())
    }

    async fn clear(&self, collection: &str) -> AppResult<()> {
        let mut collections = self.write()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        target.points.clear();
        Ok(())
    }
}
