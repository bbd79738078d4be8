//! LanceDB-backed vector index.
//!
//! One table per collection. The collection's dimension lives in the
//! vector column type and its distance metric in the table schema
//! metadata, so a reopened table reports the schema it was created with.

use super::{check_dimension, check_upsert, sort_by_similarity, CollectionLookup, ScoredPoint, VectorIndex};
use crate::types::{Chunk, ChunkExtra, CollectionSchema, DistanceMetric};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use futures::TryStreamExt;
use grounded_core::{AppError, AppResult};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

const VECTOR_COLUMN: &str = "vector";
const METRIC_METADATA_KEY: &str = "grounded.distance_metric";

/// LanceDB-backed vector index.
pub struct LanceDbIndex {
    conn: Connection,
    uri: String,
}

impl LanceDbIndex {
    /// Connect to a LanceDB database.
    ///
    /// `uri` is a local directory or an object store URI. Local directories
    /// are created if missing. `storage_options` is passed through to the
    /// object store.
    pub async fn connect(uri: &str, storage_options: &BTreeMap<String, String>) -> AppResult<Self> {
        if !uri.contains("://") {
            std::fs::create_dir_all(Path::new(uri)).map_err(|e| {
                AppError::Index(format!("Failed to create index directory {}: {}", uri, e))
            })?;
        }

        let conn = lancedb::connect(uri)
            .storage_options(storage_options.clone())
            .execute()
            .await
            .map_err(|e| AppError::unavailable("lancedb", format!("Failed to connect to {}: {}", uri, e)))?;

        tracing::debug!("Connected to LanceDB at {}", uri);

        Ok(Self {
            conn,
            uri: uri.to_string(),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    async fn open(&self, name: &str) -> AppResult<Table> {
        self.conn
            .open_table(name)
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to open collection '{}': {}", name, e)))
    }

    async fn open_with_schema(&self, name: &str) -> AppResult<(Table, CollectionSchema)> {
        let table = self.open(name).await?;
        let arrow_schema = table
            .schema()
            .await
            .map_err(|e| AppError::Index(format!("Failed to read schema of '{}': {}", name, e)))?;
        let schema = collection_schema(name, &arrow_schema)?;
        Ok((table, schema))
    }
}

/// Arrow schema of a collection table.
fn table_schema(schema: &CollectionSchema) -> SchemaRef {
    let metadata = HashMap::from([(
        METRIC_METADATA_KEY.to_string(),
        schema.distance_metric.as_str().to_string(),
    )]);

    Arc::new(Schema::new_with_metadata(
        vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("sequence_index", DataType::UInt32, false),
            Field::new("text", DataType::Utf8, false),
            // Serialized ChunkExtra
            Field::new("extra", DataType::Utf8, false),
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    schema.dimension as i32,
                ),
                false,
            ),
        ],
        metadata,
    ))
}

/// Recover the collection schema from a table schema. Tables without the
/// metric in their metadata are treated as cosine.
fn collection_schema(name: &str, arrow_schema: &Schema) -> AppResult<CollectionSchema> {
    let dimension = match arrow_schema
        .field_with_name(VECTOR_COLUMN)
        .map(|f| f.data_type().clone())
    {
        Ok(DataType::FixedSizeList(_, size)) if size > 0 => size as usize,
        _ => {
            return Err(AppError::Index(format!(
                "Collection '{}' has no usable '{}' column",
                name, VECTOR_COLUMN
            )))
        }
    };

    let distance_metric = match arrow_schema.metadata().get(METRIC_METADATA_KEY) {
        Some(metric) => metric.parse()?,
        None => DistanceMetric::Cosine,
    };

    Ok(CollectionSchema::new(name, dimension, distance_metric))
}

fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::Dot => DistanceType::Dot,
        DistanceMetric::Euclidean => DistanceType::L2,
    }
}

fn to_batch(
    schema: &CollectionSchema,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> AppResult<RecordBatch> {
    let ids: Vec<String> = chunks.iter().map(Chunk::point_id).collect();
    let extras = chunks
        .iter()
        .map(|c| serde_json::to_string(&c.extra))
        .collect::<Result<Vec<_>, _>>()?;

    let values = Float32Array::from(vectors.concat());
    let vector_array = FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float32, true)),
        schema.dimension as i32,
        Arc::new(values),
        None,
    )
    .map_err(|e| AppError::Index(format!("Failed to build vector column: {}", e)))?;

    RecordBatch::try_new(
        table_schema(schema),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.source.as_str()))),
            Arc::new(UInt32Array::from_iter_values(chunks.iter().map(|c| c.sequence_index))),
            Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.text.as_str()))),
            Arc::new(StringArray::from(extras)),
            Arc::new(vector_array),
        ],
    )
    .map_err(|e| AppError::Index(format!("Failed to create RecordBatch: {}", e)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| AppError::Index(format!("Invalid {} column", name)))
}

/// Convert every row of a result batch into a chunk and its stored vector.
fn from_batch(batch: &RecordBatch) -> AppResult<Vec<(Chunk, Vec<f32>)>> {
    let sources = string_column(batch, "source")?;
    let texts = string_column(batch, "text")?;
    let extras = string_column(batch, "extra")?;
    let sequence = batch
        .column_by_name("sequence_index")
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| AppError::Index("Invalid sequence_index column".to_string()))?;
    let vectors = batch
        .column_by_name(VECTOR_COLUMN)
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| AppError::Index("Invalid vector column".to_string()))?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let values = vectors.value(row);
        let values = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| AppError::Index("Invalid vector values".to_string()))?;

        let extra: ChunkExtra = serde_json::from_str(extras.value(row))?;
        let chunk = Chunk {
            text: texts.value(row).to_string(),
            source: sources.value(row).to_string(),
            sequence_index: sequence.value(row),
            extra,
        };
        rows.push((chunk, values.values().to_vec()));
    }
    Ok(rows)
}

#[async_trait]
impl VectorIndex for LanceDbIndex {
    fn backend_name(&self) -> &str {
        "lancedb"
    }

    async fn collection_info(&self, name: &str) -> AppResult<CollectionLookup> {
        let table_names = self
            .conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::unavailable("lancedb", format!("Failed to list tables: {}", e)))?;

        if !table_names.iter().any(|t| t == name) {
            return Ok(CollectionLookup::NotFound);
        }
        let (_, schema) = self.open_with_schema(name).await?;
        Ok(CollectionLookup::Found(schema))
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> AppResult<()> {
        if schema.dimension == 0 {
            return Err(AppError::Validation(
                "Collection dimension must be positive".to_string(),
            ));
        }

        let arrow_schema = table_schema(schema);
        let empty_batch = RecordBatch::new_empty(arrow_schema.clone());
        self.conn
            .create_table(
                &schema.name,
                RecordBatchIterator::new(vec![Ok(empty_batch)], arrow_schema),
            )
            .execute()
            .await
            .map_err(|e| {
                AppError::Index(format!("Failed to create collection '{}': {}", schema.name, e))
            })?;
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> AppResult<usize> {
        let (table, schema) = self.open_with_schema(collection).await?;
        check_upsert(&schema, chunks, vectors)?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let batch = to_batch(&schema, chunks, vectors)?;
        let batch_schema = batch.schema();

        let mut merge = table.merge_insert(&["id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge
            .execute(Box::new(RecordBatchIterator::new(vec![Ok(batch)], batch_schema)))
            .await
            .map_err(|e| AppError::Index(format!("Failed to upsert into '{}': {}", collection, e)))?;

        tracing::debug!("Upserted {} points into {}", chunks.len(), collection);
        Ok(chunks.len())
    }

    async fn nearest(
        &self,
        collection: &str,
        query: &[f32],
        fetch_k: usize,
    ) -> AppResult<Vec<ScoredPoint>> {
        let (table, schema) = self.open_with_schema(collection).await?;
        check_dimension(&schema, [query.len()])?;

        if fetch_k == 0 || self.count(collection).await? == 0 {
            return Ok(Vec::new());
        }

        let batches = table
            .query()
            .nearest_to(query.to_vec())
            .map_err(|e| AppError::Index(format!("Failed to create query: {}", e)))?
            .column(VECTOR_COLUMN)
            .distance_type(distance_type(schema.distance_metric))
            .limit(fetch_k)
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::Index(format!("Failed to collect results: {}", e)))?;

        let mut points = Vec::new();
        for batch in &batches {
            for (chunk, vector) in from_batch(batch)? {
                // Same scale as MemoryIndex: similarity, not distance
                let similarity = schema.distance_metric.similarity(query, &vector);
                points.push(ScoredPoint {
                    chunk,
                    vector,
                    similarity,
                });
            }
        }

        sort_by_similarity(&mut points);
        points.truncate(fetch_k);
        tracing::debug!("Retrieved {} points (requested {})", points.len(), fetch_k);
        Ok(points)
    }

    async fn count(&self, collection: &str) -> AppResult<usize> {
        let table = self.open(collection).await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Index(format!("Failed to count rows: {}", e)))
    }

    async fn clear(&self, collection: &str) -> AppResult<()> {
        let table = self.open(collection).await?;
        if table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Index(format!("Failed to count rows: {}", e)))?
            > 0
        {
            table
                .delete("id IS NOT NULL")
                .await
                .map_err(|e| AppError::Index(format!("Failed to clear '{}': {}", collection, e)))?;
        }
        tracing::info!("Cleared collection {}", collection);
        Ok(())
    }
}
