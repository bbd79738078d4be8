//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use crate::embeddings::{cosine_similarity, dot};
use grounded_core::config::RetrievalSettings;
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Upper bound on free-form metadata entries per chunk.
pub const MAX_EXTRA_ENTRIES: usize = 16;

/// Bounded string-to-string metadata attached to a chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkExtra(BTreeMap<String, String>);

impl ChunkExtra {
    /// Insert or replace an entry. Adding a new key past
    /// [`MAX_EXTRA_ENTRIES`] is rejected.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> AppResult<()> {
        let key = key.into();
        if !self.0.contains_key(&key) && self.0.len() >= MAX_EXTRA_ENTRIES {
            return Err(AppError::Validation(format!(
                "Chunk metadata is limited to {} entries; cannot add '{}'",
                MAX_EXTRA_ENTRIES, key
            )));
        }
        self.0.insert(key, value.into());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// A unit of retrievable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Window text; never empty
    pub text: String,

    /// Identifier of the source the text came from
    pub source: String,

    /// Position of this chunk within its source for one ingestion run
    pub sequence_index: u32,

    #[serde(default)]
    pub extra: ChunkExtra,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>, sequence_index: u32) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            sequence_index,
            extra: ChunkExtra::default(),
        }
    }

    /// Stable point id derived from source and position, so a re-run over
    /// the same corpus overwrites instead of duplicating.
    pub fn point_id(&self) -> String {
        let name = format!("grounded:{}#{}", self.source, self.sequence_index);
        Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
    }
}

/// Distance metric of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Dot,
    Euclidean,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Dot => "dot",
            DistanceMetric::Euclidean => "euclidean",
        }
    }

    /// Similarity between two vectors under this metric; larger is closer.
    ///
    /// Euclidean similarity is `1 - d²/2`, which over unit vectors equals
    /// the cosine.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::Dot => dot(a, b),
            DistanceMetric::Euclidean => {
                let squared: f32 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
                1.0 - squared / 2.0
            }
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "dot" => Ok(DistanceMetric::Dot),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            other => Err(AppError::Config(format!(
                "Unknown distance metric: {}",
                other
            ))),
        }
    }
}

/// Shape of a collection. Created once and never altered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub dimension: usize,
    pub distance_metric: DistanceMetric,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, dimension: usize, distance_metric: DistanceMetric) -> Self {
        Self {
            name: name.into(),
            dimension,
            distance_metric,
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub similarity_score: f32,
}

/// Parameters of a diversity-aware search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Number of results to return
    pub k: usize,

    /// Size of the nearest-neighbour pool to re-rank
    pub fetch_k: usize,

    /// 1.0 ranks by relevance only, 0.0 by diversity only
    pub diversity_lambda: f32,
}

impl SearchParams {
    /// Reject values outside the ranges accepted from configuration.
    pub fn validate(&self) -> AppResult<()> {
        if self.k == 0 {
            return Err(AppError::Validation("k must be positive".to_string()));
        }
        if self.fetch_k == 0 {
            return Err(AppError::Validation("fetch_k must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.diversity_lambda) {
            return Err(AppError::Validation(format!(
                "diversity_lambda must be within [0, 1], got {}",
                self.diversity_lambda
            )));
        }
        Ok(())
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::from(&RetrievalSettings::default())
    }
}

impl From<&RetrievalSettings> for SearchParams {
    fn from(settings: &RetrievalSettings) -> Self {
        Self {
            k: settings.k,
            fetch_k: settings.fetch_k,
            diversity_lambda: settings.diversity_lambda,
        }
    }
}

/// A source that could not be fetched during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSource {
    pub location: String,
    pub error: String,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    pub collection: String,
    pub sources_ingested: usize,
    pub failed_sources: Vec<FailedSource>,
    pub segments: usize,
    pub chunks: usize,
    pub points_upserted: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_stable() {
        let a = Chunk::new("first text", "https://example.com/a", 3);
        let b = Chunk::new("rewritten text", "https://example.com/a", 3);
        let c = Chunk::new("first text", "https://example.com/a", 4);

        assert_eq!(a.point_id(), b.point_id());
        assert_ne!(a.point_id(), c.point_id());
        assert!(Uuid::parse_str(&a.point_id()).is_ok());
    }

    #[test]
    fn test_extra_is_bounded() {
        let mut extra = ChunkExtra::default();
        for i in 0..MAX_EXTRA_ENTRIES {
            extra.insert(format!("k{}", i), "v").unwrap();
        }
        assert!(extra.insert("one-too-many", "v").is_err());
        // Replacing an existing key is still allowed at the bound.
        assert!(extra.insert("k0", "updated").is_ok());
        assert_eq!(extra.get("k0"), Some("updated"));
        assert_eq!(extra.len(), MAX_EXTRA_ENTRIES);
    }

    #[test]
    fn test_extra_serializes_as_map() {
        let mut chunk = Chunk::new("t", "s", 0);
        chunk.extra.insert("content_hash", "abc").unwrap();
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["extra"]["content_hash"], "abc");
    }

    #[test]
    fn test_distance_metric_parse() {
        assert_eq!("Cosine".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("l2".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn test_metric_similarity() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let c = [0.6, 0.8];

        assert!(DistanceMetric::Cosine.similarity(&a, &b).abs() < 1e-6);
        assert!((DistanceMetric::Dot.similarity(&a, &c) - 0.6).abs() < 1e-6);
        // Over unit vectors euclidean similarity matches cosine.
        assert!((DistanceMetric::Euclidean.similarity(&a, &c) - 0.6).abs() < 1e-6);
        assert!((DistanceMetric::Euclidean.similarity(&c, &c) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_params_default() {
        let params = SearchParams::default();
        assert_eq!(params.k, 4);
        assert_eq!(params.fetch_k, 20);
        assert!((params.diversity_lambda - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_search_params_validate() {
        assert!(SearchParams::default().validate().is_ok());

        // fetch_k below k is allowed
        let small_pool = SearchParams {
            k: 5,
            fetch_k: 2,
            diversity_lambda: 1.0,
        };
        assert!(small_pool.validate().is_ok());

        for bad in [
            SearchParams { diversity_lambda: 7.0, ..SearchParams::default() },
            SearchParams { diversity_lambda: -0.1, ..SearchParams::default() },
            SearchParams { diversity_lambda: f32::NAN, ..SearchParams::default() },
            SearchParams { k: 0, ..SearchParams::default() },
            SearchParams { fetch_k: 0, ..SearchParams::default() },
        ] {
            assert!(matches!(bad.validate(), Err(AppError::Validation(_))));
        }
    }
}
