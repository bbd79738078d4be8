//! Ingestion-time text segmentation.
//!
//! Two stages per source: semantic segmentation into coherent runs of
//! sentences, then fixed-size overlapping word windows within each segment.
//! Each window becomes one [`Chunk`].

pub mod corpus;
pub mod semantic;
pub mod window;

pub use corpus::{parse_corpus, render_corpus, SourceDocument};
pub use semantic::{semantic_segments, split_sentences, BreakpointStrategy};
pub use window::overlap_windows;

use crate::embeddings::Embedder;
use crate::types::Chunk;
use grounded_core::config::SegmentationSettings;
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    pub target_words: usize,
    pub overlap_ratio: f32,
    pub breakpoint: BreakpointStrategy,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            target_words: 300,
            overlap_ratio: 0.2,
            breakpoint: BreakpointStrategy::default(),
        }
    }
}

impl SegmenterConfig {
    pub fn from_settings(settings: &SegmentationSettings) -> AppResult<Self> {
        Ok(Self {
            target_words: settings.target_words,
            overlap_ratio: settings.overlap_ratio,
            breakpoint: BreakpointStrategy::from_name(
                &settings.breakpoint,
                settings.breakpoint_amount,
            )?,
        })
    }

    fn validate(&self) -> AppResult<()> {
        if self.target_words == 0 {
            return Err(AppError::Validation(
                "target_words must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.overlap_ratio) {
            return Err(AppError::Validation(format!(
                "overlap_ratio must be within [0, 1), got {}",
                self.overlap_ratio
            )));
        }
        Ok(())
    }
}

/// Turns source documents into chunks.
#[derive(Debug, Clone)]
pub struct TextSegmenter {
    embedder: Embedder,
    config: SegmenterConfig,
}

/// Output of segmenting a batch of documents.
#[derive(Debug, Clone, Default)]
pub struct Segmented {
    pub segments: usize,
    pub chunks: Vec<Chunk>,
}

impl TextSegmenter {
    pub fn new(embedder: Embedder, config: SegmenterConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { embedder, config })
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Semantic stage only.
    pub async fn segment(&self, text: &str) -> AppResult<Vec<String>> {
        semantic_segments(text, &self.embedder, self.config.breakpoint).await
    }

    /// Windowing stage only.
    pub fn windows(&self, segment: &str) -> Vec<String> {
        overlap_windows(segment, self.config.target_words, self.config.overlap_ratio)
    }

    /// Segment and window every document.
    ///
    /// Sequence indexes run across all segments of a source, and continue
    /// when the same source appears in more than one document.
    pub async fn chunk_documents(&self, documents: &[SourceDocument]) -> AppResult<Segmented> {
        let mut next_index: HashMap<&str, u32> = HashMap::new();
        let mut out = Segmented::default();

        for doc in documents {
            let segments = self.segment(&doc.text).await?;
            let counter = next_index.entry(doc.source.as_str()).or_insert(0);

            for (segment_index, segment) in segments.iter().enumerate() {
                out.segments += 1;
                for window in self.windows(segment) {
                    let mut chunk = Chunk::new(window, doc.source.clone(), *counter);
                    chunk
                        .extra
                        .insert("segment_index", segment_index.to_string())?;
                    chunk
                        .extra
                        .insert("content_hash", content_hash(&chunk.text))?;
                    out.chunks.push(chunk);
                    *counter += 1;
                }
            }

            tracing::debug!(
                source = %doc.source,
                segments = segments.len(),
                next_index = *counter,
                "Segmented source"
            );
        }

        Ok(out)
    }
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::HashingBackend;
    use std::sync::Arc;

    fn segmenter(target_words: usize) -> TextSegmenter {
        let embedder = Embedder::new(Arc::new(HashingBackend::new(128)), 32).unwrap();
        TextSegmenter::new(
            embedder,
            SegmenterConfig {
                target_words,
                ..SegmenterConfig::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_cat_and_dog_chunks() {
        let out = segmenter(3)
            .chunk_documents(&[SourceDocument::new("pets", "The cat sat. The dog ran.")])
            .await
            .unwrap();

        let texts: Vec<&str> = out.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["The cat sat.", "sat. The dog", "dog ran."]);
        let indexes: Vec<u32> = out.chunks.iter().map(|c| c.sequence_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(out.chunks.iter().all(|c| c.source == "pets"));
    }

    #[tokio::test]
    async fn test_short_document_is_one_chunk() {
        let out = segmenter(300)
            .chunk_documents(&[SourceDocument::new("s", "A short note.")])
            .await
            .unwrap();
        assert_eq!(out.segments, 1);
        assert_eq!(out.chunks.len(), 1);
        assert_eq!(out.chunks[0].text, "A short note.");
        assert_eq!(out.chunks[0].extra.get("segment_index"), Some("0"));
        assert_eq!(
            out.chunks[0].extra.get("content_hash").map(str::len),
            Some(64)
        );
    }

    #[tokio::test]
    async fn test_indexes_are_per_source_and_continue() {
        let docs = vec![
            SourceDocument::new("a", "one two three four five six"),
            SourceDocument::new("b", "seven eight"),
            SourceDocument::new("a", "nine ten"),
        ];
        let out = segmenter(4).chunk_documents(&docs).await.unwrap();

        let a: Vec<u32> = out
            .chunks
            .iter()
            .filter(|c| c.source == "a")
            .map(|c| c.sequence_index)
            .collect();
        let b: Vec<u32> = out
            .chunks
            .iter()
            .filter(|c| c.source == "b")
            .map(|c| c.sequence_index)
            .collect();

        assert_eq!(a, (0..a.len() as u32).collect::<Vec<_>>());
        assert_eq!(b, vec![0]);
        assert!(out.chunks.iter().all(|c| !c.text.is_empty()));
    }

    #[tokio::test]
    async fn test_blank_document_yields_no_chunks() {
        let out = segmenter(300)
            .chunk_documents(&[SourceDocument::new("blank", "   ")])
            .await
            .unwrap();
        assert!(out.chunks.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let embedder = Embedder::new(Arc::new(HashingBackend::new(8)), 32).unwrap();
        let zero = SegmenterConfig {
            target_words: 0,
            ..SegmenterConfig::default()
        };
        assert!(TextSegmenter::new(embedder.clone(), zero).is_err());

        let full_overlap = SegmenterConfig {
            overlap_ratio: 1.0,
            ..SegmenterConfig::default()
        };
        assert!(TextSegmenter::new(embedder, full_overlap).is_err());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = SegmentationSettings {
            breakpoint: "standard_deviation".to_string(),
            ..SegmentationSettings::default()
        };
        let config = SegmenterConfig::from_settings(&settings).unwrap();
        assert_eq!(config.breakpoint, BreakpointStrategy::StandardDeviation(3.0));
        assert_eq!(config.target_words, 300);
    }
}
