//! Semantic segmentation.
//!
//! Text is split into sentences, each sentence is embedded together with
//! its immediate neighbours, and a segment boundary is placed wherever the
//! cosine distance between consecutive sentence embeddings exceeds a
//! threshold derived from the distribution of all such distances.

use crate::embeddings::{cosine_similarity, Embedder};
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Number of neighbouring sentences on each side embedded with a sentence.
const SENTENCE_BUFFER: usize = 1;

/// How the breakpoint threshold is derived from the distances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "amount", rename_all = "snake_case")]
pub enum BreakpointStrategy {
    /// Distances above this percentile (0-100) split
    Percentile(f32),
    /// Distances above mean + amount · standard deviation split
    StandardDeviation(f32),
    /// Distances above mean + amount · interquartile range split
    Interquartile(f32),
}

impl Default for BreakpointStrategy {
    fn default() -> Self {
        BreakpointStrategy::Percentile(95.0)
    }
}

impl BreakpointStrategy {
    /// Parse a strategy name, using the strategy's default amount when none is given.
    pub fn from_name(name: &str, amount: Option<f32>) -> AppResult<Self> {
        let strategy = match name {
            "percentile" => BreakpointStrategy::Percentile(amount.unwrap_or(95.0)),
            "standard_deviation" => BreakpointStrategy::StandardDeviation(amount.unwrap_or(3.0)),
            "interquartile" => BreakpointStrategy::Interquartile(amount.unwrap_or(1.5)),
            other => {
                return Err(AppError::Config(format!(
                    "Unknown breakpoint strategy: {}. Supported: percentile, standard_deviation, interquartile",
                    other
                )))
            }
        };

        if let BreakpointStrategy::Percentile(p) = strategy {
            if !(0.0..=100.0).contains(&p) {
                return Err(AppError::Config(format!(
                    "Percentile breakpoint must be within [0, 100], got {}",
                    p
                )));
            }
        }
        Ok(strategy)
    }

    /// Threshold over a non-empty list of distances.
    pub fn threshold(&self, distances: &[f32]) -> f32 {
        match *self {
            BreakpointStrategy::Percentile(p) => percentile(distances, p),
            BreakpointStrategy::StandardDeviation(amount) => {
                let mean = mean(distances);
                let variance =
                    distances.iter().map(|d| (d - mean).powi(2)).sum::<f32>() / distances.len() as f32;
                mean + amount * variance.sqrt()
            }
            BreakpointStrategy::Interquartile(amount) => {
                let iqr = percentile(distances, 75.0) - percentile(distances, 25.0);
                mean(distances) + amount * iqr
            }
        }
    }
}

fn mean(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len() as f32
}

/// Percentile with linear interpolation between closest ranks.
fn percentile(values: &[f32], p: f32) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p / 100.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f32)
}

/// Split text into trimmed, non-empty sentences (Unicode sentence boundaries).
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split_sentence_bounds()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Each sentence joined with up to `buffer` neighbours on either side.
fn with_neighbours(sentences: &[String], buffer: usize) -> Vec<String> {
    (0..sentences.len())
        .map(|i| {
            let start = i.saturating_sub(buffer);
            let end = (i + buffer + 1).min(sentences.len());
            sentences[start..end].join(" ")
        })
        .collect()
}

/// Indices `i` such that a boundary falls between sentence `i` and `i + 1`.
fn breakpoints(distances: &[f32], threshold: f32) -> Vec<usize> {
    distances
        .iter()
        .enumerate()
        .filter(|(_, d)| **d > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Split `text` into semantically coherent segments. Never returns an
/// empty segment; returns nothing for blank text.
pub async fn semantic_segments(
    text: &str,
    embedder: &Embedder,
    strategy: BreakpointStrategy,
) -> AppResult<Vec<String>> {
    let sentences = split_sentences(text);
    if sentences.len() < 2 {
        return Ok(sentences);
    }

    let combined = with_neighbours(&sentences, SENTENCE_BUFFER);
    let embeddings = embedder.embed_passages(&combined).await?;

    let distances: Vec<f32> = embeddings
        .windows(2)
        .map(|pair| 1.0 - cosine_similarity(&pair[0], &pair[1]))
        .collect();

    let threshold = strategy.threshold(&distances);
    let cuts = breakpoints(&distances, threshold);
    tracing::trace!(
        sentences = sentences.len(),
        threshold,
        breakpoints = cuts.len(),
        "Semantic segmentation"
    );

    let mut segments = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        segments.push(sentences[start..=cut].join(" "));
        start = cut + 1;
    }
    segments.push(sentences[start..].join(" "));

    Ok(segments)
}
