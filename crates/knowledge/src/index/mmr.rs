//! Maximal Marginal Relevance re-ranking.
//!
//! MMR = λ × sim(candidate, query) - (1-λ) × max sim(candidate, selected)
//!
//! λ = 1.0: pure relevance
//! λ = 0.5: balanced
//! λ = 0.0: pure diversity

use super::ScoredPoint;
use crate::embeddings::cosine_similarity;
use crate::types::RetrievalResult;

/// Greedily select up to `k` candidates.
///
/// `candidates` must be ordered by descending relevance; on equal MMR
/// scores the earlier candidate wins. Candidate-to-candidate similarity is
/// cosine over the stored vectors. Returned scores are the original
/// relevance scores.
pub fn mmr_select(candidates: Vec<ScoredPoint>, k: usize, lambda: f32) -> Vec<RetrievalResult> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let lambda = lambda.clamp(0.0, 1.0);
    let k = k.min(candidates.len());

    // Max similarity to the selected set; `None` until something is selected.
    let mut remaining: Vec<(ScoredPoint, Option<f32>)> =
        candidates.into_iter().map(|c| (c, None)).collect();
    let mut selected: Vec<RetrievalResult> = Vec::with_capacity(k);

    while selected.len() < k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (idx, (candidate, max_redundancy)) in remaining.iter().enumerate() {
            let redundancy = max_redundancy.unwrap_or(0.0);
            let score = lambda * candidate.similarity - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }

        let (best, _) = remaining.remove(best_idx);

        // May go negative: anti-correlated candidates are rewarded.
        for (candidate, max_redundancy) in remaining.iter_mut() {
            let sim = cosine_similarity(&candidate.vector, &best.vector);
            *max_redundancy = Some(max_redundancy.map_or(sim, |m| m.max(sim)));
        }

        selected.push(RetrievalResult {
            chunk: best.chunk,
            similarity_score: best.similarity,
        });
    }

    selected
}
