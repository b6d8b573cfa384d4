//! Rank fusion of the store's matches with semantic candidates

use crate::embedding::cosine_similarity;
use crate::retrieval::cache::{EmbedFailure, EmbeddingCache};
use crate::retrieval::{
    deduplicate_by_text, Candidate, Passage, RetrievalError, ScoredCandidate, Source,
};
use std::cmp::Ordering;

/// Tag and merge both candidate lists, store matches first, dropping
/// repeated texts
pub fn merge_candidates(lexical: Vec<Passage>, semantic: Vec<Passage>) -> Vec<Candidate> {
    let lexical = lexical
        .into_iter()
        .map(|passage| Candidate::new(passage, Source::Lexical));
    let semantic = semantic
        .into_iter()
        .map(|passage| Candidate::new(passage, Source::Semantic));

    deduplicate_by_text(lexical.chain(semantic))
}

/// Similarity plus the bias granted to the store's own matches
pub fn biased_score(similarity: f32, source: Source, bias: f32) -> f32 {
    match source {
        Source::Lexical => similarity + bias,
        Source::Semantic => similarity,
    }
}

/// Sort by score, best first; exact ties keep their current order
pub fn rank(mut scored: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored
}

/// Score every merged candidate against the query vector and rank them.
///
/// Candidates that cannot be embedded are kept but rank after every scored
/// candidate, in merge order.
pub(crate) fn rescore(
    candidates: Vec<Candidate>,
    query_vector: &[f32],
    embedder: &mut EmbeddingCache<'_>,
    bias: f32,
) -> Result<Vec<ScoredCandidate>, RetrievalError> {
    let mut scored = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let similarity = match embedder.document(&candidate.passage.text) {
            Ok(vector) => cosine_similarity(query_vector, vector),
            Err(EmbedFailure::Cancelled) => return Err(RetrievalError::Cancelled),
            Err(EmbedFailure::Provider(e)) => Err(e),
        };

        let (similarity, score) = match similarity {
            Ok(similarity) => (
                Some(similarity),
                biased_score(similarity, candidate.source, bias),
            ),
            Err(e) => {
                tracing::warn!(
                    "Could not rescore passage from page {}: {}",
                    candidate.passage.page_number,
                    e
                );
                (None, f32::NEG_INFINITY)
            }
        };

        scored.push(ScoredCandidate {
            candidate,
            similarity,
            score,
        });
    }

    Ok(rank(scored))
}
