//! Dense ranking over the whole collection

use crate::embedding::{cosine_similarity, EmbeddingError};
use crate::retrieval::autocut;
use crate::retrieval::cache::{EmbedFailure, EmbeddingCache};
use crate::retrieval::Passage;
use crate::store::{StoreError, VectorStoreClient};
use std::cmp::Ordering;
use thiserror::Error;

/// Why the semantic path produced nothing
#[derive(Error, Debug)]
pub enum SemanticPathError {
    #[error("Query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Collection scan failed: {0}")]
    Store(#[from] StoreError),

    #[error("Retrieval cancelled")]
    Cancelled,
}

impl From<EmbedFailure> for SemanticPathError {
    fn from(failure: EmbedFailure) -> Self {
        match failure {
            EmbedFailure::Cancelled => Self::Cancelled,
            EmbedFailure::Provider(e) => Self::Embedding(e),
        }
    }
}

/// Embed every passage in the collection, rank by cosine similarity to the
/// query and autocut to at most `k` passages at or above `threshold`.
///
/// A passage that fails to embed is skipped; the rest are still ranked.
/// Ties keep fetch order.
pub(crate) fn semantic_candidates(
    collection: &dyn VectorStoreClient,
    query_vector: &[f32],
    embedder: &mut EmbeddingCache<'_>,
    k: usize,
    threshold: f32,
) -> Result<Vec<Passage>, SemanticPathError> {
    let passages = collection.fetch_all()?;
    let mut ranked: Vec<(Passage, f32)> = Vec::with_capacity(passages.len());

    for passage in passages {
        let similarity = match embedder.document(&passage.text) {
            Ok(vector) => cosine_similarity(query_vector, vector),
            Err(EmbedFailure::Cancelled) => return Err(SemanticPathError::Cancelled),
            Err(EmbedFailure::Provider(e)) => Err(e),
        };

        match similarity {
            Ok(score) => ranked.push((passage, score)),
            Err(e) => {
                tracing::warn!(
                    "Skipping passage from page {} in semantic ranking: {}",
                    passage.page_number,
                    e
                );
            }
        }
    }

    // Vec::sort_by is stable
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    for (passage, score) in &ranked {
        tracing::debug!(
            "Score: {:.4} | Page: {} | Excluded: {}",
            score,
            passage.page_number,
            *score < threshold
        );
    }

    Ok(autocut(ranked, k, threshold))
}
