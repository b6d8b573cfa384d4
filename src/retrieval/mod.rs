//! Hybrid retrieval and reranking
//!
//! Combines a collection's own top-k search with a dense re-embedding of the
//! whole collection, deduplicates by passage text, and rescores every survivor
//! against the query with a bias towards the store's own matches.

mod autocut;
mod cache;
mod cancel;
mod deduplication;
mod fusion;
mod hybrid;
mod passage;
mod semantic;

pub use autocut::autocut;
pub use cancel::CancellationToken;
pub use deduplication::deduplicate_by_text;
pub use fusion::{biased_score, merge_candidates, rank};
pub use hybrid::{HybridRetriever, RetrievalError};
pub use passage::{Candidate, PageNumber, Passage, ScoredCandidate, Source};
pub use semantic::SemanticPathError;

use serde::{Deserialize, Serialize};

/// A retrieval request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Query text
    pub query_text: String,

    /// Bounds the store's top-k, the semantic autocut and the final result
    pub k: usize,
}

impl QueryRequest {
    pub fn new(query_text: impl Into<String>, k: usize) -> Result<Self, RetrievalError> {
        let query_text = query_text.into();

        if query_text.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }
        if k == 0 {
            return Err(RetrievalError::InvalidQuery(
                "k must be at least 1".to_string(),
            ));
        }

        Ok(Self { query_text, k })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_validation() {
        assert!(QueryRequest::new("capital buffers", 2).is_ok());
        assert!(matches!(
            QueryRequest::new("   ", 2),
            Err(RetrievalError::InvalidQuery(_))
        ));
        assert!(matches!(
            QueryRequest::new("capital buffers", 0),
            Err(RetrievalError::InvalidQuery(_))
        ));
    }
}
