//! Hybrid retrieval entry point

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::retrieval::cache::{EmbedFailure, EmbeddingCache};
use crate::retrieval::fusion::{merge_candidates, rescore};
use crate::retrieval::semantic::{semantic_candidates, SemanticPathError};
use crate::retrieval::{CancellationToken, PageNumber, QueryRequest, ScoredCandidate};
use crate::store::{StoreError, VectorStore, VectorStoreClient};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Collection not found: {name}")]
    CollectionNotFound { name: String },

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid retrieval config: {0}")]
    InvalidConfig(String),

    #[error("Retrieval cancelled")]
    Cancelled,
}

impl From<StoreError> for RetrievalError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::CollectionNotFound { name } => Self::CollectionNotFound { name },
            other => Self::Store(other),
        }
    }
}

/// Retrieves passages by fusing a collection's own top-k search with a
/// dense ranking of the whole collection.
///
/// Only collection-level failures abort a call. When the embedding provider
/// is unavailable the store's own matches are returned in their own order.
pub struct HybridRetriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    /// Fails when the threshold, bias or default k is out of range
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Result<Self, RetrievalError> {
        let errors = config.validation_errors();
        if !errors.is_empty() {
            let message = errors
                .iter()
                .map(|e| format!("{}: {}", e.path, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RetrievalError::InvalidConfig(message));
        }

        Ok(Self {
            embedding_provider,
            config,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Up to `n_results` `(passage, page)` pairs for the query, best first
    pub fn get_relevant_passage(
        &self,
        query: &str,
        collection: &dyn VectorStoreClient,
        n_results: usize,
    ) -> Result<Vec<(String, PageNumber)>, RetrievalError> {
        let request = QueryRequest::new(query, n_results)?;
        let results = self.search(&request, collection, &CancellationToken::new())?;
        Ok(into_pairs(results))
    }

    /// Open `collection_name` in `store` and retrieve from it.
    ///
    /// `n_results` falls back to the configured default.
    pub fn retrieve(
        &self,
        store: &dyn VectorStore,
        collection_name: &str,
        query: &str,
        n_results: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, PageNumber)>, RetrievalError> {
        let collection = store.collection(collection_name)?;
        let request = QueryRequest::new(query, n_results.unwrap_or(self.config.default_k))?;
        let results = self.search(&request, collection.as_ref(), cancel)?;
        Ok(into_pairs(results))
    }

    /// Full ranking with sources and scores
    pub fn search(
        &self,
        request: &QueryRequest,
        collection: &dyn VectorStoreClient,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredCandidate>, RetrievalError> {
        let k = request.k;
        let query = request.query_text.as_str();

        // Step 1: the store's own best k
        let lexical = collection.query_top_k(query, k)?;
        tracing::debug!(
            "Store returned {} passages from {}",
            lexical.len(),
            collection.name()
        );

        let mut embedder = EmbeddingCache::new(self.embedding_provider.as_ref(), cancel);

        // Step 2: query embedding; without it neither the semantic path nor
        // rescoring can run
        let query_vector = match embedder.query(query) {
            Ok(vector) => vector,
            Err(EmbedFailure::Cancelled) => return Err(RetrievalError::Cancelled),
            Err(EmbedFailure::Provider(e)) => {
                tracing::warn!("Query embedding failed, using store results only: {}", e);
                let mut unscored: Vec<ScoredCandidate> = merge_candidates(lexical, Vec::new())
                    .into_iter()
                    .map(|candidate| ScoredCandidate {
                        candidate,
                        similarity: None,
                        score: f32::NEG_INFINITY,
                    })
                    .collect();
                unscored.truncate(k);
                return Ok(unscored);
            }
        };

        // Step 3: dense ranking of the whole collection, autocut
        let semantic = match semantic_candidates(
            collection,
            &query_vector,
            &mut embedder,
            k,
            self.config.similarity_threshold,
        ) {
            Ok(passages) => passages,
            Err(SemanticPathError::Cancelled) => return Err(RetrievalError::Cancelled),
            Err(SemanticPathError::Store(e)) if e.is_collection_not_found() => {
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!("Semantic retrieval failed: {}", e);
                Vec::new()
            }
        };

        // Step 4: merge, rescore with bias, cut to k
        let merged = merge_candidates(lexical, semantic);
        let mut ranked = rescore(
            merged,
            &query_vector,
            &mut embedder,
            self.config.chroma_bias,
        )?;
        ranked.truncate(k);

        tracing::debug!(
            "Hybrid retrieval returned {} passages after {} embedding calls",
            ranked.len(),
            embedder.calls()
        );

        Ok(ranked)
    }
}

fn into_pairs(results: Vec<ScoredCandidate>) -> Vec<(String, PageNumber)> {
    results
        .into_iter()
        .map(|scored| scored.candidate.passage.into_pair())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingError, EmbeddingPurpose};
    use crate::retrieval::{Passage, Source};
    use crate::store::MemoryCollection;

    struct DownProvider;

    impl EmbeddingProvider for DownProvider {
        fn embed(&self, _text: &str, _purpose: EmbeddingPurpose) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::RequestError("503 Service Unavailable".to_string()))
        }

        fn model_name(&self) -> &str {
            "down"
        }
    }

    fn retriever() -> HybridRetriever {
        HybridRetriever::new(Arc::new(DownProvider), RetrievalConfig::default()).unwrap()
    }

    #[test]
    fn test_store_error_mapping() {
        let err: RetrievalError = StoreError::CollectionNotFound {
            name: "x".to_string(),
        }
        .into();
        assert!(matches!(err, RetrievalError::CollectionNotFound { .. }));

        let err: RetrievalError = StoreError::Http("timeout".to_string()).into();
        assert!(matches!(err, RetrievalError::Store(_)));
    }

    #[test]
    fn test_rejects_out_of_range_tuning() {
        for config in [
            RetrievalConfig::new(0.75, f32::NAN, 5),
            RetrievalConfig::new(0.75, -0.05, 5),
            RetrievalConfig::new(f32::NAN, 0.05, 5),
            RetrievalConfig::new(1.5, 0.05, 5),
            RetrievalConfig::new(0.75, 0.05, 0),
        ] {
            assert!(matches!(
                HybridRetriever::new(Arc::new(DownProvider), config),
                Err(RetrievalError::InvalidConfig(_))
            ));
        }

        assert!(HybridRetriever::new(Arc::new(DownProvider), RetrievalConfig::new(0.75, 0.0, 1)).is_ok());
    }

    #[test]
    fn test_provider_outage_keeps_store_order() {
        let collection = MemoryCollection::new(
            "test",
            vec![
                Passage::new("capital buffers", 3),
                Passage::new("capital", 1),
                Passage::new("liquidity", 2),
            ],
        );

        let request = QueryRequest::new("capital buffers", 1).unwrap();
        let results = retriever()
            .search(&request, &collection, &CancellationToken::new())
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].candidate.source, Source::Lexical);
        assert_eq!(results[0].similarity, None);
        assert_eq!(results[0].text(), "capital buffers");
    }

    #[test]
    fn test_invalid_k() {
        let collection = MemoryCollection::new("test", Vec::new());
        assert!(matches!(
            retriever().get_relevant_passage("capital", &collection, 0),
            Err(RetrievalError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_cancelled_before_embedding() {
        let collection = MemoryCollection::new("test", vec![Passage::new("capital", 1)]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = QueryRequest::new("capital", 2).unwrap();
        assert!(matches!(
            retriever().search(&request, &collection, &cancel),
            Err(RetrievalError::Cancelled)
        ));
    }
}
