//! Per-call embedding memo

use crate::embedding::{EmbeddingError, EmbeddingProvider, EmbeddingPurpose};
use crate::retrieval::CancellationToken;
use ahash::AHashMap;

#[derive(Debug)]
pub(crate) enum EmbedFailure {
    Cancelled,
    Provider(EmbeddingError),
}

impl From<EmbeddingError> for EmbedFailure {
    fn from(e: EmbeddingError) -> Self {
        Self::Provider(e)
    }
}

/// Embeds through a provider, remembering document vectors by text for the
/// lifetime of one retrieval call.
///
/// Providers are deterministic per text and purpose, so a passage seen by
/// the semantic scan is never embedded again when it is rescored.
pub(crate) struct EmbeddingCache<'a> {
    provider: &'a dyn EmbeddingProvider,
    cancel: &'a CancellationToken,
    documents: AHashMap<String, Vec<f32>>,
    calls: usize,
}

impl<'a> EmbeddingCache<'a> {
    pub(crate) fn new(provider: &'a dyn EmbeddingProvider, cancel: &'a CancellationToken) -> Self {
        Self {
            provider,
            cancel,
            documents: AHashMap::new(),
            calls: 0,
        }
    }

    pub(crate) fn query(&mut self, text: &str) -> Result<Vec<f32>, EmbedFailure> {
        self.call(text, EmbeddingPurpose::Query)
    }

    pub(crate) fn document(&mut self, text: &str) -> Result<&[f32], EmbedFailure> {
        if !self.documents.contains_key(text) {
            let vector = self.call(text, EmbeddingPurpose::Document)?;
            self.documents.insert(text.to_string(), vector);
        }

        Ok(self.documents.get(text).map(Vec::as_slice).unwrap_or_default())
    }

    /// Provider calls made so far
    pub(crate) fn calls(&self) -> usize {
        self.calls
    }

    fn call(&mut self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>, EmbedFailure> {
        if self.cancel.is_cancelled() {
            return Err(EmbedFailure::Cancelled);
        }
        self.calls += 1;
        Ok(self.provider.embed(text, purpose)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CountingProvider {
        seen: Mutex<Vec<(String, EmbeddingPurpose)>>,
    }

    impl EmbeddingProvider for CountingProvider {
        fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>, EmbeddingError> {
            self.seen.lock().unwrap().push((text.to_string(), purpose));
            Ok(vec![text.len() as f32, 1.0])
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_documents_are_memoized() {
        let provider = CountingProvider {
            seen: Mutex::new(Vec::new()),
        };
        let cancel = CancellationToken::new();
        let mut cache = EmbeddingCache::new(&provider, &cancel);

        cache.document("page one").unwrap();
        cache.document("page one").unwrap();
        cache.query("page one").unwrap();

        assert_eq!(cache.calls(), 2);
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].1, EmbeddingPurpose::Document);
        assert_eq!(seen[1].1, EmbeddingPurpose::Query);
    }

    #[test]
    fn test_cancelled_before_call() {
        let provider = CountingProvider {
            seen: Mutex::new(Vec::new()),
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut cache = EmbeddingCache::new(&provider, &cancel);

        assert!(matches!(cache.query("q"), Err(EmbedFailure::Cancelled)));
        assert!(provider.seen.lock().unwrap().is_empty());
    }
}
