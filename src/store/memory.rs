//! In-process collections

use crate::retrieval::Passage;
use crate::store::{tokenize, StoreError, VectorStore, VectorStoreClient};
use ahash::AHashSet;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Store keeping every collection in memory.
///
/// Its top-k search ranks passages by how many distinct query words they
/// contain; passages sharing no word with the query are never returned.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, Arc<Vec<Passage>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_collection(mut self, name: impl Into<String>, passages: Vec<Passage>) -> Self {
        self.insert_collection(name, passages);
        self
    }

    /// Insert or replace a collection
    pub fn insert_collection(&mut self, name: impl Into<String>, passages: Vec<Passage>) {
        self.collections.insert(name.into(), Arc::new(passages));
    }
}

impl VectorStore for MemoryStore {
    fn collection(&self, name: &str) -> Result<Box<dyn VectorStoreClient>, StoreError> {
        let passages = self
            .collections
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::CollectionNotFound {
                name: name.to_string(),
            })?;

        Ok(Box::new(MemoryCollection {
            name: name.to_string(),
            passages,
        }))
    }

    fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.collections.keys().cloned().collect())
    }
}

/// A single in-memory collection
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    passages: Arc<Vec<Passage>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>, passages: Vec<Passage>) -> Self {
        Self {
            name: name.into(),
            passages: Arc::new(passages),
        }
    }
}

impl VectorStoreClient for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn query_top_k(&self, query_text: &str, k: usize) -> Result<Vec<Passage>, StoreError> {
        let query_tokens: AHashSet<String> = tokenize(query_text).into_iter().collect();

        let mut ranked: Vec<(usize, &Passage)> = self
            .passages
            .iter()
            .map(|passage| {
                let tokens: AHashSet<String> = tokenize(&passage.text).into_iter().collect();
                (query_tokens.intersection(&tokens).count(), passage)
            })
            .filter(|(overlap, _)| *overlap > 0)
            .collect();

        // Stable: equal overlap keeps stored order
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(_, passage)| passage.clone())
            .collect())
    }

    fn fetch_all(&self) -> Result<Vec<Passage>, StoreError> {
        Ok(self.passages.as_ref().clone())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.passages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::PageNumber;

    fn store() -> MemoryStore {
        MemoryStore::new().with_collection(
            "rekomendacja_p",
            vec![
                Passage::new("Table of Contents", 1),
                Passage::new("Risk management requires capital buffers.", 3),
                Passage::new("Capital planning and capital buffers in stress.", 4),
            ],
        )
    }

    #[test]
    fn test_missing_collection() {
        let err = store().collection("missing").err().unwrap();
        assert!(err.is_collection_not_found());
    }

    #[test]
    fn test_query_ranks_by_overlap() {
        let collection = store().collection("rekomendacja_p").unwrap();

        let results = collection.query_top_k("capital buffers stress", 5).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].page_number, PageNumber::Number(4));
        assert_eq!(results[1].page_number, PageNumber::Number(3));
    }

    #[test]
    fn test_query_respects_k() {
        let collection = store().collection("rekomendacja_p").unwrap();
        assert_eq!(collection.query_top_k("capital", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_fetch_all_keeps_order() {
        let collection = store().collection("rekomendacja_p").unwrap();
        let all = collection.fetch_all().unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(all[0].text, "Table of Contents");
        assert_eq!(collection.count().unwrap(), 3);
    }

    #[test]
    fn test_list_collections() {
        let store = store().with_collection("another", Vec::new());
        assert_eq!(
            store.list_collections().unwrap(),
            vec!["another".to_string(), "rekomendacja_p".to_string()]
        );
    }
}
