//! Chroma-shaped query/get responses
//!
//! `query` answers a batch of queries, so its lists are nested one level
//! deeper than those of `get`. Individual entries without a document are
//! skipped; missing metadata falls back to an unknown page.

use crate::retrieval::{PageNumber, Passage};
use crate::store::StoreError;
use serde::Deserialize;
use serde_json::Value;

const PAGE_KEY: &str = "page_number";

/// Response of a top-k query for a batch of one query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Value>>>>,
}

/// Response of a full collection fetch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetResponse {
    #[serde(default)]
    pub documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Option<Value>>>,
}

impl QueryResponse {
    /// Passages for the first (only) query in the batch
    pub fn into_passages(self) -> Result<Vec<Passage>, StoreError> {
        let documents = self
            .documents
            .ok_or_else(|| StoreError::Malformed("query response without documents".to_string()))?;

        let documents = documents.into_iter().next().unwrap_or_default();
        let metadatas = self
            .metadatas
            .and_then(|batches| batches.into_iter().next())
            .unwrap_or_default();

        Ok(pair_up(documents, metadatas))
    }
}

impl GetResponse {
    pub fn into_passages(self) -> Result<Vec<Passage>, StoreError> {
        let documents = self
            .documents
            .ok_or_else(|| StoreError::Malformed("get response without documents".to_string()))?;

        Ok(pair_up(documents, self.metadatas.unwrap_or_default()))
    }
}

fn pair_up(documents: Vec<Option<String>>, metadatas: Vec<Option<Value>>) -> Vec<Passage> {
    let mut metadatas = metadatas.into_iter();
    let mut passages = Vec::with_capacity(documents.len());

    for (index, document) in documents.into_iter().enumerate() {
        // Advance metadata in lockstep even when the document is skipped
        let metadata = metadatas.next().flatten();

        let Some(text) = document else {
            tracing::warn!("Skipping store entry {} without a document", index);
            continue;
        };

        let page_number = PageNumber::from_json(metadata.as_ref().and_then(|m| m.get(PAGE_KEY)));
        passages.push(Passage { text, page_number });
    }

    passages
}
