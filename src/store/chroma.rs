//! Chroma server client (v1 REST API)

use crate::embedding::{EmbeddingProvider, EmbeddingPurpose};
use crate::retrieval::Passage;
use crate::store::{GetResponse, QueryResponse, StoreError, VectorStore, VectorStoreClient};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
    name: String,
}

/// Collections served by a Chroma instance.
///
/// Chroma's REST API only accepts query embeddings, so queries are
/// embedded here with the same provider that built the collection. An
/// embedding outage therefore fails `query_top_k` itself, and with it the
/// whole retrieval call, instead of degrading to the store's own matches.
#[derive(Clone)]
pub struct ChromaStore {
    client: Client,
    base_url: String,
    provider: Arc<dyn EmbeddingProvider>,
}

impl ChromaStore {
    pub fn new(
        base_url: &str,
        provider: Arc<dyn EmbeddingProvider>,
        timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| StoreError::Http(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            provider,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }
}

impl VectorStore for ChromaStore {
    fn collection(&self, name: &str) -> Result<Box<dyn VectorStoreClient>, StoreError> {
        let response = self
            .client
            .get(self.url(&format!("collections/{}", name)))
            .send()
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let info: CollectionInfo = read_json(response, Some(name))?;
        tracing::debug!("Opened chroma collection {} ({})", info.name, info.id);

        Ok(Box::new(ChromaCollection {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            id: info.id,
            name: info.name,
            provider: Arc::clone(&self.provider),
        }))
    }

    fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let response = self
            .client
            .get(self.url("collections"))
            .send()
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let collections: Vec<CollectionInfo> = read_json(response, None)?;
        Ok(collections.into_iter().map(|c| c.name).collect())
    }
}

/// One collection on a Chroma server
pub struct ChromaCollection {
    client: Client,
    base_url: String,
    id: String,
    name: String,
    provider: Arc<dyn EmbeddingProvider>,
}

impl ChromaCollection {
    fn url(&self, action: &str) -> String {
        format!("{}/api/v1/collections/{}/{}", self.base_url, self.id, action)
    }

    fn post<T: DeserializeOwned>(&self, action: &str, body: serde_json::Value) -> Result<T, StoreError> {
        let response = self
            .client
            .post(self.url(action))
            .json(&body)
            .send()
            .map_err(|e| StoreError::Http(e.to_string()))?;

        read_json(response, Some(&self.name))
    }
}

impl VectorStoreClient for ChromaCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn query_top_k(&self, query_text: &str, k: usize) -> Result<Vec<Passage>, StoreError> {
        let embedding = self.provider.embed(query_text, EmbeddingPurpose::Query)?;

        let response: QueryResponse = self.post(
            "query",
            json!({
                "query_embeddings": [embedding],
                "n_results": k,
                "include": ["documents", "metadatas"],
            }),
        )?;

        response.into_passages()
    }

    fn fetch_all(&self) -> Result<Vec<Passage>, StoreError> {
        let response: GetResponse = self.post(
            "get",
            json!({
                "include": ["documents", "metadatas"],
            }),
        )?;

        response.into_passages()
    }

    fn count(&self) -> Result<usize, StoreError> {
        let response = self
            .client
            .get(self.url("count"))
            .send()
            .map_err(|e| StoreError::Http(e.to_string()))?;

        read_json(response, Some(&self.name))
    }
}

fn read_json<T: DeserializeOwned>(response: Response, collection: Option<&str>) -> Result<T, StoreError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| StoreError::Http(e.to_string()))?;

    if !status.is_success() {
        if let Some(name) = collection {
            if is_missing_collection(status, &body) {
                return Err(StoreError::CollectionNotFound {
                    name: name.to_string(),
                });
            }
        }
        return Err(StoreError::Http(format!("Chroma returned {}: {}", status, body)));
    }

    serde_json::from_str(&body).map_err(|e| StoreError::Malformed(e.to_string()))
}

/// Older Chroma servers answer a missing collection with a 500 and a
/// `ValueError` message instead of a 404
fn is_missing_collection(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND || body.contains("does not exist")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;

    struct Unreachable;

    impl EmbeddingProvider for Unreachable {
        fn embed(&self, _text: &str, _purpose: EmbeddingPurpose) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::RequestError("connection refused".to_string()))
        }

        fn model_name(&self) -> &str {
            "unreachable"
        }
    }

    #[test]
    fn test_missing_collection_detection() {
        assert!(is_missing_collection(StatusCode::NOT_FOUND, ""));
        assert!(is_missing_collection(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"ValueError('Collection rekomendacja_p does not exist.')"}"#
        ));
        assert!(!is_missing_collection(
            StatusCode::INTERNAL_SERVER_ERROR,
            "database is locked"
        ));
    }

    #[test]
    fn test_query_needs_embedding() {
        let collection = ChromaCollection {
            client: Client::new(),
            base_url: "http://127.0.0.1:9".to_string(),
            id: "c0ffee".to_string(),
            name: "rekomendacja_p".to_string(),
            provider: Arc::new(Unreachable),
        };

        assert!(matches!(
            collection.query_top_k("capital buffers", 3),
            Err(StoreError::Embedding(_))
        ));
    }
}
