//! Read-side access to per-document passage collections
//!
//! Retrieval only needs two things from a collection: the store's own
//! best-k matches for a query, and a full scan. Everything else here
//! (creating and filling collections) serves ingestion.

mod chroma;
mod memory;
mod response;
mod sqlite;

pub use chroma::{ChromaCollection, ChromaStore};
pub use memory::{MemoryCollection, MemoryStore};
pub use response::{GetResponse, QueryResponse};
pub use sqlite::{SqliteCollection, SqliteStore};

use crate::embedding::EmbeddingError;
use crate::retrieval::Passage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Collection not found: {name}")]
    CollectionNotFound { name: String },

    #[error("Collection already exists: {name}")]
    CollectionExists { name: String },

    #[error("Malformed store response: {0}")]
    Malformed(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Store request failed: {0}")]
    Http(String),

    #[error("Query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },
}

impl StoreError {
    pub fn is_collection_not_found(&self) -> bool {
        matches!(self, Self::CollectionNotFound { .. })
    }
}

/// One opened collection
pub trait VectorStoreClient: Send + Sync {
    /// Collection name
    fn name(&self) -> &str;

    /// The store's own best `k` matches for the query, best first
    fn query_top_k(&self, query_text: &str, k: usize) -> Result<Vec<Passage>, StoreError>;

    /// Every passage in the collection, in stored order
    fn fetch_all(&self) -> Result<Vec<Passage>, StoreError>;

    /// Number of passages in the collection
    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.fetch_all()?.len())
    }
}

/// A store holding named collections
pub trait VectorStore: Send + Sync {
    /// Open a collection, failing with `CollectionNotFound` if it does not exist
    fn collection(&self, name: &str) -> Result<Box<dyn VectorStoreClient>, StoreError>;

    /// Names of all collections
    fn list_collections(&self) -> Result<Vec<String>, StoreError>;
}

/// Lowercased word tokens, used for lexical matching
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}
