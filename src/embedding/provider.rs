/// Embedding provider trait and FastEmbed implementation
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Embedding request failed: {0}")]
    RequestError(String),

    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// What a vector will be compared against.
///
/// Query and document embeddings are weighted differently by retrieval
/// models; similarity between vectors produced with the wrong purpose is
/// meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingPurpose {
    Query,
    Document,
}

impl EmbeddingPurpose {
    /// Task type understood by the Gemini embedding API
    pub fn task_type(self) -> &'static str {
        match self {
            Self::Query => "RETRIEVAL_QUERY",
            Self::Document => "RETRIEVAL_DOCUMENT",
        }
    }
}

impl fmt::Display for EmbeddingPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => f.write_str("query"),
            Self::Document => f.write_str("document"),
        }
    }
}

/// Trait for embedding providers
///
/// Implementations must be deterministic for a given text, purpose and model.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>, EmbeddingError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// FastEmbed provider for local embedding generation
///
/// Defaults to multilingual-e5-small, which handles the Polish source
/// documents and expects `query: ` / `passage: ` prefixes.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
    query_prefix: &'static str,
    document_prefix: &'static str,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    ///
    /// Models are downloaded on first use to the fastembed cache directory.
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension, query_prefix, document_prefix) = match model_name {
            "multilingual-e5-small" => (EmbeddingModel::MultilingualE5Small, 384, "query: ", "passage: "),
            "multilingual-e5-base" => (EmbeddingModel::MultilingualE5Base, 768, "query: ", "passage: "),
            "bge-small-en-v1.5" => (
                EmbeddingModel::BGESmallENV15,
                384,
                "Represent this sentence for searching relevant passages: ",
                "",
            ),
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384, "", ""),
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: multilingual-e5-small, multilingual-e5-base, bge-small-en-v1.5, all-MiniLM-L6-v2",
                    model_name
                )));
            }
        };

        tracing::info!(
            "Initializing embedding model: {} ({}D, downloaded if not cached)",
            model_name,
            dimension
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
            query_prefix,
            document_prefix,
        })
    }

    /// Create provider with default model (multilingual-e5-small)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("multilingual-e5-small")
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn prefixed(&self, text: &str, purpose: EmbeddingPurpose) -> String {
        let prefix = match purpose {
            EmbeddingPurpose::Query => self.query_prefix,
            EmbeddingPurpose::Document => self.document_prefix,
        };
        format!("{}{}", prefix, text)
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let mut embeddings = self
            .model
            .embed(vec![self.prefixed(text, purpose)], None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        let embedding = embeddings.pop().ok_or_else(|| {
            EmbeddingError::GenerationError("No embeddings generated".to_string())
        })?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
