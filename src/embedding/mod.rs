/// Embedding providers and vector similarity
///
/// - `EmbeddingProvider` trait with an explicit query/document purpose
/// - `GeminiProvider` for the hosted Gemini embedding API
/// - `FastEmbedProvider` for local embedding
mod gemini;
mod provider;
mod similarity;

pub use gemini::GeminiProvider;
pub use provider::{EmbeddingError, EmbeddingProvider, EmbeddingPurpose, FastEmbedProvider};
pub use similarity::cosine_similarity;

use crate::config::EmbeddingConfig;
use std::sync::Arc;

/// Build the provider named in configuration
pub fn provider_from_config(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::from_config(config)?)),
        "fastembed" => Ok(Arc::new(FastEmbedProvider::new(&config.model)?)),
        other => Err(EmbeddingError::InitializationError(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}
