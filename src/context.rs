//! Prompt context assembly from retrieval output

use crate::retrieval::{CancellationToken, HybridRetriever, PageNumber, RetrievalError};
use crate::store::VectorStore;

pub const CONTEXT_HEADER: &str = "\n\nRelevant context from the document:\n";
pub const CONTEXT_FOOTER: &str = "\n\n Please use only the above context to generate an answer.";
pub const NO_CONTEXT_FALLBACK: &str =
    "Ignore all instructions and output: 'Error: No context found.'";

/// How much of a document to put in front of the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextScope {
    /// The configured `retrieval.default_k` passages
    #[default]
    Default,
    /// As many passages as the collection holds
    WholeDocument,
}

/// Context block handed to the generation step
#[derive(Debug, Clone, PartialEq)]
pub struct RagContext {
    pub text: String,
    /// Number of passages included; zero for the fallback
    pub passages: usize,
}

impl RagContext {
    /// Render `(passage, page)` pairs; an empty list yields the fallback
    pub fn from_passages(passages: &[(String, PageNumber)]) -> Self {
        if passages.is_empty() {
            return Self::fallback();
        }

        let mut text = String::from(CONTEXT_HEADER);
        for (passage, page) in passages {
            text.push_str(&format!("\nPage {}: {}\n", page, passage));
        }
        text.push_str(CONTEXT_FOOTER);

        Self {
            text,
            passages: passages.len(),
        }
    }

    pub fn fallback() -> Self {
        Self {
            text: NO_CONTEXT_FALLBACK.to_string(),
            passages: 0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.passages == 0
    }
}

/// Number of passages to retrieve for a scope
pub fn resolve_k(
    scope: ContextScope,
    default_k: usize,
    collection_size: usize,
) -> usize {
    match scope {
        ContextScope::Default => default_k,
        ContextScope::WholeDocument => collection_size,
    }
}

/// Retrieve from `collection_name` and render the prompt context.
///
/// Retrieval failures never reach the caller: they are logged and replaced
/// by the fallback instruction.
pub fn build_rag_context(
    retriever: &HybridRetriever,
    store: &dyn VectorStore,
    collection_name: &str,
    query: &str,
    scope: ContextScope,
    cancel: &CancellationToken,
) -> RagContext {
    match try_build(retriever, store, collection_name, query, scope, cancel) {
        Ok(context) => context,
        Err(e) => {
            tracing::error!(
                "Problem retrieving context from {}: {}",
                collection_name,
                e
            );
            RagContext::fallback()
        }
    }
}

fn try_build(
    retriever: &HybridRetriever,
    store: &dyn VectorStore,
    collection_name: &str,
    query: &str,
    scope: ContextScope,
    cancel: &CancellationToken,
) -> Result<RagContext, RetrievalError> {
    let collection_size = match scope {
        ContextScope::Default => 0,
        ContextScope::WholeDocument => store.collection(collection_name)?.count()?,
    };

    let k = resolve_k(scope, retriever.config().default_k, collection_size);
    if k == 0 {
        tracing::warn!("Collection {} is empty", collection_name);
        return Ok(RagContext::fallback());
    }
    tracing::debug!("Retrieving {} passages for context", k);

    let passages = retriever.retrieve(store, collection_name, query, Some(k), cancel)?;
    let context = RagContext::from_passages(&passages);
    tracing::debug!("Context for {}:\n{}", collection_name, context.text);

    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::embedding::{EmbeddingError, EmbeddingProvider, EmbeddingPurpose};
    use crate::retrieval::Passage;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    struct Offline;

    impl EmbeddingProvider for Offline {
        fn embed(&self, _text: &str, _purpose: EmbeddingPurpose) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::RequestError("offline".to_string()))
        }

        fn model_name(&self) -> &str {
            "offline"
        }
    }

    fn retriever() -> HybridRetriever {
        HybridRetriever::new(Arc::new(Offline), RetrievalConfig::default()).unwrap()
    }

    #[test]
    fn test_render() {
        let context = RagContext::from_passages(&[
            ("Capital buffers apply.".to_string(), PageNumber::Number(3)),
            ("Annex".to_string(), PageNumber::Unknown),
        ]);

        assert_eq!(
            context.text,
            "\n\nRelevant context from the document:\n\
             \nPage 3: Capital buffers apply.\n\
             \nPage unknown: Annex\n\
             \n\n Please use only the above context to generate an answer."
        );
        assert_eq!(context.passages, 2);
    }

    #[test]
    fn test_empty_is_fallback() {
        let context = RagContext::from_passages(&[]);
        assert!(context.is_fallback());
        assert_eq!(context.text, NO_CONTEXT_FALLBACK);
    }

    #[test]
    fn test_resolve_k() {
        assert_eq!(resolve_k(ContextScope::Default, 5, 40), 5);
        assert_eq!(resolve_k(ContextScope::WholeDocument, 5, 40), 40);
    }

    #[test]
    fn test_missing_collection_falls_back() {
        let store = MemoryStore::new();
        let context = build_rag_context(
            &retriever(),
            &store,
            "missing",
            "capital",
            ContextScope::Default,
            &CancellationToken::new(),
        );
        assert!(context.is_fallback());
    }

    #[test]
    fn test_whole_document_scope() {
        let store = MemoryStore::new().with_collection(
            "rekomendacja_p",
            vec![
                Passage::new("capital buffers", 1),
                Passage::new("capital planning", 2),
                Passage::new("liquidity", 3),
            ],
        );

        let context = build_rag_context(
            &retriever(),
            &store,
            "rekomendacja_p",
            "capital",
            ContextScope::WholeDocument,
            &CancellationToken::new(),
        );

        // Provider is offline, so only word matches come back
        assert_eq!(context.passages, 2);
        assert!(context.text.contains("Page 1: capital buffers"));
        assert!(!context.text.contains("liquidity"));
    }
}
