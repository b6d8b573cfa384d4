//! Gemini embedding API client

use crate::config::EmbeddingConfig;
use crate::embedding::{EmbeddingError, EmbeddingProvider, EmbeddingPurpose};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

/// Embedding provider backed by the Gemini `embedContent` endpoint
pub struct GeminiProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
    document_title: Option<String>,
}

impl GeminiProvider {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: String,
        document_title: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| EmbeddingError::InitializationError(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: normalize_model(model),
            api_key,
            document_title,
        })
    }

    /// Build a provider from configuration, reading the API key from the
    /// configured environment variable
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                EmbeddingError::InitializationError(format!(
                    "{} not found in environment variables",
                    config.api_key_env
                ))
            })?;

        let title = Some(config.document_title.clone()).filter(|t| !t.is_empty());

        Self::new(
            &config.endpoint,
            &config.model,
            api_key,
            title,
            config.timeout_secs,
        )
    }

    fn url(&self) -> String {
        format!("{}/{}:embedContent", self.endpoint, self.model)
    }

    fn request_body<'a>(&'a self, text: &'a str, purpose: EmbeddingPurpose) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: &self.model,
            content: Content {
                parts: [Part { text }],
            },
            task_type: purpose.task_type(),
            // The API rejects titles on anything but document embeddings
            title: match purpose {
                EmbeddingPurpose::Document => self.document_title.as_deref(),
                EmbeddingPurpose::Query => None,
            },
        }
    }
}

impl EmbeddingProvider for GeminiProvider {
    fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&self.request_body(text, purpose))
            .send()
            .map_err(|e| EmbeddingError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EmbeddingError::RequestError(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .map_err(|e| EmbeddingError::RequestError(e.to_string()))?;

        parse_embedding(&body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn normalize_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn parse_embedding(body: &str) -> Result<Vec<f32>, EmbeddingError> {
    let parsed: EmbedContentResponse = serde_json::from_str(body)
        .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

    let values = parsed
        .embedding
        .map(|e| e.values)
        .ok_or_else(|| EmbeddingError::MalformedResponse("missing embedding".to_string()))?;

    if values.is_empty() {
        return Err(EmbeddingError::MalformedResponse(
            "empty embedding".to_string(),
        ));
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(
            "https://example.invalid/v1beta/",
            "text-embedding-004",
            "key".to_string(),
            Some("custom query".to_string()),
            5,
        )
        .unwrap()
    }

    #[test]
    fn test_url_and_model_name() {
        let provider = provider();
        assert_eq!(provider.model_name(), "models/text-embedding-004");
        assert_eq!(
            provider.url(),
            "https://example.invalid/v1beta/models/text-embedding-004:embedContent"
        );
    }

    #[test]
    fn test_title_only_on_documents() {
        let provider = provider();

        let query = serde_json::to_value(provider.request_body("q", EmbeddingPurpose::Query)).unwrap();
        assert_eq!(query["taskType"], "RETRIEVAL_QUERY");
        assert!(query.get("title").is_none());

        let doc =
            serde_json::to_value(provider.request_body("d", EmbeddingPurpose::Document)).unwrap();
        assert_eq!(doc["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(doc["title"], "custom query");
        assert_eq!(doc["content"]["parts"][0]["text"], "d");
    }

    #[test]
    fn test_parse_embedding() {
        let values = parse_embedding(r#"{"embedding": {"values": [0.5, -0.25]}}"#).unwrap();
        assert_eq!(values, vec![0.5, -0.25]);
    }

    #[test]
    fn test_parse_malformed_embedding() {
        assert!(matches!(
            parse_embedding(r#"{"error": "quota"}"#),
            Err(EmbeddingError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_embedding(r#"{"embedding": {"values": []}}"#),
            Err(EmbeddingError::MalformedResponse(_))
        ));
        assert!(parse_embedding("not json").is_err());
    }

    #[test]
    fn test_empty_text_rejected_without_request() {
        let provider = provider();
        assert!(matches!(
            provider.embed("", EmbeddingPurpose::Query),
            Err(EmbeddingError::InvalidInput(_))
        ));
    }
}
