use crate::config::Config;
use crate::error::{RegdocError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_store(config, &mut errors);
        Self::validate_collections(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RegdocError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        errors.extend(config.retrieval.validation_errors());
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let provider = &config.embedding.provider;
        let valid_providers = ["gemini", "fastembed"];
        if !valid_providers.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "embedding.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    valid_providers, provider
                ),
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if provider == "gemini" && config.embedding.api_key_env.is_empty() {
            errors.push(ValidationError::new(
                "embedding.api_key_env",
                "API key environment variable name cannot be empty",
            ));
        }

        if config.embedding.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "embedding.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_store(config: &Config, errors: &mut Vec<ValidationError>) {
        match config.store.backend.as_str() {
            "sqlite" => {
                if config.store.db_path.as_os_str().is_empty() {
                    errors.push(ValidationError::new(
                        "store.db_path",
                        "Database path cannot be empty",
                    ));
                }
            }
            "chroma" => {
                let url = &config.store.chroma_url;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    errors.push(ValidationError::new(
                        "store.chroma_url",
                        format!("Chroma URL must be http(s), got '{}'", url),
                    ));
                }
            }
            other => {
                errors.push(ValidationError::new(
                    "store.backend",
                    format!("Backend must be 'sqlite' or 'chroma', got '{}'", other),
                ));
            }
        }
    }

    fn validate_collections(config: &Config, errors: &mut Vec<ValidationError>) {
        // Chroma accepts names of 3 to 63 characters
        let max = config.collections.max_name_length;
        if !(3..=63).contains(&max) {
            errors.push(ValidationError::new(
                "collections.max_name_length",
                format!("Max name length must be between 3 and 63, got {}", max),
            ));
        }
    }
}
