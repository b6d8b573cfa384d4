//! Configuration management for regdoc
//!
//! Loads the TOML configuration file, applies `REGDOC_` environment overrides
//! and named profiles, then validates the result.

use crate::error::{RegdocError, Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub collections: CollectionsConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Tuning for hybrid retrieval.
///
/// Passed to each `HybridRetriever` at construction, so several retrievers
/// with different tuning can coexist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Autocut cutoff for semantic candidates (cosine similarity)
    pub similarity_threshold: f32,
    /// Additive bonus for candidates found by the store's own search
    pub chroma_bias: f32,
    /// Number of passages retrieved when the caller does not ask for more
    pub default_k: usize,
}

impl RetrievalConfig {
    pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;
    pub const DEFAULT_CHROMA_BIAS: f32 = 0.05;
    pub const DEFAULT_K: usize = 5;

    pub fn new(similarity_threshold: f32, chroma_bias: f32, default_k: usize) -> Self {
        Self {
            similarity_threshold,
            chroma_bias,
            default_k,
        }
    }

    /// Range problems with this tuning, keyed by config path
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // NaN fails the range check too
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            errors.push(ValidationError::new(
                "retrieval.similarity_threshold",
                format!(
                    "Threshold must be a cosine similarity in [-1.0, 1.0], got {}",
                    self.similarity_threshold
                ),
            ));
        }

        if !self.chroma_bias.is_finite() || self.chroma_bias < 0.0 {
            errors.push(ValidationError::new(
                "retrieval.chroma_bias",
                format!(
                    "Bias must be a finite non-negative number, got {}",
                    self.chroma_bias
                ),
            ));
        }

        if self.default_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.default_k",
                "default_k must be greater than 0",
            ));
        }

        errors
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_SIMILARITY_THRESHOLD,
            Self::DEFAULT_CHROMA_BIAS,
            Self::DEFAULT_K,
        )
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String, // "gemini" or "fastembed"
    pub model: String,
    pub api_key_env: String,
    pub endpoint: String,
    /// Title attached to document embeddings
    pub document_title: String,
    pub timeout_secs: u64,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: String, // "sqlite" or "chroma"
    pub db_path: PathBuf,
    pub chroma_url: String,
}

/// Collection naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsConfig {
    pub max_name_length: usize,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chroma_bias: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RegdocError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RegdocError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse, apply environment overrides and validate
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RegdocError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| RegdocError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(threshold) = overrides.similarity_threshold {
            self.retrieval.similarity_threshold = threshold;
        }
        if let Some(bias) = overrides.chroma_bias {
            self.retrieval.chroma_bias = bias;
        }
        if let Some(k) = overrides.default_k {
            self.retrieval.default_k = k;
        }
        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }

        // Profiles can push values out of range
        ConfigValidator::validate(self)
    }

    /// Apply environment variable overrides
    /// Environment variables in format: REGDOC_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("REGDOC_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "RETRIEVAL__SIMILARITY_THRESHOLD" => {
                self.retrieval.similarity_threshold = parse_env(path, value)?;
            }
            "RETRIEVAL__CHROMA_BIAS" => {
                self.retrieval.chroma_bias = parse_env(path, value)?;
            }
            "RETRIEVAL__DEFAULT_K" => {
                self.retrieval.default_k = parse_env(path, value)?;
            }
            "EMBEDDING__PROVIDER" => {
                self.embedding.provider = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "STORE__BACKEND" => {
                self.store.backend = value.to_string();
            }
            "STORE__DB_PATH" => {
                self.store.db_path = PathBuf::from(value);
            }
            "STORE__CHROMA_URL" => {
                self.store.chroma_url = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RegdocError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("regdoc").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig {
                provider: "gemini".to_string(),
                model: "models/text-embedding-004".to_string(),
                api_key_env: "GEMINI_API_KEY".to_string(),
                endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                document_title: "custom query".to_string(),
                timeout_secs: 30,
            },
            store: StoreConfig {
                backend: "sqlite".to_string(),
                db_path: PathBuf::from("~/.regdoc/collections.sqlite"),
                chroma_url: "http://localhost:8000".to_string(),
            },
            collections: CollectionsConfig {
                max_name_length: 60,
            },
            profiles: HashMap::new(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| RegdocError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| RegdocError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| RegdocError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
