//! Configuration management for ragpipe
//!
//! Handles loading, validation, profile overrides and environment overrides
//! of the TOML configuration file.

use crate::error::{RagError, Result};
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
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub reranker: RerankerConfig,
    pub retrieval: RetrievalConfig,
    pub indexing: IndexingConfig,
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

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("ragpipe.sqlite")
    }
}

/// Text-generation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// One of "openai", "groq", "ollama"
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    /// Overrides the provider's default endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub temperature: f32,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

/// Cross-encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    pub model: String,
}

/// Retrieval pipeline configuration
///
/// The `use_*` strategy flags are mutually exclusive and resolved by priority:
/// multi-query > HyDE > hybrid search > plain vector. An explicit `strategy`
/// takes precedence over the flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub use_multi_query: bool,
    pub use_hyde: bool,
    pub use_hybrid_search: bool,
    pub use_reranking: bool,
    pub retrieval_top_k: usize,
    pub rerank_top_k: usize,
    pub lexical_weight: f32,
    pub vector_weight: f32,
    #[serde(default)]
    pub normalize_weights: bool,
    /// RRF K constant (typically 60)
    pub rrf_k: f32,
    pub redundancy_threshold: f32,
    pub history_window: usize,
    pub hnsw_ef_search: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            strategy: None,
            use_multi_query: true,
            use_hyde: false,
            use_hybrid_search: true,
            use_reranking: true,
            retrieval_top_k: 10,
            rerank_top_k: 5,
            lexical_weight: 0.4,
            vector_weight: 0.6,
            normalize_weights: false,
            rrf_k: 60.0,
            redundancy_threshold: 0.95,
            history_window: 10,
            hnsw_ef_search: 50,
        }
    }
}

/// HNSW graph parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub hnsw_ef_construction: usize,
    pub hnsw_m: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            hnsw_ef_construction: 200,
            hnsw_m: 16,
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_reranking: Option<bool>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RagError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Built-in defaults with environment overrides and an optional profile,
    /// for when no config file exists yet
    pub fn load_defaults(profile: Option<&str>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.finalize(profile)
    }

    fn finalize(mut self, profile: Option<&str>) -> Result<Self> {
        if let Some(profile) = profile {
            self.apply_profile(profile)?;
        }
        ConfigValidator::validate(&self)?;
        Ok(self)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| RagError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(strategy) = overrides.strategy {
            self.retrieval.strategy = Some(strategy);
        }
        if let Some(enabled) = overrides.use_reranking {
            self.retrieval.use_reranking = enabled;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: RAGPIPE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("RAGPIPE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "LLM__PROVIDER" => self.llm.provider = value.to_string(),
            "LLM__MODEL" => self.llm.model = value.to_string(),
            "LLM__BASE_URL" => self.llm.base_url = Some(value.to_string()),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "RERANKER__MODEL" => self.reranker.model = value.to_string(),
            "RETRIEVAL__STRATEGY" => self.retrieval.strategy = Some(value.to_string()),
            "RETRIEVAL__USE_RERANKING" => {
                self.retrieval.use_reranking = parse_env(path, value)?;
            }
            "RETRIEVAL__RETRIEVAL_TOP_K" => {
                self.retrieval.retrieval_top_k = parse_env(path, value)?;
            }
            "RETRIEVAL__RERANK_TOP_K" => {
                self.retrieval.rerank_top_k = parse_env(path, value)?;
            }
            "STORAGE__DATA_DIR" => self.storage.data_dir = PathBuf::from(value),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RagError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("ragpipe").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| RagError::Config("Cannot determine data directory".to_string()))?;

        Ok(data_dir.join("ragpipe"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| RagError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = Self::default_data_dir().unwrap_or_else(|_| PathBuf::from(".ragpipe"));

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig { data_dir },
            llm: LlmConfig {
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                base_url: None,
                temperature: 0.0,
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                batch_size: 32,
            },
            reranker: RerankerConfig {
                model: "BAAI/bge-reranker-base".to_string(),
            },
            retrieval: RetrievalConfig::default(),
            indexing: IndexingConfig::default(),
            profiles: HashMap::new(),
        }
    }
}
