use crate::config::Config;
use crate::error::{RagError, Result, ValidationError};
use crate::retrieval::RetrievalStrategy;

/// Providers the generation factory knows how to build
pub const SUPPORTED_PROVIDERS: [&str; 3] = ["openai", "groq", "ollama"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every violation
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_indexing(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RagError::ConfigValidation { errors })
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

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        // Validate temperature range
        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        let provider = &config.llm.provider;
        if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    SUPPORTED_PROVIDERS, provider
                ),
            ));
        }

        if config.llm.model.is_empty() {
            errors.push(ValidationError::new("llm.model", "Model name cannot be empty"));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if let Err(e) = RetrievalStrategy::resolve(retrieval) {
            errors.push(ValidationError::new("retrieval.strategy", e.to_string()));
        }

        if retrieval.retrieval_top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.retrieval_top_k",
                "retrieval_top_k must be greater than 0",
            ));
        }

        if retrieval.rerank_top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.rerank_top_k",
                "rerank_top_k must be greater than 0",
            ));
        }

        if retrieval.lexical_weight < 0.0 || retrieval.vector_weight < 0.0 {
            errors.push(ValidationError::new(
                "retrieval.lexical_weight",
                "Fusion weights cannot be negative",
            ));
        } else if retrieval.lexical_weight + retrieval.vector_weight <= 0.0 {
            errors.push(ValidationError::new(
                "retrieval.vector_weight",
                "At least one fusion weight must be positive",
            ));
        }

        if retrieval.rrf_k < 0.0 {
            errors.push(ValidationError::new(
                "retrieval.rrf_k",
                "RRF constant cannot be negative",
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.redundancy_threshold) {
            errors.push(ValidationError::new(
                "retrieval.redundancy_threshold",
                format!(
                    "Redundancy threshold must be between 0.0 and 1.0, got {}",
                    retrieval.redundancy_threshold
                ),
            ));
        }

        if retrieval.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "retrieval.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }
    }

    fn validate_indexing(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.indexing.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.indexing.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }
    }
}
