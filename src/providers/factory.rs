//! Builds concrete backends from configuration
//!
//! Every unknown provider or model name is rejected here, before any query runs.

use super::{EmbeddingProvider, FastEmbedProvider, OpenAiCompatibleGenerator, TextGenerator};
use crate::config::{EmbeddingConfig, LlmConfig, RerankerConfig};
use crate::error::{RagError, Result};
use crate::retrieval::{FastEmbedCrossEncoder, RelevanceScorer};
use std::sync::Arc;
use tracing::info;

/// Default chat-completions endpoint of a provider
pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

/// Whether the provider refuses requests without an API key
fn requires_api_key(provider: &str) -> bool {
    provider != "ollama"
}

/// Build the text generator selected by `[llm]`
pub fn build_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>> {
    let default_url = default_base_url(&config.provider).ok_or_else(|| {
        RagError::Config(format!("Unknown LLM provider: {}", config.provider))
    })?;
    let base_url = config.base_url.as_deref().unwrap_or(default_url);

    let api_key = std::env::var(&config.api_key_env)
        .ok()
        .filter(|key| !key.is_empty());
    if api_key.is_none() && requires_api_key(&config.provider) {
        return Err(RagError::Config(format!(
            "Provider '{}' needs an API key in ${}",
            config.provider, config.api_key_env
        )));
    }

    info!(
        "Using {} generator: {} at {}",
        config.provider, config.model, base_url
    );

    let generator =
        OpenAiCompatibleGenerator::new(base_url, api_key, &config.model, config.temperature)?;
    Ok(Arc::new(generator))
}

/// Build the embedding provider selected by `[embedding]`
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = FastEmbedProvider::new(&config.model, config.batch_size)
        .map_err(|e| RagError::Config(e.to_string()))?;
    Ok(Arc::new(provider))
}

/// Build the cross-encoder selected by `[reranker]`
pub fn build_scorer(config: &RerankerConfig) -> Result<Arc<dyn RelevanceScorer>> {
    let scorer = FastEmbedCrossEncoder::new(&config.model)
        .map_err(|e| RagError::Config(e.to_string()))?;
    Ok(Arc::new(scorer))
}
