//! Capability interfaces for the external model backends
//!
//! The pipeline only talks to these traits:
//! - `TextGenerator` for whole-shot and streamed completions
//! - `EmbeddingProvider` for dense vectors
//!
//! Concrete backends are picked once at startup by `factory`.

mod embedding;
pub mod factory;
mod generation;

pub use embedding::FastEmbedProvider;
pub use generation::{parse_sse_line, OpenAiCompatibleGenerator, SseLine};

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Request failed: {0}")]
    RequestError(String),

    #[error("Generation failed: {0}")]
    GenerationError(String),

    #[error("Streaming failed: {0}")]
    StreamError(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingError(String),

    #[error("Relevance scoring failed: {0}")]
    ScoringError(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Lazy, finite, non-restartable sequence of generated text fragments.
///
/// Dropping the stream abandons the upstream request.
pub type TokenStream = BoxStream<'static, Result<String, ProviderError>>;

/// Text-generation backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate the full completion for a prompt
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Start a streamed completion for a prompt
    async fn complete_streaming(&self, prompt: &str) -> Result<TokenStream, ProviderError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Trait for embedding providers
///
/// Allows abstraction over different embedding backends (FastEmbed, remote APIs, ...)
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts, one vector per input in input order
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Generate embedding for a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Cosine similarity of two vectors; 0.0 when either has zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
