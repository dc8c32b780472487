/// FastEmbed implementation of `EmbeddingProvider`
use super::{EmbeddingProvider, ProviderError};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// FastEmbed provider for local embedding generation
///
/// Uses all-MiniLM-L6-v2 model (384 dimensions) by default.
/// The model is loaded on first use and cached for the life of the provider.
pub struct FastEmbedProvider {
    model: OnceCell<Arc<TextEmbedding>>,
    embedding_model: EmbeddingModel,
    model_name: String,
    dimension: usize,
    batch_size: usize,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    ///
    /// **Important**: Models are downloaded on-demand to `~/.cache/huggingface/`
    /// on first use. The smallest model (all-MiniLM-L6-v2) is ~90MB.
    /// Larger models:
    /// - all-MiniLM-L6-v2: 90MB (384 dims) - recommended for most use cases
    /// - bge-small-en-v1.5: 130MB (384 dims) - better accuracy
    /// - bge-base-en-v1.5: 440MB (768 dims) - highest accuracy
    pub fn new(model_name: &str, batch_size: usize) -> Result<Self, ProviderError> {
        let (embedding_model, dimension) = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
            _ => {
                return Err(ProviderError::InitializationError(format!(
                    "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                    model_name
                )));
            }
        };

        Ok(Self {
            model: OnceCell::new(),
            embedding_model,
            model_name: model_name.to_string(),
            dimension,
            batch_size: batch_size.max(1),
        })
    }

    /// Create provider with default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, ProviderError> {
        Self::new("all-MiniLM-L6-v2", 32)
    }

    async fn model(&self) -> Result<Arc<TextEmbedding>, ProviderError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                tracing::info!(
                    "Initializing embedding model: {} ({}D, downloaded if not cached)",
                    self.model_name,
                    self.dimension
                );

                let embedding_model = self.embedding_model.clone();
                let loaded = tokio::task::spawn_blocking(move || {
                    let init_options =
                        InitOptions::new(embedding_model).with_show_download_progress(true);
                    TextEmbedding::try_new(init_options)
                })
                .await
                .map_err(|e| ProviderError::InitializationError(e.to_string()))?
                .map_err(|e| ProviderError::InitializationError(e.to_string()))?;

                Ok::<_, ProviderError>(Arc::new(loaded))
            })
            .await?;

        Ok(Arc::clone(model))
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model().await?;
        let owned = texts.to_vec();
        let batch_size = Some(self.batch_size);

        let embeddings = tokio::task::spawn_blocking(move || model.embed(owned, batch_size))
            .await
            .map_err(|e| ProviderError::EmbeddingError(e.to_string()))?
            .map_err(|e| ProviderError::EmbeddingError(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(ProviderError::EmbeddingError(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        // Verify all dimensions
        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(ProviderError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    /// Blank text is embedded like any other input
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_many(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| ProviderError::EmbeddingError("No embeddings generated".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
