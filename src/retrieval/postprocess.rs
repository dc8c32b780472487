//! Post-retrieval cleanup: near-duplicate removal and long-context ordering

use crate::providers::{cosine_similarity, EmbeddingProvider, ProviderError};
use crate::types::Chunk;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

pub struct PostProcessor {
    embedder: Arc<dyn EmbeddingProvider>,
    redundancy_threshold: f32,
}

impl PostProcessor {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, redundancy_threshold: f32) -> Self {
        Self {
            embedder,
            redundancy_threshold,
        }
    }

    /// Redundancy removal followed by long-context reorder
    pub async fn process(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>, ProviderError> {
        let kept = self.remove_redundant(chunks).await?;
        Ok(reorder_long_context(kept))
    }

    /// Greedy near-duplicate removal over the current order.
    ///
    /// The first chunk is always kept; a later chunk is dropped when its cosine
    /// similarity to any kept chunk exceeds the threshold. All chunks are
    /// embedded in one call; one chunk or fewer is returned untouched.
    pub async fn remove_redundant(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>, ProviderError> {
        if chunks.len() <= 1 {
            return Ok(chunks);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_many(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(ProviderError::EmbeddingError(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let before = chunks.len();
        let mut kept_vectors: Vec<&[f32]> = Vec::with_capacity(before);
        let mut kept = Vec::with_capacity(before);

        for (chunk, embedding) in chunks.into_iter().zip(embeddings.iter()) {
            let redundant = kept_vectors
                .iter()
                .any(|v| cosine_similarity(v, embedding) > self.redundancy_threshold);
            if !redundant {
                kept_vectors.push(embedding);
                kept.push(chunk);
            }
        }

        debug!("Redundancy filter kept {} of {} chunks", kept.len(), before);
        Ok(kept)
    }
}

/// Reorder chunks (best first on input) so the most relevant sit at the edges
/// of the context and the least relevant in the middle.
///
/// The best chunk ends up first, the second best last, the third second, and
/// so on inward. Two chunks or fewer are returned unchanged.
pub fn reorder_long_context(chunks: Vec<Chunk>) -> Vec<Chunk> {
    if chunks.len() <= 2 {
        return chunks;
    }

    let mut front = Vec::with_capacity(chunks.len());
    let mut back = VecDeque::with_capacity(chunks.len() / 2);
    for (i, chunk) in chunks.into_iter().enumerate() {
        if i % 2 == 0 {
            front.push(chunk);
        } else {
            back.push_front(chunk);
        }
    }

    front.extend(back);
    front
}
