//! Shared corpus handle
//!
//! Every mutation goes through here so that both the vector index and the
//! cached lexical snapshot are invalidated together.

use super::{ChunkFilter, IndexError, KeywordIndex, VectorIndex};
use crate::types::Chunk;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub struct CorpusIndex {
    vector: Arc<dyn VectorIndex>,
    lexical: RwLock<Option<Arc<KeywordIndex>>>,
}

impl CorpusIndex {
    pub fn new(vector: Arc<dyn VectorIndex>) -> Self {
        Self {
            vector,
            lexical: RwLock::new(None),
        }
    }

    /// Underlying vector index
    pub fn vector(&self) -> &Arc<dyn VectorIndex> {
        &self.vector
    }

    /// Lexical index over the current corpus snapshot, built on first use.
    ///
    /// Returns `None` when the corpus is empty.
    pub async fn lexical(&self) -> Result<Option<Arc<KeywordIndex>>, IndexError> {
        if let Some(index) = self.lexical.read().await.as_ref() {
            return Ok(Some(Arc::clone(index)));
        }

        let mut slot = self.lexical.write().await;
        if let Some(index) = slot.as_ref() {
            return Ok(Some(Arc::clone(index)));
        }

        let chunks = self.vector.get_all_chunks().await?;
        if chunks.is_empty() {
            debug!("Corpus is empty, no lexical snapshot built");
            return Ok(None);
        }

        let index = tokio::task::spawn_blocking(move || KeywordIndex::build(chunks))
            .await
            .map_err(|e| IndexError::InitializationError(e.to_string()))??;
        let index = Arc::new(index);
        debug!("Built lexical snapshot over {} chunks", index.len());
        *slot = Some(Arc::clone(&index));
        Ok(Some(index))
    }

    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(Chunk, f32)>, IndexError> {
        self.vector.similarity_search_with_score(query, k).await
    }

    pub async fn get_all_chunks(&self) -> Result<Vec<Chunk>, IndexError> {
        self.vector.get_all_chunks().await
    }

    /// Add chunks to the corpus and invalidate cached indices
    pub async fn add_documents(&self, chunks: Vec<Chunk>) -> Result<usize, IndexError> {
        let added = self.vector.add_documents(chunks).await?;
        self.invalidate().await;
        info!("Added {} chunks to the corpus", added);
        Ok(added)
    }

    /// Delete matching chunks and invalidate cached indices
    pub async fn delete_by_filter(&self, filter: &ChunkFilter) -> Result<usize, IndexError> {
        let removed = self.vector.delete_by_filter(filter).await?;
        self.invalidate().await;
        info!("Removed {} chunks matching {:?}", removed, filter);
        Ok(removed)
    }

    /// Drop the lexical snapshot and any cached vector structure
    pub async fn invalidate(&self) {
        *self.lexical.write().await = None;
        self.vector.invalidate().await;
    }

    /// Whether a lexical snapshot is currently cached
    pub async fn has_lexical_snapshot(&self) -> bool {
        self.lexical.read().await.is_some()
    }
}
