//! Hybrid search combining lexical and vector rankings

use crate::index::{CorpusIndex, IndexError};
use crate::retrieval::{reciprocal_rank_fusion, FusionConfig};
use crate::types::Chunk;
use std::sync::Arc;
use tracing::{debug, warn};

/// Hybrid retriever over the shared corpus
pub struct HybridRetriever {
    corpus: Arc<CorpusIndex>,
    fusion: FusionConfig,
    top_k: usize,
}

impl HybridRetriever {
    pub fn new(corpus: Arc<CorpusIndex>, fusion: FusionConfig, top_k: usize) -> Self {
        Self {
            corpus,
            fusion,
            top_k,
        }
    }

    /// Fused lexical + vector retrieval, at most `top_k` chunks.
    ///
    /// Falls back to vector-only retrieval when the lexical snapshot cannot be
    /// built (empty corpus or index failure).
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>, IndexError> {
        let lexical = match self.corpus.lexical().await {
            Ok(Some(index)) => index,
            Ok(None) => {
                debug!("No lexical snapshot, using vector-only retrieval");
                return self.vector_only(query).await;
            }
            Err(e) => {
                warn!("Lexical index unavailable ({}), using vector-only retrieval", e);
                return self.vector_only(query).await;
            }
        };

        let lexical_results: Vec<Chunk> = lexical
            .search_chunks(query, self.top_k)?
            .into_iter()
            .map(|(chunk, _)| chunk)
            .collect();

        let vector_results: Vec<Chunk> = self
            .corpus
            .similarity_search_with_score(query, self.top_k)
            .await?
            .into_iter()
            .map(|(chunk, _)| chunk)
            .collect();

        debug!(
            lexical = lexical_results.len(),
            vector = vector_results.len(),
            "Fusing rankings"
        );

        let mut fused = reciprocal_rank_fusion(lexical_results, vector_results, &self.fusion);
        fused.truncate(self.top_k);

        Ok(fused
            .into_iter()
            .map(|(chunk, score)| chunk.with_score(score))
            .collect())
    }

    /// Plain vector retrieval, scored by similarity
    pub async fn vector_only(&self, query: &str) -> Result<Vec<Chunk>, IndexError> {
        vector_search(&self.corpus, query, self.top_k).await
    }
}

/// Vector search with each chunk's score set to its similarity
pub async fn vector_search(
    corpus: &CorpusIndex,
    query: &str,
    k: usize,
) -> Result<Vec<Chunk>, IndexError> {
    Ok(corpus
        .similarity_search_with_score(query, k)
        .await?
        .into_iter()
        .map(|(chunk, score)| chunk.with_score(score))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ChunkFilter, VectorIndex};
    use async_trait::async_trait;

    /// Searchable, but cannot produce a corpus snapshot
    struct NoSnapshotIndex {
        chunks: Vec<Chunk>,
    }

    #[async_trait]
    impl VectorIndex for NoSnapshotIndex {
        async fn similarity_search_with_score(
            &self,
            _query: &str,
            k: usize,
        ) -> Result<Vec<(Chunk, f32)>, IndexError> {
            Ok(self
                .chunks
                .iter()
                .take(k)
                .zip([0.9f32, 0.5, 0.1])
                .map(|(c, s)| (c.clone(), s))
                .collect())
        }

        async fn get_all_chunks(&self) -> Result<Vec<Chunk>, IndexError> {
            Err(IndexError::StorageError("database is locked".to_string()))
        }

        async fn add_documents(&self, _chunks: Vec<Chunk>) -> Result<usize, IndexError> {
            Ok(0)
        }

        async fn delete_by_filter(&self, _filter: &ChunkFilter) -> Result<usize, IndexError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_lexical_failure_falls_back_to_vector_scores() {
        let index = NoSnapshotIndex {
            chunks: vec![
                Chunk::new("first", "a.md", None, "d1", "c1"),
                Chunk::new("second", "b.md", None, "d2", "c2"),
                Chunk::new("third", "c.md", None, "d3", "c3"),
            ],
        };
        let corpus = Arc::new(CorpusIndex::new(Arc::new(index)));
        let retriever = HybridRetriever::new(corpus.clone(), FusionConfig::default(), 2);

        let results = retriever.retrieve("anything").await.unwrap();

        let ids: Vec<&str> = results.iter().map(|c| c.metadata.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(results[0].score(), 0.9);
        assert_eq!(results[1].score(), 0.5);
        assert!(!corpus.has_lexical_snapshot().await);
    }
}
