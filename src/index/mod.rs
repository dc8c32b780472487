//! Corpus indices
//!
//! - `VectorIndex` trait, with `HnswVectorStore` (HNSW over embeddings persisted in SQLite)
//! - `KeywordIndex`, an in-memory Tantivy BM25 index built from a corpus snapshot
//! - `CorpusIndex`, the shared handle that caches the lexical snapshot and
//!   invalidates both indices whenever the corpus changes

mod corpus;
mod keyword_index;
mod vector_index;

pub use corpus::CorpusIndex;
pub use keyword_index::{KeywordIndex, KeywordSearchResult};
pub use vector_index::{HnswParams, HnswVectorStore};

use crate::providers::ProviderError;
use crate::types::Chunk;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] tantivy::TantivyError),
}

/// Selects chunks to delete from the corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkFilter {
    DocId(String),
    SourceFile(String),
}

/// Dense vector index over the corpus
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embed `query` and return up to `k` chunks with their similarity,
    /// ordered by descending similarity
    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(Chunk, f32)>, IndexError>;

    /// Full snapshot of the corpus in insertion order
    async fn get_all_chunks(&self) -> Result<Vec<Chunk>, IndexError>;

    /// Embed and store chunks, returning how many were added
    async fn add_documents(&self, chunks: Vec<Chunk>) -> Result<usize, IndexError>;

    /// Delete every chunk matching the filter, returning how many were removed
    async fn delete_by_filter(&self, filter: &ChunkFilter) -> Result<usize, IndexError>;

    /// Drop any cached search structure so the next search rebuilds it
    async fn invalidate(&self) {}
}
