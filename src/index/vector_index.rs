/// HNSW vector index over embeddings persisted in SQLite
use super::{ChunkFilter, IndexError, VectorIndex};
use crate::config::{IndexingConfig, RetrievalConfig};
use crate::providers::EmbeddingProvider;
use crate::storage::Database;
use crate::types::Chunk;
use async_trait::async_trait;
use hnsw_rs::prelude::*;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Upper bound hnsw_rs accepts for the number of layers
const MAX_LAYERS: usize = 16;

/// HNSW parameters
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    /// Number of connections per layer
    pub m: usize,
    /// Construction beam width (higher = better recall, slower build)
    pub ef_construction: usize,
    /// Search beam width (higher = better recall, slower search)
    pub ef_search: usize,
}

impl HnswParams {
    pub fn from_config(indexing: &IndexingConfig, retrieval: &RetrievalConfig) -> Self {
        Self {
            m: indexing.hnsw_m,
            ef_construction: indexing.hnsw_ef_construction,
            ef_search: retrieval.hnsw_ef_search,
        }
    }
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
        }
    }
}

/// Graph built from one snapshot of the stored corpus
struct HnswGraph {
    hnsw: Hnsw<'static, f32, DistCosine>,
    chunks: Vec<Chunk>,
    dimension: usize,
}

/// Vector store: SQLite is the source of truth, the HNSW graph is a cache
/// built on first search and dropped by `invalidate()`.
pub struct HnswVectorStore {
    db: Arc<Database>,
    embedder: Arc<dyn EmbeddingProvider>,
    params: HnswParams,
    graph: RwLock<Option<Arc<HnswGraph>>>,
}

impl HnswVectorStore {
    pub fn new(db: Arc<Database>, embedder: Arc<dyn EmbeddingProvider>, params: HnswParams) -> Self {
        Self {
            db,
            embedder,
            params,
            graph: RwLock::new(None),
        }
    }

    /// Return the cached graph, building it from storage if needed
    async fn graph(&self) -> Result<Arc<HnswGraph>, IndexError> {
        if let Some(graph) = self.graph.read().await.as_ref() {
            return Ok(Arc::clone(graph));
        }

        let mut slot = self.graph.write().await;
        // Another task may have built it while we waited for the write lock
        if let Some(graph) = slot.as_ref() {
            return Ok(Arc::clone(graph));
        }

        let db = Arc::clone(&self.db);
        let params = self.params;
        let graph = tokio::task::spawn_blocking(move || build_graph(&db, params))
            .await
            .map_err(|e| IndexError::InitializationError(e.to_string()))??;

        let graph = Arc::new(graph);
        *slot = Some(Arc::clone(&graph));
        Ok(graph)
    }

    /// Number of chunks in the current snapshot
    pub async fn len(&self) -> Result<usize, IndexError> {
        Ok(self.graph().await?.chunks.len())
    }

    pub async fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len().await? == 0)
    }

    /// Whether a graph is currently cached
    pub async fn is_loaded(&self) -> bool {
        self.graph.read().await.is_some()
    }
}

/// Load every stored embedding and insert it into a fresh graph
fn build_graph(db: &Database, params: HnswParams) -> Result<HnswGraph, IndexError> {
    let stored = db
        .load_chunks()
        .map_err(|e| IndexError::StorageError(e.to_string()))?;

    let dimension = stored.first().map(|s| s.embedding.len()).unwrap_or(0);
    let hnsw = Hnsw::<f32, DistCosine>::new(
        params.m,
        stored.len().max(1),
        MAX_LAYERS,
        params.ef_construction,
        DistCosine,
    );

    let mut chunks = Vec::with_capacity(stored.len());
    for (position, item) in stored.into_iter().enumerate() {
        if item.embedding.len() != dimension {
            return Err(IndexError::InvalidDimension {
                expected: dimension,
                actual: item.embedding.len(),
            });
        }
        hnsw.insert((item.embedding.as_slice(), position));
        chunks.push(item.chunk);
    }

    info!("Built HNSW graph over {} chunks ({}D)", chunks.len(), dimension);

    Ok(HnswGraph {
        hnsw,
        chunks,
        dimension,
    })
}

#[async_trait]
impl VectorIndex for HnswVectorStore {
    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(Chunk, f32)>, IndexError> {
        let graph = self.graph().await?;
        if graph.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_one(query).await?;
        if embedding.len() != graph.dimension {
            return Err(IndexError::InvalidDimension {
                expected: graph.dimension,
                actual: embedding.len(),
            });
        }

        let neighbours = graph
            .hnsw
            .search(&embedding, k, self.params.ef_search.max(k));

        let mut results: Vec<(Chunk, f32)> = neighbours
            .into_iter()
            .filter_map(|n| {
                graph
                    .chunks
                    .get(n.d_id)
                    .map(|chunk| (chunk.clone(), 1.0 - n.distance))
            })
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        debug!("Vector search returned {} chunks", results.len());
        Ok(results)
    }

    async fn get_all_chunks(&self) -> Result<Vec<Chunk>, IndexError> {
        Ok(self.graph().await?.chunks.clone())
    }

    async fn add_documents(&self, chunks: Vec<Chunk>) -> Result<usize, IndexError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_many(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(IndexError::InsertError(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let items: Vec<(Chunk, Vec<f32>)> = chunks.into_iter().zip(embeddings).collect();
        let added = self
            .db
            .insert_chunks(&items)
            .map_err(|e| IndexError::StorageError(e.to_string()))?;

        self.invalidate().await;
        Ok(added)
    }

    async fn delete_by_filter(&self, filter: &ChunkFilter) -> Result<usize, IndexError> {
        let removed = self
            .db
            .delete_chunks(filter)
            .map_err(|e| IndexError::StorageError(e.to_string()))?;

        self.invalidate().await;
        Ok(removed)
    }

    async fn invalidate(&self) {
        *self.graph.write().await = None;
    }
}
