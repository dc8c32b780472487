//! Weighted Reciprocal Rank Fusion for combining lexical and vector rankings

use crate::config::RetrievalConfig;
use crate::types::Chunk;
use ahash::AHashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be non-negative and not both zero")]
    InvalidWeights,
}

/// Configuration for fusion algorithm
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// RRF K constant (typically 60)
    pub rrf_k: f32,

    /// Weight for lexical (BM25) results
    pub lexical_weight: f32,

    /// Weight for vector results
    pub vector_weight: f32,
}

impl FusionConfig {
    pub fn new(rrf_k: f32, lexical_weight: f32, vector_weight: f32) -> Result<Self, FusionError> {
        if lexical_weight < 0.0 || vector_weight < 0.0 || lexical_weight + vector_weight <= 0.0 {
            return Err(FusionError::InvalidWeights);
        }

        Ok(Self {
            rrf_k,
            lexical_weight,
            vector_weight,
        })
    }

    /// Build from the retrieval section, renormalizing if asked to
    pub fn from_retrieval(config: &RetrievalConfig) -> Result<Self, FusionError> {
        let fusion = Self::new(config.rrf_k, config.lexical_weight, config.vector_weight)?;
        Ok(if config.normalize_weights {
            fusion.normalized()
        } else {
            fusion
        })
    }

    /// Scale the weights so they sum to 1
    pub fn normalized(self) -> Self {
        let total = self.lexical_weight + self.vector_weight;
        Self {
            rrf_k: self.rrf_k,
            lexical_weight: self.lexical_weight / total,
            vector_weight: self.vector_weight / total,
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            lexical_weight: 0.4,
            vector_weight: 0.6,
        }
    }
}

/// Apply weighted Reciprocal Rank Fusion to combine two ranked lists
///
/// RRF formula: score(d) = sum over all rankings of: weight / (k + rank), rank 1-based
///
/// Chunks are identified by their content-prefix key. Equal scores keep the
/// order of first appearance, lexical list first.
///
/// # Returns
/// Fused chunks with their fused score, sorted by score descending
pub fn reciprocal_rank_fusion(
    lexical_results: Vec<Chunk>,
    vector_results: Vec<Chunk>,
    config: &FusionConfig,
) -> Vec<(Chunk, f32)> {
    let mut fused: Vec<(Chunk, f32)> = Vec::new();
    let mut positions: AHashMap<String, usize> = AHashMap::new();

    let rankings = [
        (lexical_results, config.lexical_weight),
        (vector_results, config.vector_weight),
    ];

    for (results, weight) in rankings {
        for (rank, chunk) in results.into_iter().enumerate() {
            let rrf_score = weight / (config.rrf_k + (rank as f32) + 1.0);
            let key = chunk.dedup_key().to_string();

            match positions.get(&key) {
                Some(&pos) => fused[pos].1 += rrf_score,
                None => {
                    positions.insert(key, fused.len());
                    fused.push((chunk, rrf_score));
                }
            }
        }
    }

    // Stable sort keeps first-appearance order among ties
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    fused
}
