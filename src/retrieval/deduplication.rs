//! Result deduplication by content prefix

use crate::types::Chunk;
use ahash::AHashSet;

/// Deduplicate chunks by their content-prefix key, keeping the first occurrence
///
/// # Arguments
/// * `chunks` - Chunks in priority order, potentially with duplicates
///
/// # Returns
/// Deduplicated chunks, maintaining input order
pub fn deduplicate_chunks(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut seen: AHashSet<String> = AHashSet::new();

    chunks
        .into_iter()
        .filter(|chunk| seen.insert(chunk.dedup_key().to_string()))
        .collect()
}
