//! Retrieval stages
//!
//! - Query condensation against conversation history (`QueryRewriter`)
//! - Hybrid search: BM25 + vector rankings fused with weighted Reciprocal Rank Fusion
//! - Query expansion: multi-query paraphrasing and HyDE (`QueryExpander`)
//! - Cross-encoder reranking (`Reranker`)
//! - Near-duplicate removal and long-context ordering (`PostProcessor`)

mod deduplication;
mod expander;
mod fusion;
mod hybrid;
mod postprocess;
mod reranker;
mod rewriter;
mod strategy;

pub use deduplication::deduplicate_chunks;
pub use expander::{parse_alternate_queries, QueryExpander, MAX_ALTERNATE_QUERIES};
pub use fusion::{reciprocal_rank_fusion, FusionConfig, FusionError};
pub use hybrid::{vector_search, HybridRetriever};
pub use postprocess::{reorder_long_context, PostProcessor};
pub use reranker::{FastEmbedCrossEncoder, RelevanceScorer, Reranker};
pub use rewriter::QueryRewriter;
pub use strategy::RetrievalStrategy;
