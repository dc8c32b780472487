//! Query expansion: multi-query paraphrasing and hypothetical-answer retrieval

use crate::error::Result;
use crate::index::CorpusIndex;
use crate::prompts::{self, HYDE, MULTI_QUERY};
use crate::providers::TextGenerator;
use crate::retrieval::{deduplicate_chunks, vector_search, HybridRetriever};
use crate::types::Chunk;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

/// Maximum number of generated paraphrases
pub const MAX_ALTERNATE_QUERIES: usize = 3;

pub struct QueryExpander {
    generator: Arc<dyn TextGenerator>,
    hybrid: Arc<HybridRetriever>,
    corpus: Arc<CorpusIndex>,
    top_k: usize,
}

impl QueryExpander {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        hybrid: Arc<HybridRetriever>,
        corpus: Arc<CorpusIndex>,
        top_k: usize,
    ) -> Self {
        Self {
            generator,
            hybrid,
            corpus,
            top_k,
        }
    }

    /// Probes for a question: up to three paraphrases, then the question itself
    pub async fn probes(&self, question: &str) -> Result<Vec<String>> {
        let prompt = prompts::render(MULTI_QUERY, &[("question", question)]);
        let completion = self.generator.complete(&prompt).await?;

        let mut probes = parse_alternate_queries(&completion);
        probes.push(question.to_string());
        Ok(probes)
    }

    /// Hybrid retrieval for every probe, unioned in probe order with
    /// first-seen-wins deduplication
    pub async fn multi_query(&self, question: &str) -> Result<Vec<Chunk>> {
        let probes = self.probes(question).await?;
        debug!(probes = ?probes, "Running multi-query retrieval");

        let per_probe = try_join_all(probes.iter().map(|probe| self.hybrid.retrieve(probe))).await?;

        let union = deduplicate_chunks(per_probe.into_iter().flatten().collect());
        debug!("Multi-query union holds {} chunks", union.len());
        Ok(union)
    }

    /// Generate a hypothetical answer and search the vector index with it
    pub async fn hyde(&self, question: &str) -> Result<Vec<Chunk>> {
        let prompt = prompts::render(HYDE, &[("question", question)]);
        let passage = self.generator.complete(&prompt).await?;
        debug!(chars = passage.len(), "Generated hypothetical passage");

        Ok(vector_search(&self.corpus, passage.trim(), self.top_k).await?)
    }
}

/// Non-empty trimmed lines of a paraphrase completion, at most three
pub fn parse_alternate_queries(completion: &str) -> Vec<String> {
    completion
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(MAX_ALTERNATE_QUERIES)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alternate_queries() {
        let parsed = parse_alternate_queries("  first  \n\nsecond\n   \nthird\nfourth\n");
        assert_eq!(parsed, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_parse_blank_completion() {
        assert!(parse_alternate_queries("\n  \n").is_empty());
    }
}
