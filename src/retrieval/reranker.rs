//! Cross-encoder reranking

use crate::providers::ProviderError;
use crate::types::Chunk;
use async_trait::async_trait;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Pairwise relevance scorer over `(query, passage)` pairs
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// One score per passage, in input order; higher is more relevant
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, ProviderError>;

    fn model_name(&self) -> &str;
}

/// FastEmbed cross-encoder, loaded on first use
pub struct FastEmbedCrossEncoder {
    model: OnceCell<Arc<TextRerank>>,
    reranker_model: RerankerModel,
    model_name: String,
}

impl FastEmbedCrossEncoder {
    /// Create a cross-encoder for a supported model name
    ///
    /// # Arguments
    /// * `model_name` - e.g. "BAAI/bge-reranker-base"
    pub fn new(model_name: &str) -> Result<Self, ProviderError> {
        let reranker_model = match model_name {
            "BAAI/bge-reranker-base" => RerankerModel::BGERerankerBase,
            "BAAI/bge-reranker-v2-m3" => RerankerModel::BGERerankerV2M3,
            "jinaai/jina-reranker-v1-turbo-en" => RerankerModel::JINARerankerV1TurboEn,
            _ => {
                return Err(ProviderError::InitializationError(format!(
                    "Unsupported reranker model: {}. Supported: BAAI/bge-reranker-base, \
                     BAAI/bge-reranker-v2-m3, jinaai/jina-reranker-v1-turbo-en",
                    model_name
                )));
            }
        };

        Ok(Self {
            model: OnceCell::new(),
            reranker_model,
            model_name: model_name.to_string(),
        })
    }

    /// Create reranker with default model
    pub fn with_default_model() -> Result<Self, ProviderError> {
        Self::new("BAAI/bge-reranker-base")
    }

    async fn model(&self) -> Result<Arc<TextRerank>, ProviderError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                tracing::info!("Initializing reranker model: {}", self.model_name);

                let reranker_model = self.reranker_model.clone();
                let loaded = tokio::task::spawn_blocking(move || {
                    let init_options =
                        RerankInitOptions::new(reranker_model).with_show_download_progress(true);
                    TextRerank::try_new(init_options)
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
impl RelevanceScorer for FastEmbedCrossEncoder {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, ProviderError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model().await?;
        let query = query.to_string();
        let documents = passages.to_vec();
        let expected = documents.len();

        let results = tokio::task::spawn_blocking(move || {
            let documents: Vec<&str> = documents.iter().map(|s| s.as_str()).collect();
            model.rerank(query.as_str(), documents, false, None)
        })
        .await
        .map_err(|e| ProviderError::ScoringError(e.to_string()))?
        .map_err(|e| ProviderError::ScoringError(e.to_string()))?;

        // FastEmbed returns results sorted by score; put them back in input order
        let mut scores = vec![f32::NEG_INFINITY; expected];
        for result in results {
            match scores.get_mut(result.index) {
                Some(slot) => *slot = result.score,
                None => {
                    return Err(ProviderError::ScoringError(format!(
                        "Reranker returned out-of-range index {}",
                        result.index
                    )));
                }
            }
        }

        Ok(scores)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Rescores candidates against the query and keeps the best `top_k`
pub struct Reranker {
    scorer: Arc<dyn RelevanceScorer>,
    top_k: usize,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>, top_k: usize) -> Self {
        Self { scorer, top_k }
    }

    /// Rerank chunks by descending relevance, truncated to `top_k`, each
    /// chunk's score replaced by the scorer's.
    ///
    /// Empty input returns empty output without calling the scorer.
    pub async fn rerank(&self, query: &str, chunks: Vec<Chunk>) -> Result<Vec<Chunk>, ProviderError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let passages: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let scores = self.scorer.score(query, &passages).await?;
        if scores.len() != chunks.len() {
            return Err(ProviderError::ScoringError(format!(
                "Expected {} scores, got {}",
                chunks.len(),
                scores.len()
            )));
        }

        let mut scored: Vec<(Chunk, f32)> = chunks.into_iter().zip(scores).collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.top_k);

        debug!("Reranked down to {} chunks", scored.len());

        Ok(scored
            .into_iter()
            .map(|(chunk, score)| chunk.with_score(score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scores a passage by its length
    #[derive(Default)]
    struct LengthScorer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RelevanceScorer for LengthScorer {
        async fn score(&self, _query: &str, passages: &[String]) -> Result<Vec<f32>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(passages.iter().map(|p| p.len() as f32).collect())
        }

        fn model_name(&self) -> &str {
            "length"
        }
    }

    fn chunk(text: &str) -> Chunk {
        Chunk::new(text, "doc.pdf", None, "doc", text).with_score(0.01)
    }

    #[tokio::test]
    async fn test_empty_input_skips_scorer() {
        let scorer = Arc::new(LengthScorer::default());
        let reranker = Reranker::new(scorer.clone(), 5);

        assert!(reranker.rerank("q", Vec::new()).await.unwrap().is_empty());
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sorts_truncates_and_overwrites_scores() {
        let reranker = Reranker::new(Arc::new(LengthScorer::default()), 2);
        let chunks = vec![chunk("bb"), chunk("dddd"), chunk("a"), chunk("ccc")];

        let reranked = reranker.rerank("q", chunks).await.unwrap();

        let contents: Vec<&str> = reranked.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["dddd", "ccc"]);
        assert_eq!(reranked[0].score(), 4.0);
    }

    #[tokio::test]
    async fn test_ties_keep_input_order() {
        let reranker = Reranker::new(Arc::new(LengthScorer::default()), 5);
        let reranked = reranker
            .rerank("q", vec![chunk("ab"), chunk("cd"), chunk("ef")])
            .await
            .unwrap();

        let contents: Vec<&str> = reranked.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["ab", "cd", "ef"]);
    }

    #[tokio::test]
    #[ignore] // Requires model download
    async fn test_cross_encoder_scores_in_input_order() {
        let scorer = FastEmbedCrossEncoder::with_default_model().unwrap();
        let passages = vec![
            "The weather is nice today.".to_string(),
            "Paris is the capital of France.".to_string(),
        ];

        let scores = scorer
            .score("What is the capital of France?", &passages)
            .await
            .unwrap();

        assert_eq!(scores.len(), 2);
        assert!(scores[1] > scores[0]);
    }
}
