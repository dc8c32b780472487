//! Query engine
//!
//! Composes the retrieval stages per the resolved strategy:
//! condense → retrieve → [rerank] → postprocess → synthesize.

use crate::config::RetrievalConfig;
use crate::error::{RagError, Result};
use crate::index::CorpusIndex;
use crate::providers::{EmbeddingProvider, TextGenerator};
use crate::retrieval::{
    FusionConfig, HybridRetriever, PostProcessor, QueryExpander, QueryRewriter, RelevanceScorer,
    Reranker, RetrievalStrategy,
};
use crate::synthesis::{emit, AnswerSynthesizer, StreamOutcome, NO_CONTEXT_MESSAGE};
use crate::types::{Answer, Chunk, ConversationTurn, StreamEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Buffer of the event channel created by `Engine::spawn_stream`
pub const STREAM_BUFFER: usize = 64;

/// Stage of a query, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Condensing,
    Retrieving,
    Reranking,
    PostProcessing,
    Generating,
    SourcesEmitted,
    Done,
    /// Retrieval found nothing; terminal
    EmptyContext,
}

/// Context prepared for synthesis
enum Prepared {
    Chunks(Vec<Chunk>),
    Empty,
}

pub struct Engine {
    rewriter: QueryRewriter,
    expander: QueryExpander,
    hybrid: Arc<HybridRetriever>,
    reranker: Option<Reranker>,
    postprocessor: PostProcessor,
    synthesizer: AnswerSynthesizer,
    strategy: RetrievalStrategy,
    history_window: usize,
}

impl Engine {
    /// Assemble an engine.
    ///
    /// Fails with a configuration error for an unknown strategy, invalid fusion
    /// weights, or reranking enabled without a scorer.
    pub fn new(
        config: &RetrievalConfig,
        corpus: Arc<CorpusIndex>,
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn EmbeddingProvider>,
        scorer: Option<Arc<dyn RelevanceScorer>>,
    ) -> Result<Self> {
        let strategy = RetrievalStrategy::resolve(config)?;
        let fusion =
            FusionConfig::from_retrieval(config).map_err(|e| RagError::Config(e.to_string()))?;

        let reranker = if config.use_reranking {
            let scorer = scorer.ok_or_else(|| {
                RagError::Config("Reranking is enabled but no reranker model is configured".into())
            })?;
            Some(Reranker::new(scorer, config.rerank_top_k))
        } else {
            None
        };

        let hybrid = Arc::new(HybridRetriever::new(
            Arc::clone(&corpus),
            fusion,
            config.retrieval_top_k,
        ));

        info!(
            strategy = %strategy,
            reranking = reranker.is_some(),
            "Query engine ready"
        );

        Ok(Self {
            rewriter: QueryRewriter::new(Arc::clone(&generator)),
            expander: QueryExpander::new(
                Arc::clone(&generator),
                Arc::clone(&hybrid),
                corpus,
                config.retrieval_top_k,
            ),
            hybrid,
            reranker,
            postprocessor: PostProcessor::new(embedder, config.redundancy_threshold),
            synthesizer: AnswerSynthesizer::new(generator),
            strategy,
            history_window: config.history_window,
        })
    }

    /// Answer a question in one shot
    pub async fn query(&self, question: &str, history: &[ConversationTurn]) -> Result<Answer> {
        let history = self.recent(history);

        let chunks = match self.prepare(question, history).await? {
            Prepared::Chunks(chunks) => chunks,
            Prepared::Empty => {
                return Ok(Answer {
                    answer: NO_CONTEXT_MESSAGE.to_string(),
                    sources: Vec::new(),
                });
            }
        };

        stage(QueryStage::Generating);
        let answer = self.synthesizer.synthesize(question, &chunks, history).await?;
        stage(QueryStage::Done);

        Ok(answer)
    }

    /// Answer a question as a stream of events sent into `tx`.
    ///
    /// On success the channel has received zero or more `Token`s, one
    /// `Sources` and one `Done`. Errors are returned without `Done`; a dropped
    /// receiver yields `RagError::Cancelled` and stops all upstream work.
    pub async fn stream_query(
        &self,
        question: &str,
        history: &[ConversationTurn],
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<StreamOutcome> {
        let history = self.recent(history);

        let prepared = tokio::select! {
            biased;
            _ = tx.closed() => return Err(RagError::Cancelled),
            prepared = self.prepare(question, history) => prepared?,
        };

        let chunks = match prepared {
            Prepared::Chunks(chunks) => chunks,
            Prepared::Empty => {
                emit(
                    &tx,
                    StreamEvent::Token {
                        content: NO_CONTEXT_MESSAGE.to_string(),
                    },
                )
                .await?;
                emit(&tx, StreamEvent::Sources { sources: Vec::new() }).await?;
                emit(&tx, StreamEvent::Done).await?;

                return Ok(StreamOutcome {
                    answer: NO_CONTEXT_MESSAGE.to_string(),
                    sources: Vec::new(),
                });
            }
        };

        stage(QueryStage::Generating);
        let outcome = self
            .synthesizer
            .stream(question, &chunks, history, &tx)
            .await?;
        stage(QueryStage::SourcesEmitted);
        stage(QueryStage::Done);

        Ok(outcome)
    }

    /// Run `stream_query` on its own task, returning the event receiver and
    /// the task handle
    pub fn spawn_stream(
        self: Arc<Self>,
        question: String,
        history: Vec<ConversationTurn>,
    ) -> (mpsc::Receiver<StreamEvent>, JoinHandle<Result<StreamOutcome>>) {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let handle =
            tokio::spawn(async move { self.stream_query(&question, &history, tx).await });
        (rx, handle)
    }

    /// Condense, retrieve, rerank and postprocess
    async fn prepare(&self, question: &str, history: &[ConversationTurn]) -> Result<Prepared> {
        stage(QueryStage::Condensing);
        let condensed = self.rewriter.condense(question, history).await?;

        stage(QueryStage::Retrieving);
        let chunks = self.retrieve(&condensed).await?;
        debug!(strategy = %self.strategy, count = chunks.len(), "Retrieved candidates");

        if chunks.is_empty() {
            stage(QueryStage::EmptyContext);
            return Ok(Prepared::Empty);
        }

        let chunks = match &self.reranker {
            Some(reranker) => {
                stage(QueryStage::Reranking);
                reranker.rerank(&condensed, chunks).await?
            }
            None => chunks,
        };

        stage(QueryStage::PostProcessing);
        let chunks = self.postprocessor.process(chunks).await?;

        Ok(Prepared::Chunks(chunks))
    }

    /// First-stage retrieval for the resolved strategy
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        match self.strategy {
            RetrievalStrategy::MultiQuery => self.expander.multi_query(query).await,
            RetrievalStrategy::Hyde => self.expander.hyde(query).await,
            RetrievalStrategy::Hybrid => Ok(self.hybrid.retrieve(query).await?),
            RetrievalStrategy::PlainVector => Ok(self.hybrid.vector_only(query).await?),
        }
    }

    /// The most recent `history_window` turns
    fn recent<'a>(&self, history: &'a [ConversationTurn]) -> &'a [ConversationTurn] {
        &history[history.len().saturating_sub(self.history_window)..]
    }
}

fn stage(stage: QueryStage) {
    debug!(stage = ?stage, "Query stage");
}
