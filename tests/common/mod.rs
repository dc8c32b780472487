//! Deterministic stand-ins for the model backends
#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use ragpipe::config::RetrievalConfig;
use ragpipe::engine::Engine;
use ragpipe::index::{CorpusIndex, HnswParams, HnswVectorStore};
use ragpipe::providers::{EmbeddingProvider, ProviderError, TextGenerator, TokenStream};
use ragpipe::retrieval::RelevanceScorer;
use ragpipe::storage::Database;
use ragpipe::types::{Chunk, StreamEvent};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Words the embedder maps to their own axis
pub const VOCABULARY: [&str; 6] = ["rust", "python", "cooking", "music", "tokio", "serde"];

/// Embeds text as keyword counts over `VOCABULARY` plus a small constant
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        VOCABULARY
            .iter()
            .map(|word| 0.01 + lower.matches(word).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len()
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

/// How the scripted generator streams its answer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamMode {
    /// Word-sized fragments of the answer, with one empty fragment mixed in
    Normal,
    /// Fail after emitting this many fragments
    FailAfter(usize),
    /// Never finish; one fragment every few milliseconds
    Endless,
}

/// Which template a prompt was rendered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    MultiQuery,
    Hyde,
    Condense,
    Answer,
}

impl PromptKind {
    pub fn of(prompt: &str) -> Self {
        if prompt.starts_with("You are an AI assistant helping to generate multiple search queries") {
            PromptKind::MultiQuery
        } else if prompt.starts_with("Write a short passage") {
            PromptKind::Hyde
        } else if prompt.starts_with("Given the following conversation history") {
            PromptKind::Condense
        } else {
            PromptKind::Answer
        }
    }
}

/// Generator answering each prompt kind with a fixed script
pub struct ScriptedGenerator {
    pub paraphrases: String,
    pub hyde_passage: String,
    pub condensed: String,
    pub answer: String,
    pub stream_mode: StreamMode,
    pub prompts: Mutex<Vec<(PromptKind, String)>>,
    pub stream_calls: AtomicUsize,
    /// Set when an answer stream is dropped
    pub stream_dropped: Arc<AtomicBool>,
}

impl ScriptedGenerator {
    pub fn new(answer: &str) -> Self {
        Self {
            paraphrases: String::new(),
            hyde_passage: String::new(),
            condensed: String::new(),
            answer: answer.to_string(),
            stream_mode: StreamMode::Normal,
            prompts: Mutex::new(Vec::new()),
            stream_calls: AtomicUsize::new(0),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_paraphrases(mut self, paraphrases: &str) -> Self {
        self.paraphrases = paraphrases.to_string();
        self
    }

    pub fn with_hyde_passage(mut self, passage: &str) -> Self {
        self.hyde_passage = passage.to_string();
        self
    }

    pub fn with_condensed(mut self, condensed: &str) -> Self {
        self.condensed = condensed.to_string();
        self
    }

    pub fn with_stream_mode(mut self, mode: StreamMode) -> Self {
        self.stream_mode = mode;
        self
    }

    /// Number of `complete` calls rendered from a given template
    pub fn calls(&self, kind: PromptKind) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.prompts.lock().unwrap().len() + self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self, kind: PromptKind) -> Option<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
    }

    fn fragments(&self) -> Vec<String> {
        let mut fragments: Vec<String> = self
            .answer
            .split_inclusive(' ')
            .map(|s| s.to_string())
            .collect();
        fragments.insert(fragments.len().min(1), String::new());
        fragments
    }
}

/// Flags the owning stream as dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let kind = PromptKind::of(prompt);
        self.prompts
            .lock()
            .unwrap()
            .push((kind, prompt.to_string()));

        Ok(match kind {
            PromptKind::MultiQuery => self.paraphrases.clone(),
            PromptKind::Hyde => self.hyde_passage.clone(),
            PromptKind::Condense => self.condensed.clone(),
            PromptKind::Answer => self.answer.clone(),
        })
    }

    async fn complete_streaming(&self, _prompt: &str) -> Result<TokenStream, ProviderError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let flag = DropFlag(Arc::clone(&self.stream_dropped));

        match self.stream_mode {
            StreamMode::Normal => {
                let items: Vec<Result<String, ProviderError>> =
                    self.fragments().into_iter().map(Ok).collect();
                Ok(stream::iter(items)
                    .map(move |item| {
                        let _keep = &flag;
                        item
                    })
                    .boxed())
            }
            StreamMode::FailAfter(n) => {
                let mut items: Vec<Result<String, ProviderError>> =
                    self.fragments().into_iter().take(n).map(Ok).collect();
                items.push(Err(ProviderError::StreamError("connection reset".to_string())));
                Ok(stream::iter(items)
                    .map(move |item| {
                        let _keep = &flag;
                        item
                    })
                    .boxed())
            }
            StreamMode::Endless => Ok(stream::unfold((flag, 0usize), |(flag, i)| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Some((Ok(format!("tok{} ", i)), (flag, i + 1)))
            })
            .boxed()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Scores passages by how many query words they contain
pub struct OverlapScorer {
    pub calls: AtomicUsize,
}

impl OverlapScorer {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RelevanceScorer for OverlapScorer {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let words: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .collect();

        Ok(passages
            .iter()
            .map(|p| {
                let lower = p.to_lowercase();
                words.iter().filter(|w| !w.is_empty() && lower.contains(w.as_str())).count() as f32
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "overlap"
    }
}

/// A small corpus with one chunk per vocabulary topic
pub fn topic_corpus() -> Vec<Chunk> {
    vec![
        Chunk::new(
            "Rust ownership: every value has a single owner and is dropped when the owner goes out of scope.",
            "rust-book.pdf",
            Some(4),
            "rust-book",
            "rust-1",
        ),
        Chunk::new(
            "Python decorators wrap a function to extend its behaviour without modifying it.",
            "python-guide.pdf",
            Some(12),
            "python-guide",
            "python-1",
        ),
        Chunk::new(
            "Cooking pasta: salt the water generously and stop when the pasta is al dente.",
            "kitchen.md",
            None,
            "kitchen",
            "cooking-1",
        ),
        Chunk::new(
            "Music theory: a major scale follows the whole, whole, half step pattern.",
            "music.md",
            None,
            "music",
            "music-1",
        ),
        Chunk::new(
            "Tokio schedules async tasks on a work-stealing multi-threaded runtime.",
            "tokio.md",
            None,
            "tokio",
            "tokio-1",
        ),
    ]
}

/// Corpus backed by an in-memory SQLite database and the HNSW store
pub async fn corpus_with(chunks: Vec<Chunk>, embedder: Arc<KeywordEmbedder>) -> Arc<CorpusIndex> {
    let db = Arc::new(Database::in_memory().unwrap());
    let store = HnswVectorStore::new(db, embedder, HnswParams::default());
    let corpus = Arc::new(CorpusIndex::new(Arc::new(store)));
    if !chunks.is_empty() {
        corpus.add_documents(chunks).await.unwrap();
    }
    corpus
}

/// Retrieval settings with every optional stage switched off
pub fn plain_config(strategy: &str, top_k: usize) -> RetrievalConfig {
    RetrievalConfig {
        strategy: Some(strategy.to_string()),
        use_reranking: false,
        retrieval_top_k: top_k,
        ..RetrievalConfig::default()
    }
}

pub struct Harness {
    pub engine: Arc<Engine>,
    pub generator: Arc<ScriptedGenerator>,
    pub embedder: Arc<KeywordEmbedder>,
    pub scorer: Arc<OverlapScorer>,
    pub corpus: Arc<CorpusIndex>,
}

pub async fn harness(
    config: RetrievalConfig,
    chunks: Vec<Chunk>,
    generator: ScriptedGenerator,
) -> Harness {
    let embedder = Arc::new(KeywordEmbedder::new());
    let corpus = corpus_with(chunks, Arc::clone(&embedder)).await;
    let generator = Arc::new(generator);
    let scorer = Arc::new(OverlapScorer::new());

    let engine = Engine::new(
        &config,
        Arc::clone(&corpus),
        generator.clone(),
        embedder.clone(),
        Some(scorer.clone() as Arc<dyn RelevanceScorer>),
    )
    .unwrap();

    Harness {
        engine: Arc::new(engine),
        generator,
        embedder,
        scorer,
        corpus,
    }
}

/// Drain every event until the sender side is gone
pub async fn collect_events(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

pub fn chunk_ids(chunks: &[Chunk]) -> Vec<&str> {
    chunks.iter().map(|c| c.metadata.chunk_id.as_str()).collect()
}
