//! Wires configuration into the running services

use crate::chat::ChatService;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::index::{CorpusIndex, HnswParams, HnswVectorStore};
use crate::providers::{factory, EmbeddingProvider};
use crate::storage::{ConversationStore, Database};
use std::sync::Arc;
use tracing::info;

/// Corpus services, enough for ingestion and deletion
pub struct Corpus {
    pub db: Arc<Database>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<CorpusIndex>,
}

impl Corpus {
    /// Open the corpus stored under the configured data directory
    pub fn open(config: &Config) -> Result<Self> {
        let db = Arc::new(Database::new(&config.storage.database_path())?);
        Self::with_database(config, db)
    }

    pub fn with_database(config: &Config, db: Arc<Database>) -> Result<Self> {
        let embedder = factory::build_embedder(&config.embedding)?;
        let store = HnswVectorStore::new(
            Arc::clone(&db),
            Arc::clone(&embedder),
            HnswParams::from_config(&config.indexing, &config.retrieval),
        );

        Ok(Self {
            db,
            embedder,
            index: Arc::new(CorpusIndex::new(Arc::new(store))),
        })
    }
}

/// Fully assembled application
pub struct App {
    pub config: Config,
    pub corpus: Corpus,
    pub engine: Arc<Engine>,
    pub chat: ChatService,
}

impl App {
    /// Build every service; configuration problems surface here, before any query
    pub fn bootstrap(config: Config) -> Result<Self> {
        let corpus = Corpus::open(&config)?;

        let generator = factory::build_generator(&config.llm)?;
        let scorer = if config.retrieval.use_reranking {
            Some(factory::build_scorer(&config.reranker)?)
        } else {
            None
        };

        let engine = Arc::new(Engine::new(
            &config.retrieval,
            Arc::clone(&corpus.index),
            generator,
            Arc::clone(&corpus.embedder),
            scorer,
        )?);

        let store = Arc::new(ConversationStore::new(Arc::clone(&corpus.db)));
        let chat = ChatService::new(
            Arc::clone(&engine),
            store,
            config.retrieval.history_window,
        );

        info!(
            "ragpipe ready (llm: {}/{}, embeddings: {})",
            config.llm.provider, config.llm.model, config.embedding.model
        );

        Ok(Self {
            config,
            corpus,
            engine,
            chat,
        })
    }
}
