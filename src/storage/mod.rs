//! Storage layer for ragpipe
//!
//! SQLite holds the corpus (chunks plus embeddings) and the conversation log

mod chunks;
pub mod conversations;
pub mod database;

pub use chunks::StoredChunk;
pub use conversations::{ChatHistoryStore, Conversation, ConversationStore, StoredMessage};
pub use database::{Database, DbPool, DbStats};
