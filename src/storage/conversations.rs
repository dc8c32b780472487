//! Conversation and message persistence

use super::Database;
use crate::error::{RagError, Result};
use crate::types::{char_prefix, ConversationTurn, Role, Source};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const TITLE_CHARS: usize = 50;

/// Supplies the recent turns of a conversation
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    /// The most recent `n` turns, oldest first
    async fn last_n_turns(&self, conversation_id: &str, n: usize) -> Result<Vec<ConversationTurn>>;
}

/// Conversation summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Persisted message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub sources: Option<Vec<Source>>,
    pub created_at: String,
}

/// SQLite-backed conversation store
pub struct ConversationStore {
    db: Arc<Database>,
}

impl ConversationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a conversation titled after the first 50 characters of its first message
    pub fn create(&self, first_message: &str) -> Result<Conversation> {
        let now = Utc::now().to_rfc3339();
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            title: char_prefix(first_message, TITLE_CHARS).to_string(),
            created_at: now.clone(),
            updated_at: now,
        };

        let conn = self.db.get_conn()?;
        conn.execute(
            "INSERT INTO conversations (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                conversation.id,
                conversation.title,
                conversation.created_at,
                conversation.updated_at
            ],
        )?;

        Ok(conversation)
    }

    pub fn get(&self, id: &str) -> Result<Option<Conversation>> {
        let conn = self.db.get_conn()?;
        let conversation = conn
            .query_row(
                "SELECT id, title, created_at, updated_at FROM conversations WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Conversation {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        created_at: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(conversation)
    }

    /// All conversations, most recently updated first
    pub fn list(&self) -> Result<Vec<Conversation>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, created_at, updated_at FROM conversations ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Conversation {
                id: row.get(0)?,
                title: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Append a message and bump the conversation's `updated_at`
    pub fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        sources: Option<&[Source]>,
    ) -> Result<StoredMessage> {
        let now = Utc::now().to_rfc3339();
        let sources_json = sources
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RagError::Json {
                source: e,
                context: "Failed to encode message sources".to_string(),
            })?;

        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            sources: sources.map(|s| s.to_vec()),
            created_at: now.clone(),
        };

        let mut conn = self.db.get_conn()?;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![now, conversation_id],
        )?;
        if updated == 0 {
            return Err(RagError::ConversationNotFound {
                id: conversation_id.to_string(),
            });
        }

        tx.execute(
            "INSERT INTO messages (id, conversation_id, role, content, sources, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id,
                conversation_id,
                role.as_str(),
                message.content,
                sources_json,
                message.created_at
            ],
        )?;
        tx.commit()?;

        Ok(message)
    }

    /// All messages of a conversation, oldest first
    pub fn messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, role, content, sources, created_at FROM messages
             WHERE conversation_id = ?1 ORDER BY seq",
        )?;

        let rows = stmt.query_map(params![conversation_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, role, content, sources, created_at) = row?;
            let role = Role::parse(&role).ok_or_else(|| {
                RagError::Other(anyhow::anyhow!("Unknown message role '{}'", role))
            })?;
            let sources = sources
                .map(|s| serde_json::from_str::<Vec<Source>>(&s))
                .transpose()
                .map_err(|e| RagError::Json {
                    source: e,
                    context: format!("Failed to decode sources of message {}", id),
                })?;

            messages.push(StoredMessage {
                id,
                role,
                content,
                sources,
                created_at,
            });
        }

        Ok(messages)
    }
}

#[async_trait]
impl ChatHistoryStore for ConversationStore {
    async fn last_n_turns(&self, conversation_id: &str, n: usize) -> Result<Vec<ConversationTurn>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT role, content FROM messages
             WHERE conversation_id = ?1 ORDER BY seq DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![conversation_id, n as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (role, content) = row?;
            if let Some(role) = Role::parse(&role) {
                turns.push(ConversationTurn { role, content });
            }
        }

        // Newest-first from SQL, chronological for callers
        turns.reverse();
        Ok(turns)
    }
}
