//! Conversational turns on top of the engine
//!
//! A turn loads recent history, persists the user message, runs the engine and
//! persists the assistant answer with its sources. A turn that fails or is
//! cancelled keeps only the user message.

use crate::engine::Engine;
use crate::error::{RagError, Result};
use crate::storage::{ChatHistoryStore, ConversationStore};
use crate::types::{ConversationTurn, Role, Source, StreamEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Result of one conversational turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub conversation_id: String,
    pub answer: String,
    pub sources: Vec<Source>,
}

pub struct ChatService {
    engine: Arc<Engine>,
    store: Arc<ConversationStore>,
    history_window: usize,
}

impl ChatService {
    pub fn new(engine: Arc<Engine>, store: Arc<ConversationStore>, history_window: usize) -> Self {
        Self {
            engine,
            store,
            history_window,
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Run a synchronous turn, creating a conversation when none is given
    pub async fn ask(&self, conversation_id: Option<&str>, message: &str) -> Result<ChatReply> {
        let (conversation_id, history) = self.begin_turn(conversation_id, message).await?;

        let answer = match self.engine.query(message, &history).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(conversation = %conversation_id, "Turn failed: {}", e);
                return Err(e);
            }
        };

        self.finish_turn(&conversation_id, &answer.answer, &answer.sources)?;

        Ok(ChatReply {
            conversation_id,
            answer: answer.answer,
            sources: answer.sources,
        })
    }

    /// Run a streaming turn; events go to `tx` as the engine produces them
    pub async fn ask_streaming(
        &self,
        conversation_id: Option<&str>,
        message: &str,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<ChatReply> {
        let (conversation_id, history) = self.begin_turn(conversation_id, message).await?;

        let outcome = match self.engine.stream_query(message, &history, tx).await {
            Ok(outcome) => outcome,
            Err(RagError::Cancelled) => {
                debug!(conversation = %conversation_id, "Stream cancelled, answer discarded");
                return Err(RagError::Cancelled);
            }
            Err(e) => {
                warn!(conversation = %conversation_id, "Streaming turn failed: {}", e);
                return Err(e);
            }
        };

        self.finish_turn(&conversation_id, &outcome.answer, &outcome.sources)?;

        Ok(ChatReply {
            conversation_id,
            answer: outcome.answer,
            sources: outcome.sources,
        })
    }

    /// Resolve the conversation, load its recent history, then record the user message
    async fn begin_turn(
        &self,
        conversation_id: Option<&str>,
        message: &str,
    ) -> Result<(String, Vec<ConversationTurn>)> {
        let (conversation_id, history) = match conversation_id {
            Some(id) => {
                if self.store.get(id)?.is_none() {
                    return Err(RagError::ConversationNotFound { id: id.to_string() });
                }
                let history = self.store.last_n_turns(id, self.history_window).await?;
                (id.to_string(), history)
            }
            None => (self.store.create(message)?.id, Vec::new()),
        };

        self.store
            .append_message(&conversation_id, Role::User, message, None)?;
        debug!(conversation = %conversation_id, turns = history.len(), "Turn started");

        Ok((conversation_id, history))
    }

    fn finish_turn(&self, conversation_id: &str, answer: &str, sources: &[Source]) -> Result<()> {
        self.store
            .append_message(conversation_id, Role::Assistant, answer, Some(sources))?;
        Ok(())
    }
}
