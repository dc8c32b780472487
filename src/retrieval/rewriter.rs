//! Conversational query condensation

use crate::prompts::{self, CONDENSE_QUESTION};
use crate::providers::{ProviderError, TextGenerator};
use crate::types::{format_history, ConversationTurn};
use std::sync::Arc;
use tracing::debug;

/// Rewrites follow-up questions into standalone queries
pub struct QueryRewriter {
    generator: Arc<dyn TextGenerator>,
}

impl QueryRewriter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Condense `question` against prior turns.
    ///
    /// Without history the question is returned unchanged and the generator is
    /// not called.
    pub async fn condense(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ProviderError> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let chat_history = format_history(history);
        let prompt = prompts::render(
            CONDENSE_QUESTION,
            &[("chat_history", chat_history.as_str()), ("question", question)],
        );

        let standalone = self.generator.complete(&prompt).await?.trim().to_string();
        debug!(original = %question, condensed = %standalone, "Condensed question");
        Ok(standalone)
    }
}
