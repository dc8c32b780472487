//! Grounded answer synthesis
//!
//! Renders the retrieved chunks into the answer prompt and generates either a
//! whole answer or a stream of `StreamEvent`s: tokens, then exactly one
//! `Sources`, then exactly one `Done`.

use crate::error::{RagError, Result};
use crate::prompts::{self, ANSWER};
use crate::providers::{ProviderError, TextGenerator};
use crate::types::{format_history, Answer, Chunk, ConversationTurn, Source, StreamEvent};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Answer given when retrieval finds nothing
pub const NO_CONTEXT_MESSAGE: &str =
    "I don't have enough context to answer this question. Please upload relevant documents first.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Outcome of a completed stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    /// Concatenation of every emitted token
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Render chunks as `[Source: file]` blocks separated by `---`
pub fn build_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("[Source: {}]\n{}", chunk.metadata.source_file, chunk.content))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Chat-history block of the answer prompt; empty without history
pub fn history_block(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        String::new()
    } else {
        format!("\nChat History:\n{}\n", format_history(history))
    }
}

pub fn build_prompt(question: &str, chunks: &[Chunk], history: &[ConversationTurn]) -> String {
    let context = build_context(chunks);
    let history = history_block(history);
    prompts::render(
        ANSWER,
        &[
            ("chat_history_block", history.as_str()),
            ("context", context.as_str()),
            ("question", question),
        ],
    )
}

/// Citations for chunks, in context order
pub fn sources(chunks: &[Chunk]) -> Vec<Source> {
    chunks.iter().map(Source::from_chunk).collect()
}

pub struct AnswerSynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// One completion for the whole answer
    pub async fn synthesize(
        &self,
        question: &str,
        chunks: &[Chunk],
        history: &[ConversationTurn],
    ) -> std::result::Result<Answer, ProviderError> {
        let prompt = build_prompt(question, chunks, history);
        let answer = self.generator.complete(&prompt).await?;

        Ok(Answer {
            answer,
            sources: sources(chunks),
        })
    }

    /// Stream the answer into `tx`.
    ///
    /// Non-empty fragments are forwarded as they arrive. On success exactly one
    /// `Sources` and one `Done` follow. A provider failure returns the error
    /// without `Done`. If the receiver goes away the provider stream is dropped
    /// at once and `RagError::Cancelled` is returned.
    pub async fn stream(
        &self,
        question: &str,
        chunks: &[Chunk],
        history: &[ConversationTurn],
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<StreamOutcome> {
        let prompt = build_prompt(question, chunks, history);

        let mut tokens = tokio::select! {
            biased;
            _ = tx.closed() => return Err(RagError::Cancelled),
            started = self.generator.complete_streaming(&prompt) => started?,
        };

        let mut answer = String::new();
        let mut fragments = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => return Err(RagError::Cancelled),
                next = tokens.next() => next,
            };

            match next {
                None => break,
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(fragment)) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    answer.push_str(&fragment);
                    fragments += 1;
                    emit(tx, StreamEvent::Token { content: fragment }).await?;
                }
            }
        }

        debug!(fragments, chars = answer.len(), "Answer stream finished");

        let sources = sources(chunks);
        emit(
            tx,
            StreamEvent::Sources {
                sources: sources.clone(),
            },
        )
        .await?;
        emit(tx, StreamEvent::Done).await?;

        Ok(StreamOutcome { answer, sources })
    }
}

/// Send one event; a closed channel means the consumer is gone
pub(crate) async fn emit(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> Result<()> {
    tx.send(event).await.map_err(|_| RagError::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_context() {
        let chunks = vec![
            Chunk::new("first passage", "a.pdf", Some(1), "d1", "c1"),
            Chunk::new("second passage", "b.md", None, "d2", "c2"),
        ];
        assert_eq!(
            build_context(&chunks),
            "[Source: a.pdf]\nfirst passage\n\n---\n\n[Source: b.md]\nsecond passage"
        );
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_prompt_includes_history_only_when_present() {
        let chunks = vec![Chunk::new("ctx", "a.pdf", None, "d", "c")];

        let bare = build_prompt("What?", &chunks, &[]);
        assert!(!bare.contains("Chat History:"));
        assert!(bare.contains("Context:\n[Source: a.pdf]\nctx\n\nQuestion: What?"));

        let history = vec![ConversationTurn::user("Hi"), ConversationTurn::assistant("Hello")];
        let with_history = build_prompt("What?", &chunks, &history);
        assert!(with_history.contains("\nChat History:\nUser: Hi\nAssistant: Hello\n\nContext:"));
    }
}
