// Integration tests for conversational turns and their persistence policy

mod common;

use common::*;
use ragpipe::chat::ChatService;
use ragpipe::error::RagError;
use ragpipe::storage::{ConversationStore, Database};
use ragpipe::types::{Role, StreamEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

const ANSWER: &str = "Values are owned by exactly one binding.";

async fn service(generator: ScriptedGenerator) -> (ChatService, Harness) {
    let h = harness(plain_config("hybrid", 3), topic_corpus(), generator).await;
    let store = Arc::new(ConversationStore::new(Arc::new(Database::in_memory().unwrap())));
    (ChatService::new(h.engine.clone(), store, 10), h)
}

#[tokio::test]
async fn test_first_turn_creates_conversation_and_persists_both_messages() {
    let (chat, _h) = service(ScriptedGenerator::new(ANSWER)).await;

    let reply = chat.ask(None, "How does Rust ownership work?").await.unwrap();
    assert_eq!(reply.answer, ANSWER);
    assert!(!reply.sources.is_empty());

    let conversation = chat.store().get(&reply.conversation_id).unwrap().unwrap();
    assert_eq!(conversation.title, "How does Rust ownership work?");

    let messages = chat.store().messages(&reply.conversation_id).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert!(messages[0].sources.is_none());
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, ANSWER);
    assert_eq!(messages[1].sources.as_deref(), Some(reply.sources.as_slice()));
}

#[tokio::test]
async fn test_follow_up_is_condensed_against_stored_history() {
    let generator = ScriptedGenerator::new(ANSWER).with_condensed("rust ownership");
    let (chat, h) = service(generator).await;

    let first = chat.ask(None, "Tell me about Rust").await.unwrap();
    assert_eq!(h.generator.calls(PromptKind::Condense), 0);

    let second = chat
        .ask(Some(&first.conversation_id), "And ownership?")
        .await
        .unwrap();
    assert_eq!(second.conversation_id, first.conversation_id);
    assert_eq!(h.generator.calls(PromptKind::Condense), 1);

    // History is read before the new user message is stored
    let condense = h.generator.last_prompt(PromptKind::Condense).unwrap();
    assert!(condense.contains(&format!("User: Tell me about Rust\nAssistant: {}", ANSWER)));
    assert!(!condense.contains("User: And ownership?"));

    assert_eq!(chat.store().messages(&first.conversation_id).unwrap().len(), 4);
}

#[tokio::test]
async fn test_streaming_turn_persists_streamed_answer() {
    let (chat, _h) = service(ScriptedGenerator::new(ANSWER)).await;
    let (tx, mut rx) = mpsc::channel(64);

    let consumer = async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    };
    let (reply, events) = tokio::join!(chat.ask_streaming(None, "rust ownership", tx), consumer);
    let reply = reply.unwrap();

    assert_eq!(events.last(), Some(&StreamEvent::Done));
    let messages = chat.store().messages(&reply.conversation_id).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, ANSWER);
}

#[tokio::test]
async fn test_failed_stream_keeps_only_user_message() {
    let generator = ScriptedGenerator::new(ANSWER).with_stream_mode(StreamMode::FailAfter(1));
    let (chat, _h) = service(generator).await;
    let conversation = chat.store().create("rust ownership").unwrap();

    let (tx, rx) = mpsc::channel(64);
    let (result, _events) = tokio::join!(
        chat.ask_streaming(Some(&conversation.id), "rust ownership", tx),
        collect_events(rx)
    );

    assert!(matches!(result, Err(RagError::Provider(_))));
    let messages = chat.store().messages(&conversation.id).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn test_cancelled_stream_keeps_only_user_message() {
    let generator = ScriptedGenerator::new(ANSWER).with_stream_mode(StreamMode::Endless);
    let (chat, h) = service(generator).await;
    let conversation = chat.store().create("rust ownership").unwrap();

    let (tx, mut rx) = mpsc::channel(64);
    let consumer = async move {
        let first = rx.recv().await;
        drop(rx);
        first
    };
    let (result, first) = tokio::join!(
        chat.ask_streaming(Some(&conversation.id), "rust ownership", tx),
        consumer
    );

    assert!(matches!(first, Some(StreamEvent::Token { .. })));
    assert!(matches!(result, Err(RagError::Cancelled)));
    assert!(h
        .generator
        .stream_dropped
        .load(std::sync::atomic::Ordering::SeqCst));

    let messages = chat.store().messages(&conversation.id).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn test_unknown_conversation_is_rejected() {
    let (chat, h) = service(ScriptedGenerator::new(ANSWER)).await;

    let result = chat.ask(Some("does-not-exist"), "hello").await;

    assert!(matches!(result, Err(RagError::ConversationNotFound { .. })));
    assert_eq!(h.generator.total_calls(), 0);
    assert!(chat.store().list().unwrap().is_empty());
}
