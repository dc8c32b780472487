// Integration tests for the on-disk corpus and conversation storage

mod common;

use common::KeywordEmbedder;
use ragpipe::index::{ChunkFilter, CorpusIndex, HnswParams, HnswVectorStore, VectorIndex};
use ragpipe::ingest::ingest_file;
use ragpipe::storage::{ChatHistoryStore, ConversationStore, Database};
use ragpipe::types::{Chunk, Role, Source};
use std::sync::Arc;
use tempfile::TempDir;

fn open_corpus(dir: &TempDir) -> Arc<CorpusIndex> {
    let db = Arc::new(Database::new(&dir.path().join("ragpipe.db")).unwrap());
    let store = HnswVectorStore::new(db, Arc::new(KeywordEmbedder::new()), HnswParams::default());
    Arc::new(CorpusIndex::new(Arc::new(store)))
}

#[tokio::test]
async fn test_corpus_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let corpus = open_corpus(&dir);
        let added = corpus
            .add_documents(vec![
                Chunk::new("rust traits and generics", "rust.md", Some(1), "rust", "r1"),
                Chunk::new("python generators", "python.md", None, "python", "p1"),
            ])
            .await
            .unwrap();
        assert_eq!(added, 2);
    }

    let corpus = open_corpus(&dir);
    let all = corpus.get_all_chunks().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].metadata.chunk_id, "r1");
    assert_eq!(all[0].metadata.page, Some(1));

    let hits = corpus.similarity_search_with_score("rust", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0.metadata.chunk_id, "r1");
}

#[tokio::test]
async fn test_delete_by_filter_refreshes_both_indices() {
    let dir = TempDir::new().unwrap();
    let corpus = open_corpus(&dir);
    corpus
        .add_documents(vec![
            Chunk::new("rust ownership", "rust.md", None, "rust", "r1"),
            Chunk::new("rust lifetimes", "rust.md", None, "rust", "r2"),
            Chunk::new("music scales", "music.md", None, "music", "m1"),
        ])
        .await
        .unwrap();

    // Build the lexical snapshot so deletion has something to invalidate
    let lexical = corpus.lexical().await.unwrap().unwrap();
    assert_eq!(lexical.search_chunks("rust", 10).unwrap().len(), 2);

    let removed = corpus
        .delete_by_filter(&ChunkFilter::SourceFile("rust.md".to_string()))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert!(!corpus.has_lexical_snapshot().await);

    let hits = corpus.similarity_search_with_score("rust", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0.metadata.chunk_id, "m1");

    let lexical = corpus.lexical().await.unwrap().unwrap();
    assert!(lexical.search_chunks("rust", 10).unwrap().is_empty());

    let removed = corpus
        .vector()
        .delete_by_filter(&ChunkFilter::DocId("missing".to_string()))
        .await
        .unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn test_ingest_jsonl_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corpus.jsonl");
    std::fs::write(
        &path,
        concat!(
            "{\"content\": \"Rust ownership rules\", \"source_file\": \"rust.pdf\", \"page\": 3}\n",
            "{\"content\": \"Rust borrowing\", \"source_file\": \"rust.pdf\", \"page\": 4}\n",
            "\n",
            "{\"content\": \"   \", \"source_file\": \"blank.md\"}\n",
            "{\"content\": \"Tokio runtime\", \"source_file\": \"tokio.md\", \"doc_id\": \"tokio\"}\n",
        ),
    )
    .unwrap();

    let corpus = open_corpus(&dir);
    let report = ingest_file(&corpus, &path).await.unwrap();

    assert_eq!(report.chunks, 3);
    assert_eq!(report.documents, 2);
    assert_eq!(report.skipped_blank, 1);

    let all = corpus.get_all_chunks().await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].metadata.doc_id, all[1].metadata.doc_id);
    assert_eq!(all[2].metadata.doc_id, "tokio");

    let removed = corpus
        .delete_by_filter(&ChunkFilter::DocId(all[0].metadata.doc_id.clone()))
        .await
        .unwrap();
    assert_eq!(removed, 2);
}

#[tokio::test]
async fn test_ingest_rejects_malformed_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.jsonl");
    std::fs::write(
        &path,
        "{\"content\": \"ok\", \"source_file\": \"a.md\"}\n{\"content\": 42}\n",
    )
    .unwrap();

    let corpus = open_corpus(&dir);
    let err = ingest_file(&corpus, &path).await.unwrap_err();

    assert!(err.to_string().contains("line 2"));
    assert!(corpus.get_all_chunks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_conversation_history_window_on_disk() {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(Database::new(&dir.path().join("ragpipe.db")).unwrap());
    let store = ConversationStore::new(db);

    let conversation = store.create("first question").unwrap();
    let no_sources: Vec<Source> = Vec::new();
    for i in 0..3 {
        store
            .append_message(&conversation.id, Role::User, &format!("question {}", i), None)
            .unwrap();
        store
            .append_message(&conversation.id, Role::Assistant, &format!("answer {}", i), Some(no_sources.as_slice()))
            .unwrap();
    }

    let turns = store.last_n_turns(&conversation.id, 3).await.unwrap();
    let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents, vec!["answer 1", "question 2", "answer 2"]);
    assert_eq!(turns[0].role, Role::Assistant);

    assert!(store.last_n_turns(&conversation.id, 0).await.unwrap().is_empty());
    assert_eq!(store.messages(&conversation.id).unwrap().len(), 6);
}
