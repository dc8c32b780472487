//! ragpipe - Retrieval-Augmented Question Answering
//!
//! Answers natural-language questions from an indexed corpus: condenses
//! follow-ups against the conversation, retrieves with hybrid search or query
//! expansion, reranks with a cross-encoder, and synthesizes a cited answer that
//! can be streamed token by token.

pub mod app;
pub mod chat;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod ingest;
pub mod prompts;
pub mod providers;
pub mod retrieval;
pub mod storage;
pub mod synthesis;
pub mod types;

pub use error::{RagError, Result};
