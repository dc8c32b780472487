//! Core data model shared by every pipeline stage

use serde::{Deserialize, Serialize};

/// Number of leading characters that identify a chunk for deduplication
pub const DEDUP_KEY_CHARS: usize = 200;

/// Number of characters shown in a source citation preview
pub const SOURCE_PREVIEW_CHARS: usize = 300;

/// Metadata attached to a chunk of the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// File (or URL) the chunk was extracted from
    pub source_file: String,

    /// Page number within the source, when the loader knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Identifier of the ingested document
    pub doc_id: String,

    /// Identifier assigned to the chunk at ingestion
    pub chunk_id: String,

    /// Score written by whichever stage last ranked this chunk.
    /// Per-query scratch space, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

/// A passage of the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Passage text
    pub content: String,

    /// Identifier of the source the chunk belongs to
    pub source_id: String,

    /// Chunk metadata
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Create a new chunk with no score attached
    pub fn new(
        content: impl Into<String>,
        source_file: impl Into<String>,
        page: Option<u32>,
        doc_id: impl Into<String>,
        chunk_id: impl Into<String>,
    ) -> Self {
        let doc_id = doc_id.into();
        Self {
            content: content.into(),
            source_id: doc_id.clone(),
            metadata: ChunkMetadata {
                source_file: source_file.into(),
                page,
                doc_id,
                chunk_id: chunk_id.into(),
                relevance_score: None,
            },
        }
    }

    /// Identity of the chunk for deduplication: its first 200 characters
    pub fn dedup_key(&self) -> &str {
        char_prefix(&self.content, DEDUP_KEY_CHARS)
    }

    /// Return the chunk with `relevance_score` replaced
    pub fn with_score(mut self, score: f32) -> Self {
        self.metadata.relevance_score = Some(score);
        self
    }

    pub fn score(&self) -> f32 {
        self.metadata.relevance_score.unwrap_or(0.0)
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Label used when a turn is rendered into a prompt
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// A single prior message of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Render turns as `User: ...` / `Assistant: ...` lines in chronological order
pub fn format_history(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Citation returned alongside an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub doc_name: String,
    #[serde(default)]
    pub page: Option<u32>,
    pub chunk_preview: String,
    pub relevance_score: f64,
}

impl Source {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            doc_name: chunk.metadata.source_file.clone(),
            page: chunk.metadata.page,
            chunk_preview: char_prefix(&chunk.content, SOURCE_PREVIEW_CHARS).to_string(),
            relevance_score: round4(chunk.score()),
        }
    }
}

fn round4(score: f32) -> f64 {
    (f64::from(score) * 10_000.0).round() / 10_000.0
}

/// Event emitted by a streaming query.
///
/// A run that does not fail emits zero or more `Token` events, exactly one
/// `Sources` and exactly one `Done`, in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Token { content: String },
    Sources { sources: Vec<Source> },
    Done,
}

/// Result of a synchronous query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
}
