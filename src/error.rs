use crate::index::IndexError;
use crate::providers::ProviderError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ragpipe
#[derive(Error, Debug)]
pub enum RagError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Generation, embedding or scoring backend failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Vector or lexical index failed
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Conversation not found
    #[error("Conversation not found: {id}")]
    ConversationNotFound { id: String },

    /// The consumer of a streaming answer went away before `Done`
    #[error("Stream cancelled: consumer disconnected")]
    Cancelled,

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for ragpipe operations
pub type Result<T> = std::result::Result<T, RagError>;
