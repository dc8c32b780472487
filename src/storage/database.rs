//! SQLite connection pool and schema migrations for the corpus and conversation log
//!
//! Provides structured storage for corpus chunks, conversations and messages

use crate::error::{RagError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled SQLite handle shared by the corpus and conversation stores
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database connection
    pub fn new(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RagError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(16)
            .build(manager)
            .map_err(|e| RagError::Config(format!("Failed to create connection pool: {}", e)))?;

        {
            let conn = pool
                .get()
                .map_err(|e| RagError::Config(format!("Failed to get connection: {}", e)))?;

            // WAL with a busy timeout; foreign keys cascade message deletes
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        Self::from_pool(pool)
    }

    /// Private in-memory database, for tests and throwaway sessions
    pub fn in_memory() -> Result<Self> {
        // Every in-memory connection is its own database, so the pool holds one
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| RagError::Config(format!("Failed to create connection pool: {}", e)))?;

        Self::from_pool(pool)
    }

    fn from_pool(pool: DbPool) -> Result<Self> {
        let db = Self { pool };
        db.migrate()?;
        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| RagError::Config(format!("Failed to get connection: {}", e)))
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Row counts for the status command
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let chunk_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;

        let document_count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT doc_id) FROM chunks",
            [],
            |row| row.get(0),
        )?;

        let conversation_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;

        let message_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;

        Ok(DbStats {
            chunk_count: chunk_count as usize,
            document_count: document_count as usize,
            conversation_count: conversation_count as usize,
            message_count: message_count as usize,
        })
    }
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub chunk_count: usize,
    pub document_count: usize,
    pub conversation_count: usize,
    pub message_count: usize,
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Corpus chunks with their embeddings (little-endian f32)
    CREATE TABLE chunks (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        chunk_id TEXT NOT NULL UNIQUE,
        doc_id TEXT NOT NULL,
        source_file TEXT NOT NULL,
        page INTEGER,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL
    );

    CREATE INDEX idx_chunks_doc ON chunks(doc_id);
    CREATE INDEX idx_chunks_source ON chunks(source_file);

    -- Conversations
    CREATE TABLE conversations (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    -- Messages (sources stored as JSON)
    CREATE TABLE messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        conversation_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        sources TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_messages_conversation ON messages(conversation_id);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_database_creation() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&temp.path().join("nested").join("db.sqlite")).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.chunk_count, 0);
        assert_eq!(stats.conversation_count, 0);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("db.sqlite");

        {
            Database::new(&path).unwrap();
        }
        let db = Database::new(&path).unwrap();

        let conn = db.get_conn().unwrap();
        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_in_memory() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.stats().unwrap().message_count, 0);
    }
}
