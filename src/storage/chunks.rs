//! Persistence of corpus chunks and their embeddings

use super::Database;
use crate::error::Result;
use crate::index::ChunkFilter;
use crate::types::Chunk;
use rusqlite::params;

/// A chunk together with its stored embedding
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

impl Database {
    /// Insert chunks with their embeddings in one transaction.
    /// Chunks whose `chunk_id` is already stored are replaced.
    pub fn insert_chunks(&self, items: &[(Chunk, Vec<f32>)]) -> Result<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO chunks (chunk_id, doc_id, source_file, page, content, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for (chunk, embedding) in items {
                stmt.execute(params![
                    chunk.metadata.chunk_id,
                    chunk.metadata.doc_id,
                    chunk.metadata.source_file,
                    chunk.metadata.page,
                    chunk.content,
                    encode_embedding(embedding),
                ])?;
            }
        }

        tx.commit()?;
        Ok(items.len())
    }

    /// All stored chunks in insertion order
    pub fn load_chunks(&self) -> Result<Vec<StoredChunk>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT chunk_id, doc_id, source_file, page, content, embedding
             FROM chunks ORDER BY seq",
        )?;

        let rows = stmt.query_map([], |row| {
            let chunk_id: String = row.get(0)?;
            let doc_id: String = row.get(1)?;
            let source_file: String = row.get(2)?;
            let page: Option<u32> = row.get(3)?;
            let content: String = row.get(4)?;
            let embedding: Vec<u8> = row.get(5)?;

            Ok(StoredChunk {
                chunk: Chunk::new(content, source_file, page, doc_id, chunk_id),
                embedding: decode_embedding(&embedding),
            })
        })?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Delete chunks matching the filter
    pub fn delete_chunks(&self, filter: &ChunkFilter) -> Result<usize> {
        let conn = self.get_conn()?;
        let removed = match filter {
            ChunkFilter::DocId(doc_id) => {
                conn.execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc_id])?
            }
            ChunkFilter::SourceFile(source) => {
                conn.execute("DELETE FROM chunks WHERE source_file = ?1", params![source])?
            }
        };
        Ok(removed)
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_load_delete() {
        let db = Database::in_memory().unwrap();

        let items = vec![
            (Chunk::new("alpha", "a.pdf", Some(1), "doc-a", "a1"), vec![1.0, 0.0]),
            (Chunk::new("beta", "b.pdf", None, "doc-b", "b1"), vec![0.0, 1.0]),
            (Chunk::new("gamma", "a.pdf", Some(2), "doc-a", "a2"), vec![0.5, 0.5]),
        ];
        assert_eq!(db.insert_chunks(&items).unwrap(), 3);

        let stored = db.load_chunks().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].chunk.content, "alpha");
        assert_eq!(stored[0].chunk.metadata.page, Some(1));
        assert_eq!(stored[2].embedding, vec![0.5, 0.5]);

        let removed = db
            .delete_chunks(&ChunkFilter::DocId("doc-a".to_string()))
            .unwrap();
        assert_eq!(removed, 2);

        let remaining = db.load_chunks().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].chunk.metadata.chunk_id, "b1");
    }
}
