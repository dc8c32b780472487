/// Tantivy keyword index for BM25 term-overlap ranking over a corpus snapshot
use crate::types::Chunk;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, ReloadPolicy};

use super::IndexError;

/// Search result pointing back into the snapshot the index was built from
#[derive(Debug, Clone)]
pub struct KeywordSearchResult {
    /// Position of the chunk in the snapshot
    pub position: usize,
    /// BM25 relevance score
    pub score: f32,
}

/// In-memory keyword index
///
/// Built once from a full corpus snapshot and never mutated; a changed corpus
/// gets a fresh index.
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    text_field: Field,
    position_field: Field,
    chunks: Vec<Chunk>,
}

impl KeywordIndex {
    /// Build an index over `chunks`
    pub fn build(chunks: Vec<Chunk>) -> Result<Self, IndexError> {
        let mut schema_builder = Schema::builder();
        let position_field = schema_builder.add_u64_field("position", STORED);
        let text_field = schema_builder.add_text_field("text", TEXT);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);

        let mut writer = index
            .writer_with_num_threads(1, 15_000_000)
            .map_err(|e| IndexError::InitializationError(e.to_string()))?;

        for (position, chunk) in chunks.iter().enumerate() {
            writer
                .add_document(doc!(
                    position_field => position as u64,
                    text_field => chunk.content.as_str(),
                ))
                .map_err(|e| IndexError::InsertError(e.to_string()))?;
        }

        writer
            .commit()
            .map_err(|e| IndexError::InsertError(e.to_string()))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| IndexError::InitializationError(e.to_string()))?;

        Ok(Self {
            index,
            reader,
            text_field,
            position_field,
            chunks,
        })
    }

    /// Rank the snapshot against `query`, best first.
    ///
    /// Query syntax errors are tolerated: free text is parsed leniently so
    /// punctuation in a question never fails the search.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<KeywordSearchResult>, IndexError> {
        if limit == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let (query, _errors) = query_parser.parse_query_lenient(query);

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| IndexError::SearchError(e.to_string()))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| IndexError::SearchError(e.to_string()))?;

            let position = retrieved
                .get_first(self.position_field)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    IndexError::SearchError("Missing or invalid position field".to_string())
                })?;

            results.push(KeywordSearchResult {
                position: position as usize,
                score,
            });
        }

        Ok(results)
    }

    /// Rank and resolve results to the chunks they point at
    pub fn search_chunks(&self, query: &str, limit: usize) -> Result<Vec<(Chunk, f32)>, IndexError> {
        Ok(self
            .search(query, limit)?
            .into_iter()
            .filter_map(|r| self.chunks.get(r.position).map(|c| (c.clone(), r.score)))
            .collect())
    }

    /// Get the number of documents in the index
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
