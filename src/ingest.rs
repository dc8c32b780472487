//! Ingestion of pre-chunked JSONL files
//!
//! One JSON object per line:
//! `{"content": "...", "source_file": "guide.pdf", "page": 3, "doc_id": "..."}`.
//! `page` and `doc_id` are optional; records of the same `source_file` without
//! a `doc_id` share one generated id.

use crate::error::{RagError, Result};
use crate::index::CorpusIndex;
use crate::types::Chunk;
use ahash::AHashMap;
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRecord {
    pub content: String,
    pub source_file: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub doc_id: Option<String>,
}

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks: usize,
    pub documents: usize,
    pub skipped_blank: usize,
}

/// Parse JSONL text into chunks, skipping blank lines and blank contents
pub fn parse_jsonl(text: &str) -> Result<(Vec<Chunk>, IngestReport)> {
    let mut doc_ids: AHashMap<String, String> = AHashMap::new();
    let mut chunks = Vec::new();
    let mut report = IngestReport::default();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: IngestRecord = serde_json::from_str(line).map_err(|e| RagError::Json {
            source: e,
            context: format!("Invalid record on line {}", line_no + 1),
        })?;

        if record.content.trim().is_empty() {
            report.skipped_blank += 1;
            continue;
        }

        let doc_id = match record.doc_id {
            Some(id) => id,
            None => doc_ids
                .entry(record.source_file.clone())
                .or_insert_with(|| Uuid::new_v4().to_string())
                .clone(),
        };

        chunks.push(Chunk::new(
            record.content,
            record.source_file,
            record.page,
            doc_id,
            Uuid::new_v4().to_string(),
        ));
    }

    let mut documents: Vec<&str> = chunks.iter().map(|c| c.metadata.doc_id.as_str()).collect();
    documents.sort_unstable();
    documents.dedup();

    report.chunks = chunks.len();
    report.documents = documents.len();
    Ok((chunks, report))
}

/// Read a JSONL file and add its chunks to the corpus
pub async fn ingest_file(corpus: &CorpusIndex, path: &Path) -> Result<IngestReport> {
    let text = std::fs::read_to_string(path).map_err(|e| RagError::Io {
        source: e,
        context: format!("Failed to read {:?}", path),
    })?;

    let (chunks, report) = parse_jsonl(&text)?;
    if chunks.is_empty() {
        info!("Nothing to ingest from {:?}", path);
        return Ok(report);
    }

    corpus.add_documents(chunks).await?;
    info!(
        "Ingested {} chunks from {} documents ({:?})",
        report.chunks, report.documents, path
    );
    Ok(report)
}
