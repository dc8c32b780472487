//! Retrieval strategy selection

use crate::config::RetrievalConfig;
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the first-stage candidates are retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Paraphrase the question and union hybrid results of every probe
    MultiQuery,
    /// Embed a hypothetical answer and search the vector index with it
    Hyde,
    /// Lexical + vector fusion
    Hybrid,
    /// Vector similarity only
    PlainVector,
}

impl RetrievalStrategy {
    /// Resolve the strategy for a configuration.
    ///
    /// An explicit `strategy` wins; otherwise the flags are checked in priority
    /// order multi-query > HyDE > hybrid > plain vector.
    pub fn resolve(config: &RetrievalConfig) -> Result<Self> {
        if let Some(name) = &config.strategy {
            return Self::parse(name);
        }

        Ok(if config.use_multi_query {
            Self::MultiQuery
        } else if config.use_hyde {
            Self::Hyde
        } else if config.use_hybrid_search {
            Self::Hybrid
        } else {
            Self::PlainVector
        })
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "multi_query" => Ok(Self::MultiQuery),
            "hyde" => Ok(Self::Hyde),
            "hybrid" => Ok(Self::Hybrid),
            "vector" => Ok(Self::PlainVector),
            other => Err(RagError::Config(format!(
                "Unknown retrieval strategy '{}' (expected multi_query, hyde, hybrid or vector)",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultiQuery => "multi_query",
            Self::Hyde => "hyde",
            Self::Hybrid => "hybrid",
            Self::PlainVector => "vector",
        }
    }
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
