//! CLI command definitions and parsing
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ragpipe",
    version,
    author = "neur0map",
    about = "Retrieval-augmented question answering over your documents",
    long_about = "ragpipe answers questions from an indexed corpus: it condenses follow-ups against the \
                  conversation, retrieves with hybrid search or query expansion, reranks with a \
                  cross-encoder and streams a cited answer."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/ragpipe/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile to apply on top of the config file
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question against the indexed corpus
    Ask {
        /// Question to ask
        question: String,

        /// Continue an existing conversation
        #[arg(long, value_name = "ID")]
        conversation: Option<String>,

        /// Print the answer as it is generated
        #[arg(short, long)]
        stream: bool,

        /// Emit JSON (one event per line when streaming)
        #[arg(long)]
        json: bool,
    },

    /// Ingest pre-chunked documents from a JSONL file
    Ingest {
        /// JSONL file with one {content, source_file, page?, doc_id?} record per line
        file: PathBuf,
    },

    /// Delete documents from the corpus
    #[command(group(ArgGroup::new("target").required(true).args(["doc_id", "source_file"])))]
    Delete {
        /// Delete every chunk of this document
        #[arg(long)]
        doc_id: Option<String>,

        /// Delete every chunk extracted from this file
        #[arg(long)]
        source_file: Option<String>,
    },

    /// List conversations, or show the messages of one
    History {
        /// Conversation ID
        conversation: Option<String>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show corpus and conversation counts
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Config file to validate
        file: Option<PathBuf>,
    },

    /// Print the configuration file path
    Path,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
