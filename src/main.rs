use ragpipe::app::{App, Corpus};
use ragpipe::cli::{Cli, Commands, ConfigAction};
use ragpipe::config::Config;
use ragpipe::error::{RagError, Result};
use ragpipe::index::ChunkFilter;
use ragpipe::storage::{ConversationStore, Database};
use ragpipe::types::{Source, StreamEvent};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Ask {
            question,
            conversation,
            stream,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ask(config, &question, conversation.as_deref(), stream, json).await?;
        }
        Commands::Ingest { file } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ingest(&config, &file).await?;
        }
        Commands::Delete {
            doc_id,
            source_file,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_delete(&config, doc_id, source_file).await?;
        }
        Commands::History { conversation, json } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_history(&config, conversation.as_deref(), json)?;
        }
        Commands::Status => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_status(&config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "ragpipe=debug" } else { "ragpipe=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_ask(
    config: Config,
    question: &str,
    conversation: Option<&str>,
    stream: bool,
    json: bool,
) -> Result<()> {
    let app = App::bootstrap(config)?;

    if !stream {
        let reply = app.chat.ask(conversation, question).await?;
        if json {
            println!("{}", to_json(&reply)?);
        } else {
            println!("{}", reply.answer);
            print_sources(&reply.sources);
            println!("\nConversation: {}", reply.conversation_id);
        }
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel(64);
    let consumer = async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = rx.recv().await {
            if json {
                println!("{}", to_json(&event)?);
                continue;
            }
            match event {
                StreamEvent::Token { content } => {
                    print!("{}", content);
                    stdout.flush().ok();
                }
                StreamEvent::Sources { sources } => {
                    println!();
                    print_sources(&sources);
                }
                StreamEvent::Done => {}
            }
        }
        Ok::<_, RagError>(())
    };

    let (reply, printed) = tokio::join!(app.chat.ask_streaming(conversation, question, tx), consumer);
    printed?;
    let reply = reply?;

    if !json {
        println!("\nConversation: {}", reply.conversation_id);
    }
    Ok(())
}

async fn cmd_ingest(config: &Config, file: &Path) -> Result<()> {
    let corpus = Corpus::open(config)?;
    let report = ragpipe::ingest::ingest_file(&corpus.index, file).await?;

    println!(
        "✓ Ingested {} chunks from {} documents",
        report.chunks, report.documents
    );
    if report.skipped_blank > 0 {
        println!("  Skipped {} blank records", report.skipped_blank);
    }
    Ok(())
}

async fn cmd_delete(
    config: &Config,
    doc_id: Option<String>,
    source_file: Option<String>,
) -> Result<()> {
    let filter = match (doc_id, source_file) {
        (Some(id), _) => ChunkFilter::DocId(id),
        (None, Some(file)) => ChunkFilter::SourceFile(file),
        (None, None) => {
            return Err(RagError::Config(
                "Either --doc-id or --source-file is required".to_string(),
            ))
        }
    };

    let corpus = Corpus::open(config)?;
    let removed = corpus.index.delete_by_filter(&filter).await?;
    println!("✓ Removed {} chunks", removed);
    Ok(())
}

fn cmd_history(config: &Config, conversation: Option<&str>, json: bool) -> Result<()> {
    let db = Arc::new(Database::new(&config.storage.database_path())?);
    let store = ConversationStore::new(db);

    match conversation {
        None => {
            let conversations = store.list()?;
            if json {
                println!("{}", to_json(&conversations)?);
                return Ok(());
            }
            if conversations.is_empty() {
                println!("No conversations yet");
            }
            for c in conversations {
                println!("{}  {}  {}", c.id, c.updated_at, c.title);
            }
        }
        Some(id) => {
            if store.get(id)?.is_none() {
                return Err(RagError::ConversationNotFound { id: id.to_string() });
            }
            let messages = store.messages(id)?;
            if json {
                println!("{}", to_json(&messages)?);
                return Ok(());
            }
            for message in messages {
                println!("[{}] {}", message.role.label(), message.content);
                if let Some(sources) = &message.sources {
                    print_sources(sources);
                }
                println!();
            }
        }
    }

    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    let db = Database::new(&config.storage.database_path())?;
    let stats = db.stats()?;

    println!("ragpipe Status");
    println!("==============");
    println!("\nDatabase: {}", config.storage.database_path().display());
    println!("Documents: {}", stats.document_count);
    println!("Chunks: {}", stats.chunk_count);
    println!("Conversations: {}", stats.conversation_count);
    println!("Messages: {}", stats.message_count);
    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let content = toml::to_string_pretty(&config)?;
            println!("{}", content);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
        ConfigAction::Path => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'ragpipe config init' to create one."
        );
        return Config::load_defaults(profile.as_deref());
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn print_sources(sources: &[Source]) {
    if sources.is_empty() {
        return;
    }
    println!("\nSources:");
    for (i, source) in sources.iter().enumerate() {
        match source.page {
            Some(page) => println!(
                "  [{}] {} (page {}, score {:.4})",
                i + 1,
                source.doc_name,
                page,
                source.relevance_score
            ),
            None => println!(
                "  [{}] {} (score {:.4})",
                i + 1,
                source.doc_name,
                source.relevance_score
            ),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| RagError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}
