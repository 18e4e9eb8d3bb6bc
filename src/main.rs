use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

use engram::config::EngramConfig;
use engram::memory::manager::{MemoryManager, MirrorStatus};
use engram::memory::types::{MemoryType, NewMemory, SearchOptions};
use engram::vector::backend::SqliteBackend;
use engram::vector::VectorStore;
use engram::{db, embedding};

#[derive(Parser)]
#[command(name = "engram", version, about = "Semantic memory index with graceful degradation")]
struct Cli {
    /// Owner whose memories are operated on
    #[arg(long, global = true, default_value = "")]
    owner: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a new memory
    Add {
        /// The memory content (the unit that gets embedded)
        content: String,
        #[arg(long, default_value = "")]
        title: String,
        /// Repeatable tag
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Memory type: episodic, semantic, procedural, declarative,
        /// implicit, associative, generic
        #[arg(long, default_value = "generic")]
        r#type: String,
    },
    /// Search memories by similarity
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        r#type: Option<String>,
    },
    /// List all memories for the owner, newest first
    List,
    /// Show aggregate statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngramConfig::load()?;

    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let manager = setup(&config)?;

    match cli.command {
        Command::Add {
            content,
            title,
            tags,
            r#type,
        } => {
            let memory_type: MemoryType = r#type.parse().map_err(anyhow::Error::msg)?;
            let outcome = manager
                .add_memory(
                    &cli.owner,
                    NewMemory {
                        title,
                        content,
                        tags,
                        memory_type,
                        ..Default::default()
                    },
                )
                .await?;
            println!("stored {} [{}]", outcome.record.id, outcome.record.memory_type);
            match outcome.mirror {
                MirrorStatus::Mirrored => {}
                MirrorStatus::NoEmbedding => {
                    println!("note: no embedding available, findable by substring search only");
                }
                MirrorStatus::CapacityExceeded => {
                    println!("note: local fallback index is full, record not mirrored");
                }
                MirrorStatus::Failed => {
                    println!("note: local fallback mirror failed, see logs");
                }
            }
        }
        Command::Search {
            query,
            limit,
            threshold,
            r#type,
        } => {
            let memory_type = r#type
                .map(|t| t.parse::<MemoryType>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            let results = manager
                .search_memories(
                    &cli.owner,
                    &query,
                    SearchOptions {
                        threshold,
                        limit,
                        memory_type,
                    },
                )
                .await?;

            if results.is_empty() {
                println!("No results found.");
                return Ok(());
            }
            for (i, result) in results.iter().enumerate() {
                println!(
                    "  {}. {} (similarity: {:.4})",
                    i + 1,
                    result.id,
                    result.similarity,
                );
                println!("     {}", result.content);
                println!();
            }
        }
        Command::List => {
            let records = manager.list_memories(&cli.owner)?;
            if records.is_empty() {
                println!("No memories stored.");
                return Ok(());
            }
            for record in records {
                let embedded = if record.has_embedding { "" } else { " (no embedding)" };
                println!("  {} [{}]{} {}", record.id, record.memory_type, embedded, record.created_at);
                let title = if record.title.is_empty() { &record.content } else { &record.title };
                println!("     {title}");
            }
        }
        Command::Stats => {
            let stats = manager.get_stats(&cli.owner)?;
            println!("total: {}", stats.total);
            println!("recently added (24h): {}", stats.recently_added);
            let mut types: Vec<_> = stats.by_type.iter().filter(|(_, v)| **v > 0).collect();
            types.sort();
            for (t, count) in types {
                println!("  {t}: {count}");
            }
            let mut tags: Vec<_> = stats.by_tag.iter().collect();
            tags.sort();
            for (tag, count) in tags {
                println!("  #{tag}: {count}");
            }
        }
    }

    Ok(())
}

/// Wire the shared components: database, embedding generator, backend,
/// coordinator (with the required index rebuild), manager.
fn setup(config: &EngramConfig) -> Result<MemoryManager> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    let db = Arc::new(Mutex::new(conn));

    let embedder = embedding::create_generator(&config.embedding)?;
    let backend = Arc::new(SqliteBackend::new(
        db.clone(),
        config.retrieval.candidate_multiplier,
    ));
    let vectors = Arc::new(VectorStore::new(embedder, backend, config.index.capacity));
    vectors.rebuild_local_index()?;

    Ok(MemoryManager::new(db, vectors, &config.retrieval))
}
