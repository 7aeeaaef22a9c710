//! dashsync-inspect
//!
//! Looks inside the local database: lists queued actions, drops one that
//! will never succeed, and lists or clears cache entries.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dashsync::cache::ExpiringCache;
use dashsync::offline::PendingActionQueue;
use dashsync::shared::telemetry::init_tracing;
use dashsync::shared::PipelineConfig;
use dashsync::storage::{KeyValueStore, SqliteStore};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "dashsync-inspect", version, about = "Inspect the local sync database")]
struct Cli {
    /// Database file (defaults to DASHSYNC_DB_PATH or the platform data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the pending action queue as JSON
    Pending,
    /// Remove one queued action
    DropAction {
        /// Id of the action to remove
        id: Uuid,
    },
    /// List durable cache keys
    CacheKeys,
    /// Remove every cache entry
    ClearCache,
}

#[tokio::main]
async fn main() {
    init_tracing("warn");

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    let sqlite = SqliteStore::open(&config.database_path).await?;
    let store: Arc<dyn KeyValueStore> = Arc::new(sqlite.clone());

    let outcome = match cli.command {
        Commands::Pending => print_pending(store, &config).await,
        Commands::DropAction { id } => drop_action(store, &config, id).await,
        Commands::CacheKeys => print_cache_keys(store, &config).await,
        Commands::ClearCache => {
            let cache: ExpiringCache<serde_json::Value> =
                ExpiringCache::from_config(store, &config);
            match cache.try_clear().await {
                Ok(removed) => {
                    println!("Removed {removed} cache entries");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
    };

    sqlite.close().await;
    outcome
}

async fn print_pending(
    store: Arc<dyn KeyValueStore>,
    config: &PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let queue = PendingActionQueue::load(store, config.queue_key.as_str()).await?;
    let actions = queue.list().await;
    println!("{}", serde_json::to_string_pretty(&actions)?);
    Ok(())
}

async fn drop_action(
    store: Arc<dyn KeyValueStore>,
    config: &PipelineConfig,
    id: Uuid,
) -> Result<(), Box<dyn std::error::Error>> {
    let queue = PendingActionQueue::load(store, config.queue_key.as_str()).await?;
    if !queue.contains(&id).await {
        return Err(format!("no queued action with id {id}").into());
    }
    queue.remove(&id).await?;
    println!("Dropped {id}");
    Ok(())
}

async fn print_cache_keys(
    store: Arc<dyn KeyValueStore>,
    config: &PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let keys = store.list_keys().await?;
    for key in keys {
        if let Some(name) = key.strip_prefix(&config.cache_prefix) {
            println!("{name}");
        }
    }
    Ok(())
}
