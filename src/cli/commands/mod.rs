pub mod query;
pub mod serve;
pub mod token;

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{DatabaseManager, DocumentStore, MemoryDocumentStore, PgDocumentStore};

/// Where documents come from.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, help = "Use an in-memory store instead of Postgres")]
    pub memory: bool,

    #[arg(long, help = "JSON array of documents to load into the in-memory store")]
    pub seed: Option<PathBuf>,
}

pub async fn open_store(args: &StoreArgs, config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if args.memory || args.seed.is_some() {
        let store = MemoryDocumentStore::new();
        if let Some(path) = &args.seed {
            store
                .load_json(path)
                .await
                .with_context(|| format!("failed to seed from {}", path.display()))?;
        }
        return Ok(Arc::new(store));
    }

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to Postgres (use --memory to run without a database)")?;
    let store = PgDocumentStore::new(pool, config.database.clone());
    store.ensure_schema().await?;
    Ok(Arc::new(store))
}
