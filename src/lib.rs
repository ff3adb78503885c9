// ChemEquip - chemical equipment dataset ingestion and statistics service

pub mod analysis;
pub mod config;
pub mod db;
pub mod ingest;
pub mod middleware;
pub mod models;
pub mod parser;
pub mod routes;
pub mod seed;
pub mod storage;
pub mod types;

use std::sync::Arc;

use tracing::info;

// Re-exports for convenience
pub use config::Config;
pub use ingest::Ingestor;
pub use models::AppState;

use db::{DatasetStore, MemoryStore, PgStore};
use storage::FsBlobStore;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}

/// Wire the store, blob storage and ingestor described by `config`.
///
/// Uses PostgreSQL (running pending migrations) when a database URL is
/// configured and the in-memory store otherwise.
pub async fn build_state(config: Config) -> anyhow::Result<AppState> {
    let store: Arc<dyn DatasetStore> = match config.database.url.as_deref() {
        Some(url) => {
            let pool = db::create_pool(&config.database, url).await?;
            info!("Running database migrations...");
            db::run_migrations(&pool).await?;
            info!("Database migrations completed");
            Arc::new(PgStore::new(pool))
        }
        None => {
            info!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    tokio::fs::create_dir_all(&config.storage.media_root).await?;
    let blobs = Arc::new(FsBlobStore::new(config.storage.media_root.clone()));

    let ingestor = Arc::new(Ingestor::new(
        store.clone(),
        blobs,
        config.ingest.max_datasets_per_user,
    ));

    Ok(AppState {
        store,
        ingestor,
        config,
    })
}
