use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::analysis::Statistics;
use crate::config::DatabaseConfig;
use crate::models::{Dataset, Equipment, EquipmentRow, User};

pub mod memory;
pub mod operations;
pub mod pool;

pub use memory::MemoryStore;
pub use operations::PgStore;
pub use pool::*;

pub async fn create_pool(config: &DatabaseConfig, url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect(url)
        .await?;

    // Test connection
    health_check(&pool).await?;

    Ok(pool)
}

/// Fields of a dataset row that exist before any ingestion has run.
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub file_key: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Persistence for users, datasets and their equipment.
///
/// Reads go straight to the store; every write that touches a dataset's
/// equipment or statistics goes through a [`UnitOfWork`].
#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    async fn get_or_create_user(&self, username: &str, email: &str) -> Result<User>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Dataset by id, only if owned by `user_id`.
    async fn get_dataset(&self, user_id: Uuid, dataset_id: Uuid) -> Result<Option<Dataset>>;

    async fn find_dataset_by_filename(&self, user_id: Uuid, filename: &str) -> Result<Option<Dataset>>;

    /// All datasets of a user, newest first.
    async fn list_datasets(&self, user_id: Uuid) -> Result<Vec<Dataset>>;

    /// Equipment of one dataset, sorted by name.
    async fn list_equipment(&self, dataset_id: Uuid) -> Result<Vec<Equipment>>;

    /// Equipment across all datasets of a user, sorted by name.
    async fn list_user_equipment(&self, user_id: Uuid) -> Result<Vec<Equipment>>;

    /// Delete a dataset and, by cascade, its equipment. Returns whether a row existed.
    async fn delete_dataset(&self, dataset_id: Uuid) -> Result<bool>;

    async fn ping(&self) -> Result<()>;

    fn backend(&self) -> &'static str;
}

/// A scoped transaction. Dropping it without `commit` discards every change.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn insert_dataset(&mut self, dataset: &NewDataset) -> Result<Dataset>;

    async fn delete_equipment(&mut self, dataset_id: Uuid) -> Result<u64>;

    /// Insert rows in the given order and return the stored records.
    async fn insert_equipment(&mut self, dataset_id: Uuid, rows: &[EquipmentRow]) -> Result<Vec<Equipment>>;

    async fn update_summary(&mut self, dataset_id: Uuid, stats: &Statistics, equipment_count: i64) -> Result<Dataset>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
