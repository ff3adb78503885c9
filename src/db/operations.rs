use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{DatasetStore, NewDataset, UnitOfWork};
use crate::analysis::Statistics;
use crate::models::{Dataset, Equipment, EquipmentRow, User};

const DATASET_COLUMNS: &str =
    "id, user_id, filename, uploaded_at, file_key, summary_stats, equipment_count";

const EQUIPMENT_COLUMNS: &str =
    "id, dataset_id, name, equipment_type, flowrate, pressure, temperature, created_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatasetStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn get_or_create_user(&self, username: &str, email: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
            RETURNING id, username, email, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_dataset(&self, user_id: Uuid, dataset_id: Uuid) -> Result<Option<Dataset>> {
        let dataset = sqlx::query_as::<_, Dataset>(&format!(
            "SELECT {DATASET_COLUMNS} FROM datasets WHERE id = $1 AND user_id = $2"
        ))
        .bind(dataset_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(dataset)
    }

    async fn find_dataset_by_filename(&self, user_id: Uuid, filename: &str) -> Result<Option<Dataset>> {
        let dataset = sqlx::query_as::<_, Dataset>(&format!(
            r#"
            SELECT {DATASET_COLUMNS} FROM datasets
            WHERE user_id = $1 AND filename = $2
            ORDER BY uploaded_at DESC, seq DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;

        Ok(dataset)
    }

    async fn list_datasets(&self, user_id: Uuid) -> Result<Vec<Dataset>> {
        let datasets = sqlx::query_as::<_, Dataset>(&format!(
            r#"
            SELECT {DATASET_COLUMNS} FROM datasets
            WHERE user_id = $1
            ORDER BY uploaded_at DESC, seq DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(datasets)
    }

    async fn list_equipment(&self, dataset_id: Uuid) -> Result<Vec<Equipment>> {
        let equipment = sqlx::query_as::<_, Equipment>(&format!(
            "SELECT {EQUIPMENT_COLUMNS} FROM equipment WHERE dataset_id = $1 ORDER BY name, seq"
        ))
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(equipment)
    }

    async fn list_user_equipment(&self, user_id: Uuid) -> Result<Vec<Equipment>> {
        let equipment = sqlx::query_as::<_, Equipment>(
            r#"
            SELECT e.id, e.dataset_id, e.name, e.equipment_type,
                   e.flowrate, e.pressure, e.temperature, e.created_at
            FROM equipment e
            JOIN datasets d ON d.id = e.dataset_id
            WHERE d.user_id = $1
            ORDER BY e.name, e.seq
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(equipment)
    }

    async fn delete_dataset(&self, dataset_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM datasets WHERE id = $1")
            .bind(dataset_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<()> {
        super::health_check(&self.pool).await.map(|_| ())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// Wraps a live transaction; sqlx rolls it back if dropped uncommitted.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_dataset(&mut self, dataset: &NewDataset) -> Result<Dataset> {
        let row = sqlx::query_as::<_, Dataset>(&format!(
            r#"
            INSERT INTO datasets (id, user_id, filename, uploaded_at, file_key, summary_stats, equipment_count)
            VALUES ($1, $2, $3, $4, $5, '{{}}'::jsonb, 0)
            RETURNING {DATASET_COLUMNS}
            "#
        ))
        .bind(dataset.id)
        .bind(dataset.user_id)
        .bind(&dataset.filename)
        .bind(dataset.uploaded_at)
        .bind(&dataset.file_key)
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to insert dataset")?;

        Ok(row)
    }

    async fn delete_equipment(&mut self, dataset_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM equipment WHERE dataset_id = $1")
            .bind(dataset_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_equipment(&mut self, dataset_id: Uuid, rows: &[EquipmentRow]) -> Result<Vec<Equipment>> {
        let sql = format!(
            r#"
            INSERT INTO equipment (id, dataset_id, name, equipment_type, flowrate, pressure, temperature)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {EQUIPMENT_COLUMNS}
            "#
        );

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let equipment = sqlx::query_as::<_, Equipment>(&sql)
                .bind(Uuid::new_v4())
                .bind(dataset_id)
                .bind(&row.name)
                .bind(row.equipment_type.as_str())
                .bind(row.flowrate)
                .bind(row.pressure)
                .bind(row.temperature)
                .fetch_one(&mut *self.tx)
                .await
                .with_context(|| format!("Failed to insert equipment {:?}", row.name))?;
            stored.push(equipment);
        }

        Ok(stored)
    }

    async fn update_summary(&mut self, dataset_id: Uuid, stats: &Statistics, equipment_count: i64) -> Result<Dataset> {
        let dataset = sqlx::query_as::<_, Dataset>(&format!(
            r#"
            UPDATE datasets
            SET summary_stats = $1, equipment_count = $2
            WHERE id = $3
            RETURNING {DATASET_COLUMNS}
            "#
        ))
        .bind(Json(stats))
        .bind(equipment_count)
        .bind(dataset_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        dataset.with_context(|| format!("Dataset {dataset_id} disappeared during ingestion"))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.context("Failed to commit transaction")
    }
}
