//! Ingestion coordinator.
//!
//! Every write to a dataset's equipment goes through here: parse the table,
//! then replace the equipment, recompute the snapshot and store both inside
//! one unit of work. New uploads are followed by a retention pass over the
//! owner's datasets.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{aggregate, Statistics};
use crate::db::{DatasetStore, NewDataset, UnitOfWork};
use crate::models::{Dataset, EquipmentRow};
use crate::parser::parse_table;
use crate::storage::{dataset_file_key, BlobStore};
use crate::types::IngestError;

pub const DEFAULT_MAX_DATASETS_PER_USER: usize = 5;

/// Outcome of one retention pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RetentionReport {
    pub evicted: Vec<Uuid>,
    /// Datasets whose record could not be deleted; retried on the next pass.
    pub failed: Vec<Uuid>,
}

pub struct Ingestor {
    store: Arc<dyn DatasetStore>,
    blobs: Arc<dyn BlobStore>,
    max_datasets_per_user: usize,
}

fn validate_filename(filename: &str) -> Result<(), IngestError> {
    let is_csv = filename
        .rsplit_once('.')
        .map(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        Ok(())
    } else {
        Err(IngestError::InvalidFile("File must be a CSV file.".to_string()))
    }
}

/// Replace the dataset's equipment with `rows` and store the fresh snapshot.
async fn replace_equipment(
    uow: &mut dyn UnitOfWork,
    dataset_id: Uuid,
    rows: &[EquipmentRow],
) -> anyhow::Result<Dataset> {
    let removed = uow.delete_equipment(dataset_id).await?;
    let stored = uow.insert_equipment(dataset_id, rows).await?;
    let stats = aggregate(&stored);
    let dataset = uow
        .update_summary(dataset_id, &stats, stored.len() as i64)
        .await?;

    debug!(
        dataset_id = %dataset_id,
        removed,
        inserted = stored.len(),
        "Replaced equipment"
    );
    Ok(dataset)
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn DatasetStore>,
        blobs: Arc<dyn BlobStore>,
        max_datasets_per_user: usize,
    ) -> Self {
        Self {
            store,
            blobs,
            max_datasets_per_user: max_datasets_per_user.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn DatasetStore> {
        &self.store
    }

    /// Create a dataset from an uploaded table.
    ///
    /// Nothing is persisted unless the whole table is valid and the unit of
    /// work commits. The retention pass runs only after a successful commit.
    pub async fn upload(
        &self,
        user_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Dataset, IngestError> {
        validate_filename(filename)?;
        let rows = parse_table(bytes)?;

        let uploaded_at = Utc::now();
        let id = Uuid::new_v4();
        let new = NewDataset {
            id,
            user_id,
            filename: filename.to_string(),
            file_key: dataset_file_key(id, filename, uploaded_at),
            uploaded_at,
        };

        self.blobs.put(&new.file_key, bytes).await?;

        let committed = async {
            let mut uow = self.store.begin().await?;
            uow.insert_dataset(&new).await?;
            let dataset = replace_equipment(uow.as_mut(), new.id, &rows).await?;
            uow.commit().await?;
            Ok::<_, anyhow::Error>(dataset)
        }
        .await;

        let dataset = match committed {
            Ok(dataset) => dataset,
            Err(e) => {
                if let Err(blob_err) = self.blobs.delete(&new.file_key).await {
                    warn!(key = %new.file_key, error = %blob_err, "Failed to remove orphaned upload");
                }
                return Err(IngestError::Store(e));
            }
        };

        info!(
            dataset_id = %dataset.id,
            user_id = %user_id,
            filename = %dataset.filename,
            rows = dataset.equipment_count,
            "Dataset uploaded"
        );

        match self.enforce_retention(user_id).await {
            Ok(report) if !report.evicted.is_empty() => {
                info!(user_id = %user_id, evicted = report.evicted.len(), "Retention evicted old datasets");
            }
            Ok(_) => {}
            Err(e) => warn!(user_id = %user_id, error = %e, "Retention pass failed"),
        }

        Ok(dataset)
    }

    /// Re-ingest a table into an existing dataset owned by `user_id`.
    ///
    /// Old equipment is fully replaced. On any error the dataset keeps its
    /// previous equipment and snapshot.
    pub async fn ingest(
        &self,
        user_id: Uuid,
        dataset_id: Uuid,
        bytes: &[u8],
    ) -> Result<Statistics, IngestError> {
        let existing = self
            .store
            .get_dataset(user_id, dataset_id)
            .await?
            .ok_or(IngestError::NotFound(dataset_id))?;
        let rows = parse_table(bytes)?;

        let mut uow = self.store.begin().await?;
        let dataset = replace_equipment(uow.as_mut(), dataset_id, &rows).await?;
        uow.commit().await?;

        // The snapshot is authoritative; the retained file just follows it.
        if let Err(e) = self.blobs.put(&existing.file_key, bytes).await {
            warn!(dataset_id = %dataset_id, error = %e, "Failed to replace stored upload");
        }

        info!(
            dataset_id = %dataset_id,
            rows = dataset.equipment_count,
            "Dataset re-ingested"
        );
        Ok(dataset.summary_stats)
    }

    /// Delete every dataset of `user_id` beyond the newest N.
    ///
    /// Best effort per dataset: a failed blob delete never blocks deleting
    /// the record, and a failed record delete never stops the pass.
    pub async fn enforce_retention(&self, user_id: Uuid) -> Result<RetentionReport, IngestError> {
        let datasets = self.store.list_datasets(user_id).await?;
        let mut report = RetentionReport::default();

        for stale in datasets.into_iter().skip(self.max_datasets_per_user) {
            if let Err(e) = self.blobs.delete(&stale.file_key).await {
                warn!(dataset_id = %stale.id, error = %e, "Failed to delete dataset file");
            }

            match self.store.delete_dataset(stale.id).await {
                Ok(_) => {
                    debug!(dataset_id = %stale.id, filename = %stale.filename, "Evicted dataset");
                    report.evicted.push(stale.id);
                }
                Err(e) => {
                    warn!(dataset_id = %stale.id, error = %e, "Failed to evict dataset");
                    report.failed.push(stale.id);
                }
            }
        }

        Ok(report)
    }

    /// Explicit deletion by the owner.
    pub async fn delete_dataset(&self, user_id: Uuid, dataset_id: Uuid) -> Result<(), IngestError> {
        let dataset = self
            .store
            .get_dataset(user_id, dataset_id)
            .await?
            .ok_or(IngestError::NotFound(dataset_id))?;

        if let Err(e) = self.blobs.delete(&dataset.file_key).await {
            warn!(dataset_id = %dataset_id, error = %e, "Failed to delete dataset file");
        }
        self.store.delete_dataset(dataset_id).await?;

        info!(dataset_id = %dataset_id, user_id = %user_id, "Dataset deleted");
        Ok(())
    }
}
