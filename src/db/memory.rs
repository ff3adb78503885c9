//! In-process store used when no database is configured, and by tests.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DatasetStore, NewDataset, UnitOfWork};
use crate::analysis::Statistics;
use crate::models::{Dataset, Equipment, EquipmentRow, User};

#[derive(Debug, Default, Clone)]
struct Tables {
    users: Vec<User>,
    /// Commit order; later entries are newer on timestamp ties.
    datasets: Vec<Dataset>,
    equipment: Vec<Equipment>,
}

impl Tables {
    fn dataset_mut(&mut self, id: Uuid) -> Option<&mut Dataset> {
        self.datasets.iter_mut().find(|d| d.id == id)
    }

    fn apply(&mut self, op: Op) {
        match op {
            Op::InsertDataset(dataset) => self.datasets.push(dataset),
            Op::DeleteEquipment(dataset_id) => self.equipment.retain(|e| e.dataset_id != dataset_id),
            Op::InsertEquipment(mut rows) => self.equipment.append(&mut rows),
            Op::UpdateSummary { dataset_id, stats, equipment_count } => {
                if let Some(dataset) = self.dataset_mut(dataset_id) {
                    dataset.summary_stats = stats;
                    dataset.equipment_count = equipment_count;
                }
            }
        }
    }
}

fn sorted_by_name(mut equipment: Vec<Equipment>) -> Vec<Equipment> {
    // stable sort keeps insertion order between equal names
    equipment.sort_by(|a, b| a.name.cmp(&b.name));
    equipment
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let working = self.inner.read().await.clone();
        Ok(Box::new(MemoryUnitOfWork {
            shared: Arc::clone(&self.inner),
            working,
            ops: Vec::new(),
        }))
    }

    async fn get_or_create_user(&self, username: &str, email: &str) -> Result<User> {
        let mut guard = self.inner.write().await;
        if let Some(user) = guard.users.iter().find(|u| u.username == username) {
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        guard.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let guard = self.inner.read().await;
        Ok(guard.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn get_dataset(&self, user_id: Uuid, dataset_id: Uuid) -> Result<Option<Dataset>> {
        let guard = self.inner.read().await;
        Ok(guard
            .datasets
            .iter()
            .find(|d| d.id == dataset_id && d.user_id == user_id)
            .cloned())
    }

    async fn find_dataset_by_filename(&self, user_id: Uuid, filename: &str) -> Result<Option<Dataset>> {
        Ok(self
            .list_datasets(user_id)
            .await?
            .into_iter()
            .find(|d| d.filename == filename))
    }

    async fn list_datasets(&self, user_id: Uuid) -> Result<Vec<Dataset>> {
        let guard = self.inner.read().await;
        let mut owned: Vec<(usize, &Dataset)> = guard
            .datasets
            .iter()
            .enumerate()
            .filter(|(_, d)| d.user_id == user_id)
            .collect();
        owned.sort_by(|a, b| {
            b.1.uploaded_at
                .cmp(&a.1.uploaded_at)
                .then_with(|| b.0.cmp(&a.0))
        });
        Ok(owned.into_iter().map(|(_, d)| d.clone()).collect())
    }

    async fn list_equipment(&self, dataset_id: Uuid) -> Result<Vec<Equipment>> {
        let guard = self.inner.read().await;
        let equipment = guard
            .equipment
            .iter()
            .filter(|e| e.dataset_id == dataset_id)
            .cloned()
            .collect();
        Ok(sorted_by_name(equipment))
    }

    async fn list_user_equipment(&self, user_id: Uuid) -> Result<Vec<Equipment>> {
        let guard = self.inner.read().await;
        let owned: HashSet<Uuid> = guard
            .datasets
            .iter()
            .filter(|d| d.user_id == user_id)
            .map(|d| d.id)
            .collect();
        let equipment = guard
            .equipment
            .iter()
            .filter(|e| owned.contains(&e.dataset_id))
            .cloned()
            .collect();
        Ok(sorted_by_name(equipment))
    }

    async fn delete_dataset(&self, dataset_id: Uuid) -> Result<bool> {
        let mut guard = self.inner.write().await;
        let before = guard.datasets.len();
        guard.datasets.retain(|d| d.id != dataset_id);
        let existed = guard.datasets.len() != before;
        if existed {
            guard.equipment.retain(|e| e.dataset_id != dataset_id);
        }
        Ok(existed)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[derive(Clone)]
enum Op {
    InsertDataset(Dataset),
    DeleteEquipment(Uuid),
    InsertEquipment(Vec<Equipment>),
    UpdateSummary {
        dataset_id: Uuid,
        stats: Statistics,
        equipment_count: i64,
    },
}

impl Op {
    fn touched_dataset(&self) -> Option<Uuid> {
        match self {
            Op::InsertDataset(_) => None,
            Op::DeleteEquipment(id) => Some(*id),
            Op::InsertEquipment(rows) => rows.first().map(|e| e.dataset_id),
            Op::UpdateSummary { dataset_id, .. } => Some(*dataset_id),
        }
    }
}

/// Stages changes against a private snapshot and replays them on commit.
pub struct MemoryUnitOfWork {
    shared: Arc<RwLock<Tables>>,
    working: Tables,
    ops: Vec<Op>,
}

impl MemoryUnitOfWork {
    fn record(&mut self, op: Op) {
        self.working.apply(op.clone());
        self.ops.push(op);
    }

    fn require_dataset(&self, dataset_id: Uuid) -> Result<()> {
        if self.working.datasets.iter().any(|d| d.id == dataset_id) {
            Ok(())
        } else {
            bail!("Dataset {dataset_id} does not exist")
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_dataset(&mut self, dataset: &NewDataset) -> Result<Dataset> {
        if self.working.datasets.iter().any(|d| d.id == dataset.id) {
            bail!("Dataset {} already exists", dataset.id);
        }
        if !self.working.users.iter().any(|u| u.id == dataset.user_id) {
            bail!("User {} does not exist", dataset.user_id);
        }

        let row = Dataset {
            id: dataset.id,
            user_id: dataset.user_id,
            filename: dataset.filename.clone(),
            uploaded_at: dataset.uploaded_at,
            file_key: dataset.file_key.clone(),
            summary_stats: Statistics::default(),
            equipment_count: 0,
        };
        self.record(Op::InsertDataset(row.clone()));
        Ok(row)
    }

    async fn delete_equipment(&mut self, dataset_id: Uuid) -> Result<u64> {
        self.require_dataset(dataset_id)?;
        let removed = self
            .working
            .equipment
            .iter()
            .filter(|e| e.dataset_id == dataset_id)
            .count() as u64;
        self.record(Op::DeleteEquipment(dataset_id));
        Ok(removed)
    }

    async fn insert_equipment(&mut self, dataset_id: Uuid, rows: &[EquipmentRow]) -> Result<Vec<Equipment>> {
        self.require_dataset(dataset_id)?;
        let now = Utc::now();
        let stored: Vec<Equipment> = rows
            .iter()
            .map(|row| Equipment {
                id: Uuid::new_v4(),
                dataset_id,
                name: row.name.clone(),
                equipment_type: row.equipment_type.clone(),
                flowrate: row.flowrate,
                pressure: row.pressure,
                temperature: row.temperature,
                created_at: now,
            })
            .collect();
        if !stored.is_empty() {
            self.record(Op::InsertEquipment(stored.clone()));
        }
        Ok(stored)
    }

    async fn update_summary(&mut self, dataset_id: Uuid, stats: &Statistics, equipment_count: i64) -> Result<Dataset> {
        self.require_dataset(dataset_id)?;
        self.record(Op::UpdateSummary {
            dataset_id,
            stats: stats.clone(),
            equipment_count,
        });
        self.working
            .dataset_mut(dataset_id)
            .map(|d| d.clone())
            .ok_or_else(|| anyhow::anyhow!("Dataset {dataset_id} does not exist"))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryUnitOfWork { shared, ops, .. } = *self;
        let mut guard = shared.write().await;

        // A dataset deleted since `begin` must not receive orphaned rows.
        let inserted: HashSet<Uuid> = ops
            .iter()
            .filter_map(|op| match op {
                Op::InsertDataset(d) => Some(d.id),
                _ => None,
            })
            .collect();
        for id in ops.iter().filter_map(Op::touched_dataset) {
            if !inserted.contains(&id) && !guard.datasets.iter().any(|d| d.id == id) {
                bail!("Dataset {id} was deleted before commit");
            }
        }

        for op in ops {
            guard.apply(op);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate;
    use crate::models::EquipmentType;

    fn rows(names: &[&str]) -> Vec<EquipmentRow> {
        names
            .iter()
            .map(|name| EquipmentRow {
                name: name.to_string(),
                equipment_type: EquipmentType::Pump,
                flowrate: Some(1.0),
                pressure: None,
                temperature: None,
            })
            .collect()
    }

    fn new_dataset(user_id: Uuid, filename: &str) -> NewDataset {
        NewDataset {
            id: Uuid::new_v4(),
            user_id,
            filename: filename.to_string(),
            file_key: format!("datasets/{filename}"),
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_makes_changes_visible() {
        let store = MemoryStore::new();
        let user = store.get_or_create_user("alice", "a@example.com").await.unwrap();
        let new = new_dataset(user.id, "a.csv");

        let mut uow = store.begin().await.unwrap();
        uow.insert_dataset(&new).await.unwrap();
        let stored = uow.insert_equipment(new.id, &rows(&["b", "a"])).await.unwrap();
        uow.update_summary(new.id, &aggregate(&stored), 2).await.unwrap();

        // Nothing is visible before commit
        assert!(store.get_dataset(user.id, new.id).await.unwrap().is_none());

        uow.commit().await.unwrap();

        let dataset = store.get_dataset(user.id, new.id).await.unwrap().unwrap();
        assert_eq!(dataset.equipment_count, 2);
        let equipment = store.list_equipment(new.id).await.unwrap();
        assert_eq!(equipment[0].name, "a");
        assert_eq!(equipment[1].name, "b");
    }

    #[tokio::test]
    async fn test_drop_without_commit_discards_everything() {
        let store = MemoryStore::new();
        let user = store.get_or_create_user("alice", "").await.unwrap();
        let new = new_dataset(user.id, "a.csv");

        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_dataset(&new).await.unwrap();
            uow.insert_equipment(new.id, &rows(&["x"])).await.unwrap();
        }

        assert!(store.list_datasets(user.id).await.unwrap().is_empty());
        assert!(store.list_equipment(new.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_datasets_are_scoped_to_owner() {
        let store = MemoryStore::new();
        let alice = store.get_or_create_user("alice", "").await.unwrap();
        let bob = store.get_or_create_user("bob", "").await.unwrap();
        let new = new_dataset(alice.id, "a.csv");

        let mut uow = store.begin().await.unwrap();
        uow.insert_dataset(&new).await.unwrap();
        uow.commit().await.unwrap();

        assert!(store.get_dataset(alice.id, new.id).await.unwrap().is_some());
        assert!(store.get_dataset(bob.id, new.id).await.unwrap().is_none());
        assert!(store.list_datasets(bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_equipment() {
        let store = MemoryStore::new();
        let user = store.get_or_create_user("alice", "").await.unwrap();
        let new = new_dataset(user.id, "a.csv");

        let mut uow = store.begin().await.unwrap();
        uow.insert_dataset(&new).await.unwrap();
        uow.insert_equipment(new.id, &rows(&["x", "y"])).await.unwrap();
        uow.commit().await.unwrap();

        assert!(store.delete_dataset(new.id).await.unwrap());
        assert!(store.list_equipment(new.id).await.unwrap().is_empty());
        assert!(!store.delete_dataset(new.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_fails_when_dataset_deleted_meanwhile() {
        let store = MemoryStore::new();
        let user = store.get_or_create_user("alice", "").await.unwrap();
        let new = new_dataset(user.id, "a.csv");

        let mut uow = store.begin().await.unwrap();
        uow.insert_dataset(&new).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.delete_equipment(new.id).await.unwrap();
        uow.insert_equipment(new.id, &rows(&["x"])).await.unwrap();

        store.delete_dataset(new.id).await.unwrap();

        assert!(uow.commit().await.is_err());
        assert!(store.list_user_equipment(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_datasets_newest_first_with_stable_ties() {
        let store = MemoryStore::new();
        let user = store.get_or_create_user("alice", "").await.unwrap();
        let stamp = Utc::now();

        for name in ["first.csv", "second.csv", "third.csv"] {
            let mut new = new_dataset(user.id, name);
            new.uploaded_at = stamp;
            let mut uow = store.begin().await.unwrap();
            uow.insert_dataset(&new).await.unwrap();
            uow.commit().await.unwrap();
        }

        let names: Vec<String> = store
            .list_datasets(user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.filename)
            .collect();
        assert_eq!(names, vec!["third.csv", "second.csv", "first.csv"]);
    }

    #[tokio::test]
    async fn test_get_or_create_user_is_idempotent() {
        let store = MemoryStore::new();
        let first = store.get_or_create_user("demo", "d@example.com").await.unwrap();
        let second = store.get_or_create_user("demo", "other@example.com").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.get_user(first.id).await.unwrap().unwrap().username, "demo");
    }
}
