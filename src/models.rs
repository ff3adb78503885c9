use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::config::Config;
use crate::db::DatasetStore;
use crate::ingest::Ingestor;
use crate::analysis::{Readings, Statistics};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DatasetStore>,
    pub ingestor: Arc<Ingestor>,
    pub config: Config,
}

// Core records
// Note: FromRow is needed for runtime query_as (no DATABASE_URL at compile time)

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// One uploaded table plus its derived statistics.
///
/// `summary_stats` and `equipment_count` are only ever written together by
/// the ingestion coordinator, from the equipment currently linked here.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Dataset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub file_key: String,
    #[sqlx(json)]
    pub summary_stats: Statistics,
    pub equipment_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Equipment {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub dataset_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub equipment_type: EquipmentType,
    pub flowrate: Option<f64>,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Readings for Equipment {
    fn equipment_type(&self) -> &EquipmentType {
        &self.equipment_type
    }

    fn flowrate(&self) -> Option<f64> {
        self.flowrate
    }

    fn pressure(&self) -> Option<f64> {
        self.pressure
    }

    fn temperature(&self) -> Option<f64> {
        self.temperature
    }
}

/// A validated table row, produced by the parser and consumed by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentRow {
    pub name: String,
    pub equipment_type: EquipmentType,
    pub flowrate: Option<f64>,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
}

impl Readings for EquipmentRow {
    fn equipment_type(&self) -> &EquipmentType {
        &self.equipment_type
    }

    fn flowrate(&self) -> Option<f64> {
        self.flowrate
    }

    fn pressure(&self) -> Option<f64> {
        self.pressure
    }

    fn temperature(&self) -> Option<f64> {
        self.temperature
    }
}

/// Equipment category. Values outside the known set are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EquipmentType {
    Pump,
    Compressor,
    HeatExchanger,
    Reactor,
    Separator,
    Column,
    Other,
    Unrecognized(String),
}

impl EquipmentType {
    pub fn as_str(&self) -> &str {
        match self {
            EquipmentType::Pump => "Pump",
            EquipmentType::Compressor => "Compressor",
            EquipmentType::HeatExchanger => "Heat Exchanger",
            EquipmentType::Reactor => "Reactor",
            EquipmentType::Separator => "Separator",
            EquipmentType::Column => "Column",
            EquipmentType::Other => "Other",
            EquipmentType::Unrecognized(raw) => raw,
        }
    }
}

impl From<&str> for EquipmentType {
    fn from(value: &str) -> Self {
        match value {
            "Pump" => EquipmentType::Pump,
            "Compressor" => EquipmentType::Compressor,
            "Heat Exchanger" => EquipmentType::HeatExchanger,
            "Reactor" => EquipmentType::Reactor,
            "Separator" => EquipmentType::Separator,
            "Column" => EquipmentType::Column,
            "Other" => EquipmentType::Other,
            other => EquipmentType::Unrecognized(other.to_string()),
        }
    }
}

impl From<String> for EquipmentType {
    fn from(value: String) -> Self {
        EquipmentType::from(value.as_str())
    }
}

impl fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EquipmentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EquipmentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(EquipmentType::from(raw))
    }
}

// API Request/Response types

#[derive(Debug, Serialize)]
pub struct DatasetListItem {
    pub id: Uuid,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub equipment_count: i64,
    pub summary_stats: Statistics,
}

impl From<Dataset> for DatasetListItem {
    fn from(dataset: Dataset) -> Self {
        Self {
            id: dataset.id,
            filename: dataset.filename,
            uploaded_at: dataset.uploaded_at,
            equipment_count: dataset.equipment_count,
            summary_stats: dataset.summary_stats,
        }
    }
}

/// Public view of a dataset's owner.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetOwner {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&User> for DatasetOwner {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DatasetDetail {
    pub id: Uuid,
    pub user: DatasetOwner,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub summary_stats: Statistics,
    pub equipment_count: i64,
    pub equipment: Vec<Equipment>,
}

impl DatasetDetail {
    pub fn new(dataset: Dataset, owner: &User, equipment: Vec<Equipment>) -> Self {
        Self {
            id: dataset.id,
            user: DatasetOwner::from(owner),
            filename: dataset.filename,
            uploaded_at: dataset.uploaded_at,
            summary_stats: dataset.summary_stats,
            equipment_count: dataset.equipment_count,
            equipment,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub dataset: DatasetDetail,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub store: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_types_round_trip_through_strings() {
        let known = [
            EquipmentType::Pump,
            EquipmentType::Compressor,
            EquipmentType::HeatExchanger,
            EquipmentType::Reactor,
            EquipmentType::Separator,
            EquipmentType::Column,
            EquipmentType::Other,
        ];
        for kind in known {
            assert_eq!(EquipmentType::from(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_unrecognized_type_is_preserved_verbatim() {
        let kind = EquipmentType::from("Boiler");
        assert_eq!(kind, EquipmentType::Unrecognized("Boiler".to_string()));
        assert_eq!(kind.to_string(), "Boiler");

        // Matching is exact, not case-insensitive
        assert_eq!(
            EquipmentType::from("pump"),
            EquipmentType::Unrecognized("pump".to_string())
        );
    }

    #[test]
    fn test_equipment_type_serializes_as_plain_string() {
        let json = serde_json::to_string(&EquipmentType::HeatExchanger).unwrap();
        assert_eq!(json, "\"Heat Exchanger\"");

        let back: EquipmentType = serde_json::from_str("\"Valve\"").unwrap();
        assert_eq!(back, EquipmentType::Unrecognized("Valve".to_string()));
    }
}
