//! Alternate shapes of the canonical [`Statistics`] for downstream consumers.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{aggregate, Statistics};
use crate::models::{DatasetListItem, Equipment};

/// Number of datasets shown in the per-user summary.
pub const RECENT_DATASETS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Averages {
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
}

/// Nested summary shape expected by remote clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSummary {
    pub count: u64,
    pub averages: Averages,
    pub type_distribution: BTreeMap<String, u64>,
}

impl From<&Statistics> for ClientSummary {
    fn from(stats: &Statistics) -> Self {
        match stats.summary() {
            Some(summary) => Self {
                count: summary.total_equipment,
                averages: Averages {
                    flowrate: summary.avg_flowrate,
                    pressure: summary.avg_pressure,
                    temperature: summary.avg_temperature,
                },
                type_distribution: summary.equipment_type_distribution.clone(),
            },
            None => Self {
                count: 0,
                averages: Averages {
                    flowrate: 0.0,
                    pressure: 0.0,
                    temperature: 0.0,
                },
                type_distribution: BTreeMap::new(),
            },
        }
    }
}

/// Cross-dataset overview of everything a user has uploaded.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub total_equipment: u64,
    pub avg_flowrate: f64,
    pub avg_pressure: f64,
    pub avg_temperature: f64,
    pub equipment_type_distribution: BTreeMap<String, u64>,
    pub recent_datasets: Vec<DatasetListItem>,
}

impl UserSummary {
    /// `datasets` is expected newest-first; only the first few are kept.
    pub fn build(equipment: &[Equipment], datasets: Vec<DatasetListItem>) -> Self {
        let client = ClientSummary::from(&aggregate(equipment));
        let recent_datasets = datasets.into_iter().take(RECENT_DATASETS).collect();

        Self {
            total_equipment: client.count,
            avg_flowrate: client.averages.flowrate,
            avg_pressure: client.averages.pressure,
            avg_temperature: client.averages.temperature,
            equipment_type_distribution: client.type_distribution,
            recent_datasets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EquipmentType;
    use chrono::Utc;
    use uuid::Uuid;

    fn equipment(kind: &str, flowrate: Option<f64>) -> Equipment {
        Equipment {
            id: Uuid::new_v4(),
            dataset_id: Uuid::new_v4(),
            name: "E".to_string(),
            equipment_type: EquipmentType::from(kind),
            flowrate,
            pressure: Some(2.0),
            temperature: None,
            created_at: Utc::now(),
        }
    }

    fn list_item(filename: &str) -> DatasetListItem {
        DatasetListItem {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            uploaded_at: Utc::now(),
            equipment_count: 0,
            summary_stats: Statistics::default(),
        }
    }

    #[test]
    fn test_client_summary_nests_averages() {
        let stats = aggregate(&[equipment("Pump", Some(10.0)), equipment("Column", Some(20.0))]);
        let client = ClientSummary::from(&stats);

        assert_eq!(client.count, 2);
        assert_eq!(client.averages.flowrate, 15.0);
        assert_eq!(client.averages.pressure, 2.0);
        assert_eq!(client.averages.temperature, 0.0);
        assert_eq!(client.type_distribution["Column"], 1);

        let json = serde_json::to_value(&client).unwrap();
        assert_eq!(json["averages"]["flowrate"], 15.0);
        assert!(json.get("avg_flowrate").is_none());
    }

    #[test]
    fn test_client_summary_of_empty_stats() {
        let client = ClientSummary::from(&Statistics::default());
        assert_eq!(client.count, 0);
        assert_eq!(client.averages.flowrate, 0.0);
        assert!(client.type_distribution.is_empty());
    }

    #[test]
    fn test_user_summary_limits_recent_datasets() {
        let datasets = (0..7).map(|i| list_item(&format!("d{i}.csv"))).collect();
        let summary = UserSummary::build(&[equipment("Pump", None)], datasets);

        assert_eq!(summary.recent_datasets.len(), RECENT_DATASETS);
        assert_eq!(summary.recent_datasets[0].filename, "d0.csv");
        assert_eq!(summary.total_equipment, 1);
        assert_eq!(summary.avg_flowrate, 0.0);
    }
}
