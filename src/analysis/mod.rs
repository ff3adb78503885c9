//! Statistics aggregation over equipment readings.
//!
//! `aggregate` is the single source of truth for every statistics payload the
//! service hands out; the views in [`views`] and the report in [`report`] only
//! reshape its output.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::EquipmentType;

pub mod report;
pub mod views;

pub use report::{render_report, report_filename};
pub use views::{Averages, ClientSummary, UserSummary};

/// Anything carrying a type label and the three optional process readings.
pub trait Readings {
    fn equipment_type(&self) -> &EquipmentType;
    fn flowrate(&self) -> Option<f64>;
    fn pressure(&self) -> Option<f64>;
    fn temperature(&self) -> Option<f64>;
}

/// Persisted statistics snapshot of a dataset.
///
/// A dataset without equipment carries `Empty`, which serializes as `{}`.
/// Only a literal `{}` reads back as `Empty`; any other map must be a full
/// [`Summary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Statistics {
    Summary(Summary),
    Empty {},
}

impl<'de> Deserialize<'de> for Statistics {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct NoFields {}

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Stored {
            Summary(Summary),
            Empty(NoFields),
        }

        match Stored::deserialize(deserializer)? {
            Stored::Summary(summary) => Ok(Statistics::Summary(summary)),
            Stored::Empty(NoFields {}) => Ok(Statistics::Empty {}),
        }
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Statistics::Empty {}
    }
}

impl Statistics {
    pub fn summary(&self) -> Option<&Summary> {
        match self {
            Statistics::Summary(summary) => Some(summary),
            Statistics::Empty {} => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Statistics::Empty {})
    }

    pub fn total_equipment(&self) -> u64 {
        self.summary().map(|s| s.total_equipment).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_equipment: u64,
    pub avg_flowrate: f64,
    pub avg_pressure: f64,
    pub avg_temperature: f64,
    pub min_flowrate: Option<f64>,
    pub max_flowrate: Option<f64>,
    pub min_pressure: Option<f64>,
    pub max_pressure: Option<f64>,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub equipment_type_distribution: BTreeMap<String, u64>,
}

/// Mean/min/max of one reading across a collection.
///
/// Mean falls back to 0 with no values while min/max stay missing; both
/// behaviours are part of the published snapshot format.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MetricStats {
    mean: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl MetricStats {
    fn from_values(values: &[f64]) -> Self {
        let Some(&first) = values.first() else {
            return Self {
                mean: 0.0,
                min: None,
                max: None,
            };
        };

        let (min, max) = values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        Self {
            mean: round2(mean(values)),
            min: Some(round2(min)),
            max: Some(round2(max)),
        }
    }
}

/// Arithmetic mean of finite values that stays finite when the plain sum
/// overflows.
fn mean(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    if sum.is_finite() {
        sum / n
    } else {
        values.iter().map(|v| v / n).sum()
    }
}

fn readings<R: Readings>(items: &[R], reading: impl Fn(&R) -> Option<f64>) -> Vec<f64> {
    items.iter().filter_map(reading).collect()
}

/// Compute the statistics snapshot for a collection of equipment.
pub fn aggregate<R: Readings>(items: &[R]) -> Statistics {
    if items.is_empty() {
        return Statistics::Empty {};
    }

    let flowrate = MetricStats::from_values(&readings(items, R::flowrate));
    let pressure = MetricStats::from_values(&readings(items, R::pressure));
    let temperature = MetricStats::from_values(&readings(items, R::temperature));

    Statistics::Summary(Summary {
        total_equipment: items.len() as u64,
        avg_flowrate: flowrate.mean,
        avg_pressure: pressure.mean,
        avg_temperature: temperature.mean,
        min_flowrate: flowrate.min,
        max_flowrate: flowrate.max,
        min_pressure: pressure.min,
        max_pressure: pressure.max,
        min_temperature: temperature.min,
        max_temperature: temperature.max,
        equipment_type_distribution: type_distribution(items),
    })
}

/// Count occurrences of each literal type label.
pub fn type_distribution<R: Readings>(items: &[R]) -> BTreeMap<String, u64> {
    let mut distribution = BTreeMap::new();
    for item in items {
        *distribution
            .entry(item.equipment_type().as_str().to_string())
            .or_insert(0) += 1;
    }
    distribution
}

/// Round to two decimal places, ties to even on the exact binary value.
///
/// Goes through decimal formatting, which is exact and never scales the
/// value, so huge readings stay finite.
pub fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EquipmentRow;

    fn row(
        name: &str,
        kind: &str,
        flowrate: Option<f64>,
        pressure: Option<f64>,
        temperature: Option<f64>,
    ) -> EquipmentRow {
        EquipmentRow {
            name: name.to_string(),
            equipment_type: EquipmentType::from(kind),
            flowrate,
            pressure,
            temperature,
        }
    }

    #[test]
    fn test_empty_collection_is_explicitly_empty() {
        let stats = aggregate::<EquipmentRow>(&[]);
        assert!(stats.is_empty());
        assert_eq!(stats.total_equipment(), 0);
        assert_eq!(serde_json::to_string(&stats).unwrap(), "{}");
    }

    #[test]
    fn test_two_pumps_example() {
        let rows = vec![
            row("Pump-01", "Pump", Some(150.5), Some(10.5), Some(45.2)),
            row("Pump-02", "Pump", Some(200.3), Some(12.0), Some(48.5)),
        ];

        let stats = aggregate(&rows);
        let summary = stats.summary().unwrap();

        assert_eq!(summary.total_equipment, 2);
        assert_eq!(summary.avg_flowrate, 175.4);
        assert_eq!(summary.min_flowrate, Some(150.5));
        assert_eq!(summary.max_flowrate, Some(200.3));
        assert_eq!(summary.avg_pressure, 11.25);
        assert_eq!(summary.avg_temperature, 46.85);
        assert_eq!(summary.equipment_type_distribution.len(), 1);
        assert_eq!(summary.equipment_type_distribution["Pump"], 2);
    }

    #[test]
    fn test_all_null_metric_has_zero_mean_and_missing_bounds() {
        let rows = vec![
            row("A", "Pump", Some(1.0), None, Some(20.0)),
            row("B", "Reactor", Some(3.0), None, None),
        ];

        let summary = aggregate(&rows).summary().cloned().unwrap();

        assert_eq!(summary.avg_pressure, 0.0);
        assert_eq!(summary.min_pressure, None);
        assert_eq!(summary.max_pressure, None);

        // Partial nulls only shrink the sample, not the total
        assert_eq!(summary.avg_temperature, 20.0);
        assert_eq!(summary.total_equipment, 2);
    }

    #[test]
    fn test_total_counts_every_record_regardless_of_nulls() {
        let rows: Vec<EquipmentRow> = (0..7)
            .map(|i| row(&format!("E-{i}"), "Other", None, None, None))
            .collect();

        let stats = aggregate(&rows);
        assert_eq!(stats.total_equipment(), 7);
        assert_eq!(stats.summary().unwrap().equipment_type_distribution["Other"], 7);
    }

    #[test]
    fn test_distribution_keeps_literal_labels_and_sums_to_total() {
        let rows = vec![
            row("A", "Pump", None, None, None),
            row("B", "Boiler", None, None, None),
            row("C", "Heat Exchanger", None, None, None),
            row("D", "Boiler", None, None, None),
        ];

        let summary = aggregate(&rows).summary().cloned().unwrap();
        let distribution = &summary.equipment_type_distribution;

        assert_eq!(distribution["Boiler"], 2);
        assert_eq!(distribution["Heat Exchanger"], 1);
        assert_eq!(distribution.values().sum::<u64>(), summary.total_equipment);
    }

    #[test]
    fn test_values_are_rounded_to_two_decimals() {
        let rows = vec![
            row("A", "Pump", Some(1.0), Some(1.234), None),
            row("B", "Pump", Some(2.0), Some(5.678), None),
            row("C", "Pump", Some(2.0), None, None),
        ];

        let summary = aggregate(&rows).summary().cloned().unwrap();
        assert_eq!(summary.avg_flowrate, 1.67);
        assert_eq!(summary.min_pressure, Some(1.23));
        assert_eq!(summary.max_pressure, Some(5.68));
    }

    #[test]
    fn test_rounding_ties_go_to_even() {
        let summary = aggregate(&[row("A", "Pump", Some(0.125), Some(0.0), None)])
            .summary()
            .cloned()
            .unwrap();
        assert_eq!(summary.min_flowrate, Some(0.12));
        assert_eq!(summary.avg_flowrate, 0.12);

        let rows = vec![
            row("A", "Pump", None, Some(0.0), None),
            row("B", "Pump", None, Some(0.25), None),
        ];
        assert_eq!(aggregate(&rows).summary().unwrap().avg_pressure, 0.12);

        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-2.675), -2.67);
    }

    #[test]
    fn test_huge_finite_readings_keep_a_finite_snapshot() {
        let rows = vec![
            row("A", "Pump", Some(1e307), None, None),
            row("B", "Pump", Some(1.7e308), None, None),
            row("C", "Pump", Some(1.7e308), None, None),
        ];

        let summary = aggregate(&rows).summary().cloned().unwrap();
        assert!(summary.avg_flowrate.is_finite());
        assert!(summary.avg_flowrate > 1e308);
        assert_eq!(summary.min_flowrate, Some(1e307));
        assert_eq!(summary.max_flowrate, Some(1.7e308));

        let json = serde_json::to_value(Statistics::Summary(summary)).unwrap();
        assert!(json["avg_flowrate"].is_number());
        let back: Statistics = serde_json::from_value(json).unwrap();
        assert_eq!(back.total_equipment(), 3);
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error_not_empty() {
        let nulled = serde_json::json!({
            "total_equipment": 3,
            "avg_flowrate": null,
            "avg_pressure": 1.0,
            "avg_temperature": 1.0,
            "min_flowrate": null,
            "max_flowrate": null,
            "min_pressure": 1.0,
            "max_pressure": 1.0,
            "min_temperature": 1.0,
            "max_temperature": 1.0,
            "equipment_type_distribution": { "Pump": 3 }
        });
        assert!(serde_json::from_value::<Statistics>(nulled).is_err());
        assert!(serde_json::from_str::<Statistics>(r#"{"total_equipment": 3}"#).is_err());
    }

    #[test]
    fn test_snapshot_json_shape() {
        let rows = vec![row("A", "Pump", Some(1.0), None, None)];
        let json = serde_json::to_value(aggregate(&rows)).unwrap();

        assert_eq!(json["total_equipment"], 1);
        assert_eq!(json["avg_pressure"], 0.0);
        assert!(json["min_pressure"].is_null());
        assert!(json["max_temperature"].is_null());
        assert_eq!(json["equipment_type_distribution"]["Pump"], 1);

        let back: Statistics = serde_json::from_value(json).unwrap();
        assert_eq!(back.total_equipment(), 1);

        let empty: Statistics = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
