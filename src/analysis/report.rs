//! Printable plain-text dataset report.

use std::fmt::{self, Write};

use crate::models::{Dataset, Equipment};
use crate::storage::sanitize_filename;

const RULE_WIDTH: usize = 72;

fn or_na(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn rule(out: &mut String, ch: char) -> fmt::Result {
    writeln!(out, "{}", ch.to_string().repeat(RULE_WIDTH))
}

fn heading(out: &mut String, title: &str) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "{title}")?;
    rule(out, '-')
}

/// File name offered when the report is downloaded.
///
/// Derived from the sanitized upload name, so it is always safe to quote in
/// a `Content-Disposition` header.
pub fn report_filename(dataset: &Dataset) -> String {
    let safe = sanitize_filename(&dataset.filename);
    let stem = match safe.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("csv") && !stem.is_empty() => stem,
        _ => safe.as_str(),
    };
    format!("Report_{stem}.txt")
}

/// Render the report from the dataset's stored snapshot and its equipment.
///
/// Only reads already-computed statistics; nothing is recalculated here.
pub fn render_report(dataset: &Dataset, equipment: &[Equipment]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_report(&mut out, dataset, equipment)?;
    Ok(out)
}

fn write_report(out: &mut String, dataset: &Dataset, equipment: &[Equipment]) -> fmt::Result {
    rule(out, '=')?;
    writeln!(out, "Chemical Equipment Analysis Report")?;
    rule(out, '=')?;

    heading(out, "Dataset Information")?;
    writeln!(out, "{:<24}{}", "Filename:", dataset.filename)?;
    writeln!(
        out,
        "{:<24}{}",
        "Upload Date:",
        dataset.uploaded_at.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "{:<24}{}", "Total Equipment:", dataset.equipment_count)?;

    heading(out, "Summary Statistics")?;
    match dataset.summary_stats.summary() {
        Some(s) => {
            let rows: [(&str, String); 9] = [
                ("Average Flowrate (L/min)", s.avg_flowrate.to_string()),
                ("Average Pressure (Bar)", s.avg_pressure.to_string()),
                ("Average Temperature (C)", s.avg_temperature.to_string()),
                ("Min Flowrate", or_na(s.min_flowrate)),
                ("Max Flowrate", or_na(s.max_flowrate)),
                ("Min Pressure", or_na(s.min_pressure)),
                ("Max Pressure", or_na(s.max_pressure)),
                ("Min Temperature", or_na(s.min_temperature)),
                ("Max Temperature", or_na(s.max_temperature)),
            ];
            for (label, value) in rows {
                writeln!(out, "{:<32}{}", format!("{label}:"), value)?;
            }
        }
        None => writeln!(out, "No equipment recorded.")?,
    }

    heading(out, "Equipment Type Distribution")?;
    if let Some(s) = dataset.summary_stats.summary() {
        for (kind, count) in &s.equipment_type_distribution {
            writeln!(out, "{kind:<32}{count}")?;
        }
    }

    heading(out, "Equipment Details")?;
    writeln!(
        out,
        "{:<20}{:<16}{:>12}{:>12}{:>12}",
        "Name", "Type", "Flowrate", "Pressure", "Temperature"
    )?;
    for item in equipment {
        writeln!(
            out,
            "{:<20}{:<16}{:>12}{:>12}{:>12}",
            item.name,
            item.equipment_type.as_str(),
            or_na(item.flowrate),
            or_na(item.pressure),
            or_na(item.temperature)
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate, Statistics};
    use crate::models::EquipmentType;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn dataset(filename: &str, stats: Statistics, count: i64) -> Dataset {
        Dataset {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            filename: filename.to_string(),
            uploaded_at: Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
            file_key: String::new(),
            summary_stats: stats,
            equipment_count: count,
        }
    }

    #[test]
    fn test_report_contains_sections_and_missing_markers() {
        let equipment = vec![Equipment {
            id: Uuid::new_v4(),
            dataset_id: Uuid::new_v4(),
            name: "Reactor-01".to_string(),
            equipment_type: EquipmentType::Reactor,
            flowrate: Some(100.0),
            pressure: None,
            temperature: Some(80.0),
            created_at: Utc::now(),
        }];
        let ds = dataset("plant.csv", aggregate(&equipment), 1);

        let report = render_report(&ds, &equipment).unwrap();

        assert!(report.contains("Chemical Equipment Analysis Report"));
        assert!(report.contains("plant.csv"));
        assert!(report.contains("2026-03-04 05:06:07"));
        assert!(report.contains("Min Pressure:"));
        assert!(report.contains("N/A"));
        assert!(report.contains("Reactor-01"));
        assert!(report.contains("Equipment Type Distribution"));
    }

    #[test]
    fn test_report_for_empty_dataset() {
        let ds = dataset("empty.csv", Statistics::default(), 0);
        let report = render_report(&ds, &[]).unwrap();
        assert!(report.contains("No equipment recorded."));
    }

    #[test]
    fn test_report_filename_strips_csv_suffix() {
        let ds = dataset("plant.csv", Statistics::default(), 0);
        assert_eq!(report_filename(&ds), "Report_plant.txt");

        let ds = dataset("plant.data", Statistics::default(), 0);
        assert_eq!(report_filename(&ds), "Report_plant.data.txt");
    }

    #[test]
    fn test_report_filename_is_header_safe() {
        let ds = dataset("north \"unit\";2.CSV", Statistics::default(), 0);
        let name = report_filename(&ds);

        assert_eq!(name, "Report_north__unit__2.txt");
        assert!(!name.contains('"'));
        assert!(axum::http::HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")).is_ok());
    }
}
