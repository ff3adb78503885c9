//! Equipment table parser.
//!
//! Turns raw upload bytes into typed [`EquipmentRow`]s. Nothing past this
//! module ever sees an untyped cell.

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

use crate::models::{EquipmentRow, EquipmentType};

pub const COL_NAME: &str = "Equipment Name";
pub const COL_TYPE: &str = "Type";
pub const COL_FLOWRATE: &str = "Flowrate";
pub const COL_PRESSURE: &str = "Pressure";
pub const COL_TEMPERATURE: &str = "Temperature";

pub const REQUIRED_COLUMNS: [&str; 5] = [
    COL_NAME,
    COL_TYPE,
    COL_FLOWRATE,
    COL_PRESSURE,
    COL_TEMPERATURE,
];

/// Cell values read as "no reading", compared case-insensitively.
const MISSING_MARKERS: [&str; 9] = ["na", "n/a", "#n/a", "nan", "-nan", "null", "none", "<na>", "-"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("CSV must contain columns: {}", REQUIRED_COLUMNS.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Error processing row {row}: could not convert {column} value {value:?} to a number")]
    Row {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("Error processing CSV: {0}")]
    Malformed(String),
}

/// Resolved positions of the required columns inside the header.
struct ColumnMap {
    name: usize,
    kind: usize,
    flowrate: usize,
    pressure: usize,
    temperature: usize,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self, ParseError> {
        let position = |column: &str| headers.iter().position(|h| h == column);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| position(column).is_none())
            .map(|c| c.to_string())
            .collect();

        match (
            position(COL_NAME),
            position(COL_TYPE),
            position(COL_FLOWRATE),
            position(COL_PRESSURE),
            position(COL_TEMPERATURE),
        ) {
            (Some(name), Some(kind), Some(flowrate), Some(pressure), Some(temperature)) => Ok(Self {
                name,
                kind,
                flowrate,
                pressure,
                temperature,
            }),
            _ => Err(ParseError::Schema { missing }),
        }
    }
}

fn text_cell(record: &StringRecord, idx: usize) -> String {
    record.get(idx).map(|v| v.trim().to_string()).unwrap_or_default()
}

fn numeric_cell(
    record: &StringRecord,
    idx: usize,
    row: usize,
    column: &'static str,
) -> Result<Option<f64>, ParseError> {
    let raw = match record.get(idx) {
        Some(value) => value.trim(),
        None => return Ok(None),
    };

    if raw.is_empty() || MISSING_MARKERS.iter().any(|m| raw.eq_ignore_ascii_case(m)) {
        return Ok(None);
    }

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(ParseError::Row {
            row,
            column,
            value: raw.to_string(),
        }),
    }
}

/// Parse an uploaded equipment table.
///
/// Rows come back in file order. The first bad numeric cell rejects the
/// whole table.
pub fn parse_table(bytes: &[u8]) -> Result<Vec<EquipmentRow>, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(bytes);

    let headers = rdr
        .headers()
        .map_err(|e| ParseError::Malformed(e.to_string()))?
        .clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| ParseError::Malformed(e.to_string()))?;
        let row = idx + 1;

        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        rows.push(EquipmentRow {
            name: text_cell(&record, columns.name),
            equipment_type: EquipmentType::from(text_cell(&record, columns.kind)),
            flowrate: numeric_cell(&record, columns.flowrate, row, COL_FLOWRATE)?,
            pressure: numeric_cell(&record, columns.pressure, row, COL_PRESSURE)?,
            temperature: numeric_cell(&record, columns.temperature, row, COL_TEMPERATURE)?,
        });
    }

    Ok(rows)
}
