//! CSV bounce for a [`Table`].
//!
//! The general-ledger report writes its frame to a temp CSV and reads it back
//! before persisting; the round trip through text re-infers column types and
//! flattens whatever mixed types the payload reshaping produced. Reading an
//! externally produced CSV works the same way: empty fields are nulls and
//! every other field gets the narrowest type that parses.

use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::table::{Table, Value};

/// Timestamp formats accepted when re-inferring a field.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Write `table` to `path` as a headered CSV. Nulls become empty fields.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|v| v.render()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a headered CSV back into a table, inferring each field's type.
pub fn read_table(path: &Path) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record?;
        let row = record.iter().map(infer_field).collect();
        table.push_row(row)?;
    }
    Ok(table)
}

/// Narrowest-type-that-parses inference for a single text field.
fn infer_field(field: &str) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    if field == "true" {
        return Value::Bool(true);
    }
    if field == "false" {
        return Value::Bool(false);
    }
    if let Ok(i) = field.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = field.parse::<f64>() {
        return Value::Float(f);
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(field, format) {
            return Value::Timestamp(ts);
        }
    }
    Value::Text(field.to_string())
}
