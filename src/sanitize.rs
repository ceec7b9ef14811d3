//! Normalizes a table before any SQL statement is built.
//!
//! Two jobs: canonicalize null-equivalent values (absent, floating-point NaN,
//! the literal token "NaN") to a genuine null, and reduce every column name to
//! its alphanumeric-only form used for parameter binding. The original
//! punctuated names stay with the caller's table; they remain the destination
//! column identifiers in the statement text.

use crate::error::{Result, SyncError};
use crate::table::{Table, Value};

/// Strip every character that is not alphanumeric. The result is used only
/// for binding SQL parameters, never as the destination identifier.
pub fn normalize_column_name(name: &str) -> String {
    name.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Normalize all column names, rejecting empty results and collisions.
///
/// Two distinct raw names reducing to the same token would silently overwrite
/// one binding with the other, so that is refused here rather than left
/// undefined downstream.
pub fn normalize_columns(columns: &[String]) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(columns.len());
    for (idx, raw) in columns.iter().enumerate() {
        let name = normalize_column_name(raw);
        if name.is_empty() {
            return Err(SyncError::EmptyColumnName(raw.clone()));
        }
        if let Some(prev) = normalized.iter().position(|n| *n == name) {
            return Err(SyncError::ColumnCollision {
                first: columns[prev].clone(),
                second: columns[idx].clone(),
                normalized: name,
            });
        }
        normalized.push(name);
    }
    Ok(normalized)
}

/// Produce a cleaned derivative of `table`: same row and column counts, same
/// column order, null-equivalents replaced with [`Value::Null`], and column
/// names normalized. The input is never mutated.
pub fn clean(table: &Table) -> Result<Table> {
    let columns = normalize_columns(table.columns())?;

    let mut cleaned = Table::new(columns);
    for row in table.rows() {
        let values = row
            .iter()
            .map(|v| if v.is_null_like() { Value::Null } else { v.clone() })
            .collect();
        cleaned.push_row(values)?;
    }
    Ok(cleaned)
}
