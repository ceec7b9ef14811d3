//! In-memory tabular result set.
//!
//! A [`Table`] is an ordered set of named columns with positional rows. It is
//! the exchange format between the report collaborators (which flatten API
//! payloads into it) and the warehouse persistence layer (which binds it into
//! batched SQL). Column types are not declared up front; they are inferred
//! from the values actually present, the way heterogeneous report payloads
//! require.

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::{Result, SyncError};

/// A single scalar cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Whether this value is a null-equivalent: a genuine null, a
    /// floating-point NaN, or the literal token "NaN".
    pub fn is_null_like(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            Value::Text(s) => s == "NaN",
            _ => false,
        }
    }

    /// Render the value for text serialization. Null becomes the empty string.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        }
    }

    fn from_json(json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Value::Text(s.clone()),
            // Nested structures are carried through as their JSON text; the
            // report glue extracts what it needs before building the table.
            other => Value::Text(other.to_string()),
        }
    }
}

/// Scalar type of a column, inferred from its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Text,
    Timestamp,
}

impl ColumnType {
    /// Postgres type name used when the fallback path creates the table.
    pub fn pg_type(self) -> &'static str {
        match self {
            ColumnType::Bool => "BOOLEAN",
            ColumnType::Int => "BIGINT",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

/// Ordered columns plus positional rows. Every row holds exactly one value
/// per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from a list of JSON records, the shape the report API
    /// returns after pagination. Columns are taken in first-seen key order;
    /// keys absent from a record become nulls.
    pub fn from_records(records: &[serde_json::Map<String, JsonValue>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|col| record.get(col).map(Value::from_json).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Append a row. The value count must match the column count.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(SyncError::ArityMismatch {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Get a single cell.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Rename columns in place. Pairs whose source name is absent are ignored,
    /// matching the lenient rename the report reshaping relies on.
    pub fn rename_columns(&mut self, renames: &[(&str, &str)]) {
        for (from, to) in renames {
            if let Some(idx) = self.column_index(from) {
                self.columns[idx] = (*to).to_string();
            }
        }
    }

    /// Drop the named columns and their values. Absent names are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !names.contains(&self.columns[i].as_str()))
            .collect();
        self.columns = keep.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            *row = keep.iter().map(|&i| row[i].clone()).collect();
        }
    }

    /// Reorder the table to exactly the named columns, in that order.
    pub fn select_columns(&self, names: &[&str]) -> Result<Table> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .column_index(name)
                .ok_or_else(|| SyncError::MalformedReport(format!("missing column `{name}`")))?;
            indices.push(idx);
        }
        let columns = names.iter().map(|n| n.to_string()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Table { columns, rows })
    }

    /// Append a column holding the same value in every row.
    pub fn add_constant_column(&mut self, name: &str, value: Value) {
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(value.clone());
        }
    }

    /// Rewrite every value of one column through `f`.
    pub fn map_column<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: Fn(&Value) -> Value,
    {
        let idx = self
            .column_index(name)
            .ok_or_else(|| SyncError::MalformedReport(format!("missing column `{name}`")))?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        Ok(())
    }

    /// Visit every row with a mutable view of its values. The arity cannot
    /// change through this; only cell values can.
    pub fn for_each_row_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&[String], &mut [Value]),
    {
        for row in &mut self.rows {
            f(&self.columns, row);
        }
    }

    /// Infer each column's scalar type from its non-null values. An all-null
    /// column degrades to text; a mix of ints and floats widens to float; any
    /// other mix degrades to text.
    pub fn column_types(&self) -> Vec<ColumnType> {
        (0..self.columns.len())
            .map(|idx| {
                let mut inferred: Option<ColumnType> = None;
                for row in &self.rows {
                    let ty = match &row[idx] {
                        Value::Null => continue,
                        Value::Bool(_) => ColumnType::Bool,
                        Value::Int(_) => ColumnType::Int,
                        Value::Float(_) => ColumnType::Float,
                        Value::Text(_) => ColumnType::Text,
                        Value::Timestamp(_) => ColumnType::Timestamp,
                    };
                    inferred = Some(match inferred {
                        None => ty,
                        Some(prev) if prev == ty => prev,
                        Some(ColumnType::Int) if ty == ColumnType::Float => ColumnType::Float,
                        Some(ColumnType::Float) if ty == ColumnType::Int => ColumnType::Float,
                        Some(_) => ColumnType::Text,
                    });
                }
                inferred.unwrap_or(ColumnType::Text)
            })
            .collect()
    }
}
