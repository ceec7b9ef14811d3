//! Thin wrapper around single-statement execution.
//!
//! Callers may write percent-style named placeholders (`%(name)s`); they are
//! rewritten to positional binds before execution. Statements execute exactly
//! once, with no implicit retry. Failures are logged here and surfaced as a
//! typed classification so the caller can branch on the missing-table
//! condition without inspecting driver error strings.

use sqlx::postgres::{PgQueryResult, PgRow};
use sqlx::{Column, Executor, Row, TypeInfo};
use tracing::{error, warn};

use crate::error::{Result, SyncError};
use crate::table::{Table, Value};
use crate::warehouse::Warehouse;

/// Rewrite `%(name)s` placeholders into positional `$n` binds.
///
/// Returns the rewritten SQL and the parameter names in bind order. A name
/// that appears more than once reuses its first position.
pub fn translate_placeholders(sql: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut rest = sql;

    while let Some(start) = rest.find("%(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find(")s") {
            Some(end) => {
                let name = &after[..end];
                let position = match names.iter().position(|n| n == name) {
                    Some(idx) => idx + 1,
                    None => {
                        names.push(name.to_string());
                        names.len()
                    }
                };
                out.push('$');
                out.push_str(&position.to_string());
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated placeholder; pass the remainder through untouched.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    (out, names)
}

impl Warehouse {
    /// Execute one parameterized statement. `params` supplies a value for
    /// every placeholder name appearing in `query`.
    pub async fn execute(
        &self,
        query: &str,
        params: &[(&str, Value)],
    ) -> Result<PgQueryResult> {
        let (sql, names) = translate_placeholders(query);

        let mut q = sqlx::query(&sql);
        for name in &names {
            let value = params
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .ok_or_else(|| SyncError::MissingParameter(name.clone()))?;
            q = bind_value(q, value);
        }

        q.execute(&self.pool).await.map_err(|e| {
            let classified = SyncError::from_sqlx(e, "");
            error!(query = %sql, error = %classified, "statement execution failed");
            classified
        })
    }

    /// Execute a query and materialize its result set into a [`Table`]. A
    /// zero-row result still carries the correct column names.
    pub async fn extract_data(&self, query: &str) -> Result<Table> {
        let (sql, _) = translate_placeholders(query);

        let rows: Vec<PgRow> = sqlx::query(&sql).fetch_all(&self.pool).await.map_err(|e| {
            let classified = SyncError::from_sqlx(e, "");
            error!(query = %sql, error = %classified, "query execution failed");
            classified
        })?;

        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => {
                // Empty result sets expose no row metadata; describe the
                // statement to recover the column names.
                let describe = self
                    .pool
                    .describe(&sql)
                    .await
                    .map_err(|e| SyncError::from_sqlx(e, ""))?;
                describe
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            }
        };

        let mut table = Table::new(columns);
        for row in &rows {
            let values = (0..row.columns().len()).map(|i| decode_cell(row, i)).collect();
            table.push_row(values)?;
        }
        Ok(table)
    }
}

/// Bind a value for ad-hoc statements where no column type is known.
fn bind_value<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        Value::Null => q.bind(Option::<String>::None),
        Value::Bool(b) => q.bind(*b),
        Value::Int(i) => q.bind(*i),
        Value::Float(f) => q.bind(*f),
        Value::Text(s) => q.bind(s.as_str()),
        Value::Timestamp(ts) => q.bind(*ts),
    }
}

/// Decode one cell into a [`Value`], falling back to text and then null for
/// types the table model does not carry.
fn decode_cell(row: &PgRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_info().name().to_string();
    match type_name.as_str() {
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)
            .map(|v| v.map_or(Value::Null, Value::Bool)),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)
            .map(|v| v.map_or(Value::Null, |i| Value::Int(i as i64))),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)
            .map(|v| v.map_or(Value::Null, |i| Value::Int(i as i64))),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)
            .map(|v| v.map_or(Value::Null, Value::Int)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)
            .map(|v| v.map_or(Value::Null, |f| Value::Float(f as f64))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)
            .map(|v| v.map_or(Value::Null, Value::Float)),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .map(|v| v.map_or(Value::Null, Value::Timestamp)),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .map(|v| v.map_or(Value::Null, |ts| Value::Timestamp(ts.naive_utc()))),
        _ => row
            .try_get::<Option<String>, _>(idx)
            .map(|v| v.map_or(Value::Null, Value::Text)),
    }
    .unwrap_or_else(|e| {
        warn!(column = idx, pg_type = %type_name, error = %e, "undecodable cell, storing null");
        Value::Null
    })
}
