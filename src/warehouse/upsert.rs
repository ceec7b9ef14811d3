//! Batched idempotent persistence of a [`Table`].
//!
//! The engine builds one parameterized insert-or-update statement from the
//! table's columns, sanitizes the data, and executes it in contiguous chunks.
//! Each chunk commits in its own transaction: a failure at chunk k leaves
//! chunks 1..k-1 committed and reports the failure, so a mid-run failure is
//! best-effort, never silently complete. Duplicate keys inside a chunk are
//! delegated entirely to the destination's conflict resolution; rows are never
//! reordered or deduplicated here.
//!
//! When the destination table does not exist the engine falls back to a
//! schema-inferring create-or-append: the table is created from the data's
//! inferred column types plus the two audit columns, and the entire input is
//! appended with both audit timestamps set to the current time. That path is
//! a plain append; primary-key conflict semantics do not apply to it.

use std::time::{Duration, Instant};

use chrono::Utc;
use sqlx::postgres::PgArguments;
use sqlx::{Postgres, Transaction};
use tracing::{error, info, warn};

use crate::constants::warehouse::{BIND_PARAMETER_LIMIT, DEFAULT_BATCH_SIZE};
use crate::error::{Result, SyncError};
use crate::sanitize;
use crate::table::{ColumnType, Table, Value};
use crate::warehouse::{quote_ident, Warehouse};

/// What a completed upsert reports: the affected-row count of the final chunk
/// and wall-clock time spent in the execution loop (setup excluded).
#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertOutcome {
    pub rows_affected: u64,
    pub elapsed: Duration,
}

impl UpsertOutcome {
    pub fn rows_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.rows_affected as f64 / secs
        } else {
            0.0
        }
    }
}

/// Prepared statement shape for one destination table. The row-values section
/// varies with chunk size, so the statement is expanded per chunk.
#[derive(Debug, Clone)]
pub struct UpsertStatement {
    insert_prefix: String,
    conflict_clause: String,
    n_columns: usize,
}

impl UpsertStatement {
    /// Expand the statement for a chunk of `n_rows` rows, with sequential
    /// positional placeholders in row-major order.
    pub fn for_chunk(&self, n_rows: usize) -> String {
        let mut sql = String::with_capacity(
            self.insert_prefix.len() + self.conflict_clause.len() + n_rows * self.n_columns * 4,
        );
        sql.push_str(&self.insert_prefix);
        for row in 0..n_rows {
            if row > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for col in 0..self.n_columns {
                if col > 0 {
                    sql.push_str(", ");
                }
                sql.push('$');
                sql.push_str(&(row * self.n_columns + col + 1).to_string());
            }
            sql.push(')');
        }
        sql.push_str(&self.conflict_clause);
        sql
    }
}

/// Build the upsert statement shape for `table_name`.
///
/// The original column names are the destination identifiers; their
/// alphanumeric-only forms are validated here as the bind names (collisions
/// and empty names are rejected before any SQL is issued). With a primary key
/// the statement refreshes every non-key column on conflict and advances the
/// `record_updated` audit timestamp; without one it is a plain insert, since
/// the destination's conflict resolution needs a key to target.
pub fn build_upsert_statement(
    table_name: &str,
    columns: &[String],
    primary_key: Option<&str>,
) -> Result<UpsertStatement> {
    sanitize::normalize_columns(columns)?;

    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_prefix = format!(
        "INSERT INTO {} ({}) VALUES ",
        quote_ident(table_name),
        column_list
    );

    let conflict_clause = match primary_key {
        Some(pk) => {
            let updates = columns
                .iter()
                .filter(|c| c.as_str() != pk)
                .map(|c| {
                    let ident = quote_ident(c);
                    format!("{ident} = EXCLUDED.{ident}")
                })
                .chain(std::iter::once("\"record_updated\" = NOW()".to_string()))
                .collect::<Vec<_>>()
                .join(", ");
            format!(" ON CONFLICT ({}) DO UPDATE SET {}", quote_ident(pk), updates)
        }
        None => String::new(),
    };

    Ok(UpsertStatement {
        insert_prefix,
        conflict_clause,
        n_columns: columns.len(),
    })
}

/// Largest chunk that stays within both the requested batch size and the
/// destination's bind-parameter limit.
fn effective_chunk_size(batch_size: usize, n_columns: usize) -> usize {
    let requested = if batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        batch_size
    };
    requested.min(BIND_PARAMETER_LIMIT / n_columns.max(1)).max(1)
}

impl Warehouse {
    /// Upsert `data` into `table_name` with the default batch size.
    pub async fn upsert(
        &self,
        table_name: &str,
        data: &Table,
        primary_key: Option<&str>,
    ) -> Result<UpsertOutcome> {
        self.upsert_batched(table_name, data, primary_key, DEFAULT_BATCH_SIZE)
            .await
    }

    /// Upsert `data` into `table_name` in chunks of at most `batch_size` rows,
    /// preserving row order within and across chunks.
    pub async fn upsert_batched(
        &self,
        table_name: &str,
        data: &Table,
        primary_key: Option<&str>,
        batch_size: usize,
    ) -> Result<UpsertOutcome> {
        // Empty input is a no-op: no statement, no DDL, zero outcome.
        if data.is_empty() {
            return Ok(UpsertOutcome::default());
        }

        let statement = build_upsert_statement(table_name, data.columns(), primary_key)?;
        let cleaned = sanitize::clean(data)?;
        let types = cleaned.column_types();
        let chunk_size = effective_chunk_size(batch_size, cleaned.n_columns());

        let started = Instant::now();
        let mut rows_affected = 0u64;

        for chunk in cleaned.rows().chunks(chunk_size) {
            let sql = statement.for_chunk(chunk.len());
            let mut tx = self
                .pool()
                .begin()
                .await
                .map_err(|e| SyncError::from_sqlx(e, table_name))?;

            match execute_chunk(&mut tx, &sql, chunk, &types).await {
                Ok(affected) => {
                    tx.commit()
                        .await
                        .map_err(|e| SyncError::from_sqlx(e, table_name))?;
                    rows_affected = affected;
                }
                Err(e) => {
                    let classified = SyncError::from_sqlx(e, table_name);
                    drop(tx);
                    if classified.is_schema_missing() {
                        warn!(table = table_name, "destination table missing, creating it");
                        return self.create_and_append(table_name, data, batch_size, started).await;
                    }
                    error!(table = table_name, error = %classified, "upsert chunk failed");
                    return Err(classified);
                }
            }
        }

        let outcome = UpsertOutcome {
            rows_affected,
            elapsed: started.elapsed(),
        };
        info!(
            table = table_name,
            rows = data.n_rows(),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            rows_per_sec = outcome.rows_per_sec() as u64,
            "upsert complete"
        );
        Ok(outcome)
    }

    /// Missing-table recovery: create the destination from the data's inferred
    /// shape and append everything. The original, unsanitized table is written
    /// with `record_inserted` and `record_updated` both set to the current
    /// time; the whole append commits as one transaction.
    async fn create_and_append(
        &self,
        table_name: &str,
        data: &Table,
        batch_size: usize,
        started: Instant,
    ) -> Result<UpsertOutcome> {
        let now = Utc::now().naive_utc();
        let mut amended = data.clone();
        amended.add_constant_column("record_inserted", Value::Timestamp(now));
        amended.add_constant_column("record_updated", Value::Timestamp(now));

        let types = amended.column_types();
        let ddl = build_create_table(table_name, amended.columns(), &types);
        sqlx::query(&ddl)
            .execute(self.pool())
            .await
            .map_err(|e| SyncError::from_sqlx(e, table_name))?;

        // Plain append, no conflict clause.
        let statement = build_upsert_statement(table_name, amended.columns(), None)?;
        let chunk_size = effective_chunk_size(batch_size, amended.n_columns());

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| SyncError::from_sqlx(e, table_name))?;
        let mut rows_affected = 0u64;
        for chunk in amended.rows().chunks(chunk_size) {
            let sql = statement.for_chunk(chunk.len());
            rows_affected += execute_chunk(&mut tx, &sql, chunk, &types)
                .await
                .map_err(|e| SyncError::from_sqlx(e, table_name))?;
        }
        tx.commit()
            .await
            .map_err(|e| SyncError::from_sqlx(e, table_name))?;

        let outcome = UpsertOutcome {
            rows_affected,
            elapsed: started.elapsed(),
        };
        info!(
            table = table_name,
            rows = outcome.rows_affected,
            "created table and appended all rows"
        );
        Ok(outcome)
    }
}

/// Execute one chunk's statement with its rows bound in order.
async fn execute_chunk(
    tx: &mut Transaction<'_, Postgres>,
    sql: &str,
    rows: &[Vec<Value>],
    types: &[ColumnType],
) -> std::result::Result<u64, sqlx::Error> {
    let mut query = sqlx::query(sql);
    for row in rows {
        for (value, ty) in row.iter().zip(types) {
            query = bind_typed(query, value, *ty);
        }
    }
    let result = query.execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

/// Bind a value under its column's inferred type so nulls carry the right
/// parameter type and mixed-type columns degrade to text consistently.
fn bind_typed<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: &'q Value,
    ty: ColumnType,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match (value, ty) {
        (Value::Null, ColumnType::Bool) => q.bind(Option::<bool>::None),
        (Value::Null, ColumnType::Int) => q.bind(Option::<i64>::None),
        (Value::Null, ColumnType::Float) => q.bind(Option::<f64>::None),
        (Value::Null, ColumnType::Timestamp) => q.bind(Option::<chrono::NaiveDateTime>::None),
        (Value::Null, ColumnType::Text) => q.bind(Option::<String>::None),
        (Value::Bool(b), ColumnType::Bool) => q.bind(*b),
        (Value::Int(i), ColumnType::Int) => q.bind(*i),
        (Value::Int(i), ColumnType::Float) => q.bind(*i as f64),
        (Value::Float(f), ColumnType::Float) => q.bind(*f),
        (Value::Timestamp(ts), ColumnType::Timestamp) => q.bind(*ts),
        (Value::Text(s), ColumnType::Text) => q.bind(s.as_str()),
        // Inference widens mixed columns to text, so whatever is left renders.
        (value, _) => q.bind(value.render()),
    }
}

/// DDL for the recovery path: inferred column types plus the audit columns,
/// which default to the insertion time for rows that do not supply them.
fn build_create_table(table_name: &str, columns: &[String], types: &[ColumnType]) -> String {
    let mut defs: Vec<String> = columns
        .iter()
        .zip(types)
        .map(|(name, ty)| {
            if name == "record_inserted" || name == "record_updated" {
                format!("{} TIMESTAMP NOT NULL DEFAULT NOW()", quote_ident(name))
            } else {
                format!("{} {}", quote_ident(name), ty.pg_type())
            }
        })
        .collect();
    if !columns.iter().any(|c| c == "record_inserted") {
        defs.push("\"record_inserted\" TIMESTAMP NOT NULL DEFAULT NOW()".to_string());
    }
    if !columns.iter().any(|c| c == "record_updated") {
        defs.push("\"record_updated\" TIMESTAMP NOT NULL DEFAULT NOW()".to_string());
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table_name),
        defs.join(", ")
    )
}
