//! Error types shared across the sync job.
//!
//! The execution layer classifies SQL failures so the missing-table recovery
//! branch is an ordinary match arm: `SchemaMissing` is recognized from the
//! Postgres `undefined_table` code, everything else surfaces as `Execution`.

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Postgres SQLSTATE for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Unresolvable connection parameters or credentials. Fatal to the run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The destination table does not exist. Triggers the create-or-append
    /// recovery path instead of failing the call.
    #[error("destination table `{table}` does not exist")]
    SchemaMissing { table: String },

    /// Any SQL execution failure other than a missing table.
    #[error("execution error: {0}")]
    Execution(#[source] sqlx::Error),

    /// Non-success response from the report API.
    #[error("report API returned status {status}: {body}")]
    RemoteApi { status: u16, body: String },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A report payload did not have the expected shape.
    #[error("malformed report payload: {0}")]
    MalformedReport(String),

    /// Two distinct column names reduce to the same bind parameter name.
    #[error("columns `{first}` and `{second}` both normalize to bind name `{normalized}`")]
    ColumnCollision {
        first: String,
        second: String,
        normalized: String,
    },

    /// A column name contains no alphanumeric characters at all.
    #[error("column `{0}` normalizes to an empty bind name")]
    EmptyColumnName(String),

    /// A row's value count does not match the table's column count.
    #[error("row has {got} values but the table has {expected} columns")]
    ArityMismatch { expected: usize, got: usize },

    /// A statement placeholder has no matching entry in the supplied params.
    #[error("no value supplied for placeholder `{0}`")]
    MissingParameter(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Classify a sqlx failure against `table`: missing-table conditions get
    /// their own variant so callers can branch without string matching.
    pub fn from_sqlx(err: sqlx::Error, table: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some(UNDEFINED_TABLE) {
                return SyncError::SchemaMissing {
                    table: table.to_string(),
                };
            }
        }
        SyncError::Execution(err)
    }

    /// Whether this error is the recognized missing-table condition.
    pub fn is_schema_missing(&self) -> bool {
        matches!(self, SyncError::SchemaMissing { .. })
    }
}
