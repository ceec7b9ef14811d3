//! Warehouse access: connection provider, query executor, batch upsert engine.

pub mod executor;
pub mod upsert;

pub use upsert::{build_upsert_statement, UpsertOutcome, UpsertStatement};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::WarehouseSettings;
use crate::constants;
use crate::error::{Result, SyncError};

/// Handle to the destination store. Owns a pool; connections are acquired per
/// logical unit of work and released on every path out of it.
#[derive(Debug, Clone)]
pub struct Warehouse {
    pool: PgPool,
}

impl Warehouse {
    /// Connect using settings resolved at process start.
    pub async fn connect(settings: &WarehouseSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(constants::warehouse::POOL_MAX_CONNECTIONS)
            .connect(&settings.database_url())
            .await
            .map_err(|e| SyncError::Configuration(format!("cannot connect to warehouse: {e}")))?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool. Used by tests.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Quote a destination identifier. Original column names, punctuation and
/// all, stay visible in the statement text; only bind names are normalized.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
