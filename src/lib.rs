//! Zoho Books → Postgres warehouse sync.
//!
//! A scheduled batch job: authenticate against the Zoho Books API, pull each
//! accounting report page by page, flatten the payload into a table, and
//! upsert it into the warehouse in idempotent batches. The persistence layer
//! recovers from a missing destination table by creating one from the data's
//! inferred shape.

pub mod config;
pub mod constants;
pub mod error;
pub mod sanitize;
pub mod table;
pub mod textio;
pub mod warehouse;
pub mod zoho;

pub use error::{Result, SyncError};
pub use table::{ColumnType, Table, Value};
pub use warehouse::{UpsertOutcome, Warehouse};
