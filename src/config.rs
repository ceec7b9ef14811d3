//! Environment-driven configuration.
//!
//! All settings are resolved once at process start and passed by value into
//! the components that need them; nothing reads the environment after startup.

use std::env;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::constants;
use crate::error::{Result, SyncError};

/// Warehouse connection settings: either an explicit URI, or assembled from
/// namespaced credential parameters.
#[derive(Debug, Clone)]
pub struct WarehouseSettings {
    /// Explicit connection URI; takes precedence over the parts below.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
}

impl WarehouseSettings {
    /// Load settings from environment variables with validation.
    ///
    /// `WAREHOUSE_DATABASE_URL` wins when set; otherwise
    /// `WAREHOUSE_DB_{HOST,PORT,DATABASE,USERNAME,PASSWORD}` are assembled
    /// into a URI, and host, database, and username must all resolve.
    pub fn from_env() -> Result<Self> {
        if let Ok(url) = env::var("WAREHOUSE_DATABASE_URL") {
            if url.trim().is_empty() {
                return Err(SyncError::Configuration(
                    "WAREHOUSE_DATABASE_URL cannot be empty".into(),
                ));
            }
            return Ok(Self {
                database_url: Some(url),
                host: String::new(),
                port: constants::warehouse::DEFAULT_PG_PORT,
                database: String::new(),
                username: String::new(),
                password: None,
            });
        }

        let port = match env::var("WAREHOUSE_DB_PORT") {
            Ok(s) => s.parse().map_err(|_| {
                SyncError::Configuration(format!("invalid WAREHOUSE_DB_PORT: {s}"))
            })?,
            Err(_) => constants::warehouse::DEFAULT_PG_PORT,
        };
        if port == 0 {
            return Err(SyncError::Configuration(
                "invalid port number: 0. Port must be between 1 and 65535".into(),
            ));
        }

        let host = required_env("WAREHOUSE_DB_HOST")?;
        let database = required_env("WAREHOUSE_DB_DATABASE")?;
        let username = required_env("WAREHOUSE_DB_USERNAME")?;

        Ok(Self {
            database_url: None,
            host,
            port,
            database,
            username,
            password: env::var("WAREHOUSE_DB_PASSWORD").ok(),
        })
    }

    /// Build the connection URL. Username and password are percent-encoded so
    /// credentials with special characters survive URI composition.
    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        let username = utf8_percent_encode(&self.username, NON_ALPHANUMERIC);
        match &self.password {
            Some(password) => format!(
                "postgres://{}:{}@{}:{}/{}",
                username,
                utf8_percent_encode(password, NON_ALPHANUMERIC),
                self.host,
                self.port,
                self.database
            ),
            None => format!(
                "postgres://{}@{}:{}/{}",
                username, self.host, self.port, self.database
            ),
        }
    }
}

/// Zoho Books API credentials and endpoints.
#[derive(Debug, Clone)]
pub struct ZohoSettings {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub organization_id: String,
    /// OAuth accounts endpoint; overridable for tests.
    pub accounts_url: String,
    /// Reports API base URL; overridable for tests.
    pub api_url: String,
}

impl ZohoSettings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: required_env("ZOHO_CLIENT_ID")?,
            client_secret: required_env("ZOHO_CLIENT_SECRET")?,
            refresh_token: required_env("ZOHO_REFRESH_TOKEN")?,
            organization_id: required_env("ZOHO_ORGANIZATION_ID")?,
            accounts_url: env::var("ZOHO_ACCOUNTS_URL")
                .unwrap_or_else(|_| constants::zoho::DEFAULT_ACCOUNTS_URL.to_string()),
            api_url: env::var("ZOHO_API_URL")
                .unwrap_or_else(|_| constants::zoho::DEFAULT_API_URL.to_string()),
        })
    }
}

fn required_env(key: &str) -> Result<String> {
    let value = env::var(key)
        .map_err(|_| SyncError::Configuration(format!("{key} is not set")))?;
    if value.trim().is_empty() {
        return Err(SyncError::Configuration(format!("{key} cannot be empty")));
    }
    Ok(value)
}
