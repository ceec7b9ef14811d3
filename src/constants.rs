//! Application-wide constants and configuration values.

/// Report API constants
pub mod zoho {
    /// Hard cap on pagination fetches per report, a safety valve against
    /// runaway loops when the API keeps reporting more pages.
    pub const MAX_REPORT_PAGES: u32 = 200;

    /// Page size requested for the aging reports.
    pub const AGING_PER_PAGE: u32 = 500;

    /// Default OAuth accounts endpoint.
    pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.zoho.in";

    /// Default reports API base URL.
    pub const DEFAULT_API_URL: &str = "https://www.zohoapis.in";

    /// HTTP timeout for report requests in seconds.
    pub const HTTP_TIMEOUT_SECS: u64 = 60;
}

/// Warehouse connection constants
pub mod warehouse {
    /// Default Postgres port.
    pub const DEFAULT_PG_PORT: u16 = 5432;

    /// Maximum pool size for warehouse connections.
    pub const POOL_MAX_CONNECTIONS: u32 = 5;

    /// Default number of rows bound per upsert statement.
    pub const DEFAULT_BATCH_SIZE: usize = 1000;

    /// Postgres limit on bind parameters per statement. Chunks are clamped so
    /// `rows * columns` never exceeds this.
    pub const BIND_PARAMETER_LIMIT: usize = 65535;
}
