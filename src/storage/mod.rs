//! Persistent warm-history store
//!
//! A single-file SQLite database tracks per-URL warm outcomes, per-sitemap
//! fetch results, and global metadata such as the last cache flush. The
//! store is the staleness oracle: [`WarmStore::should_warm`] combines the
//! per-URL last-warm timestamp, the global flush marker, and the configured
//! rewarm interval.

mod schema;
mod sqlite;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::WarmStore;

/// Aggregate counters for the status dashboard and run summaries
#[derive(Debug, Clone)]
pub struct WarmStats {
    /// Distinct URLs with at least one recorded outcome
    pub warmed_total: u64,

    /// URLs whose latest outcome was a success (2xx/3xx, no error)
    pub ok_total: u64,

    /// URLs whose latest outcome was a failure (error, 4xx/5xx, or no response)
    pub err_total: u64,

    /// RFC3339 timestamp of the most recent cache flush, if any
    pub last_flush_utc: Option<String>,
}

/// One row of the warmed-URL history, as shown in status listings
#[derive(Debug, Clone)]
pub struct WarmedRow {
    pub url: String,
    pub last_warmed_utc: String,
    pub last_status: u16,
    pub last_error: Option<String>,
    pub warmed_count: u64,
}

impl WarmedRow {
    /// Success means a 2xx/3xx status with no recorded error.
    pub fn is_ok(&self) -> bool {
        self.last_error.is_none() && (200..=399).contains(&self.last_status)
    }
}

/// One row of the sitemap fetch log
#[derive(Debug, Clone)]
pub struct SitemapRow {
    pub sitemap_url: String,
    pub last_fetched_utc: String,
    pub last_error: Option<String>,
}

impl SitemapRow {
    pub fn is_ok(&self) -> bool {
        self.last_error.is_none()
    }
}
