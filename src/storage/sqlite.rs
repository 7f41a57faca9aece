//! SQLite-backed implementation of the warm-history store
//!
//! The store is shared across the whole worker pool, so the connection
//! lives behind a mutex and every method takes `&self`. Writes are
//! single-statement upserts, which keeps `warmed_count` increments atomic
//! under concurrent workers.

use crate::storage::schema::initialize_schema;
use crate::storage::{SitemapRow, WarmStats, WarmedRow};
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Predicate shared by the failure counter and the failed-URL listing:
/// an error was recorded, the status is 4xx/5xx, or no response arrived.
const FAILED_PREDICATE: &str = "last_error IS NOT NULL OR last_status >= 400 OR last_status = 0";

/// Warm-history store backed by a single-file SQLite database
pub struct WarmStore {
    conn: Mutex<Connection>,
}

impl WarmStore {
    /// Opens (creating if necessary) the database at `path`
    ///
    /// The parent directory is created when missing, WAL journaling is
    /// enabled, and the schema is initialized.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the last cache flush time, if one has been recorded
    ///
    /// A stored value that fails to parse is treated as absent.
    pub fn get_last_flush(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock();
        let value: Option<String> = conn
            .query_row(
                "SELECT v FROM meta WHERE k = 'last_flush_utc'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|t| t.with_timezone(&Utc)))
    }

    /// Records a cache flush at the current time with an optional reason
    pub fn mark_flush(&self, reason: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock();

        conn.execute(
            "INSERT INTO meta (k, v) VALUES ('last_flush_utc', ?1)
             ON CONFLICT(k) DO UPDATE SET v = excluded.v",
            params![now],
        )?;
        if !reason.is_empty() {
            conn.execute(
                "INSERT INTO meta (k, v) VALUES ('last_flush_reason', ?1)
                 ON CONFLICT(k) DO UPDATE SET v = excluded.v",
                params![reason],
            )?;
        }
        Ok(())
    }

    /// Decides whether `url` is due for warming
    ///
    /// True when the URL has never been warmed, when its last warm predates
    /// the most recent flush, or when the last warm is older than
    /// `rewarm_after`. An unparseable stored timestamp also means true.
    pub fn should_warm(&self, url: &str, rewarm_after: Duration) -> Result<bool> {
        let last_flush = self.get_last_flush()?;

        let conn = self.lock();
        let stored: Option<String> = conn
            .query_row(
                "SELECT last_warmed_utc FROM warmed_url WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;

        let Some(stored) = stored else {
            return Ok(true);
        };
        let Ok(parsed) = DateTime::parse_from_rfc3339(&stored) else {
            return Ok(true);
        };
        let last_warmed = parsed.with_timezone(&Utc);

        if let Some(flush) = last_flush {
            if last_warmed < flush {
                return Ok(true);
            }
        }

        Ok(Utc::now() - last_warmed >= rewarm_after)
    }

    /// Records a warm outcome for `url`
    ///
    /// Inserts with `warmed_count = 1` on first sight, otherwise increments.
    /// An empty `error` is stored as NULL so the success/failure predicates
    /// stay simple SQL.
    pub fn mark_warmed(&self, url: &str, status: u16, error: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let error = (!error.is_empty()).then_some(error);

        let conn = self.lock();
        conn.execute(
            "INSERT INTO warmed_url (url, last_warmed_utc, last_status, last_error, warmed_count)
             VALUES (?1, ?2, ?3, ?4, 1)
             ON CONFLICT(url) DO UPDATE SET
                 last_warmed_utc = excluded.last_warmed_utc,
                 last_status = excluded.last_status,
                 last_error = excluded.last_error,
                 warmed_count = warmed_count + 1",
            params![url, now, status, error],
        )?;
        Ok(())
    }

    /// Records a sitemap fetch outcome; empty `error` means success
    pub fn mark_sitemap(&self, sitemap_url: &str, error: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let error = (!error.is_empty()).then_some(error);

        let conn = self.lock();
        conn.execute(
            "INSERT INTO sitemap_seen (sitemap_url, last_fetched_utc, last_error)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(sitemap_url) DO UPDATE SET
                 last_fetched_utc = excluded.last_fetched_utc,
                 last_error = excluded.last_error",
            params![sitemap_url, now, error],
        )?;
        Ok(())
    }

    /// Aggregate counters for dashboards and run summaries
    pub fn stats(&self) -> Result<WarmStats> {
        let last_flush = self.get_last_flush()?;

        let conn = self.lock();
        let warmed_total: u64 =
            conn.query_row("SELECT COUNT(*) FROM warmed_url", [], |row| row.get(0))?;
        let ok_total: u64 = conn.query_row(
            "SELECT COUNT(*) FROM warmed_url
             WHERE last_error IS NULL AND last_status BETWEEN 200 AND 399",
            [],
            |row| row.get(0),
        )?;
        let err_total: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM warmed_url WHERE {}", FAILED_PREDICATE),
            [],
            |row| row.get(0),
        )?;

        Ok(WarmStats {
            warmed_total,
            ok_total,
            err_total,
            last_flush_utc: last_flush.map(|t| t.to_rfc3339()),
        })
    }

    /// Most recently warmed URLs, newest first
    pub fn recent_warmed(&self, limit: u32) -> Result<Vec<WarmedRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT url, last_warmed_utc, last_status, last_error, warmed_count
             FROM warmed_url ORDER BY last_warmed_utc DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(WarmedRow {
                    url: row.get(0)?,
                    last_warmed_utc: row.get(1)?,
                    last_status: row.get(2)?,
                    last_error: row.get(3)?,
                    warmed_count: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recently failed URLs, newest first
    pub fn failed(&self, limit: u32) -> Result<Vec<WarmedRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT url, last_warmed_utc, last_status, last_error, warmed_count
             FROM warmed_url WHERE {}
             ORDER BY last_warmed_utc DESC LIMIT ?1",
            FAILED_PREDICATE
        ))?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(WarmedRow {
                    url: row.get(0)?,
                    last_warmed_utc: row.get(1)?,
                    last_status: row.get(2)?,
                    last_error: row.get(3)?,
                    warmed_count: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Fetch log for every sitemap seen, newest first
    pub fn sitemap_status(&self) -> Result<Vec<SitemapRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT sitemap_url, last_fetched_utc, last_error
             FROM sitemap_seen ORDER BY last_fetched_utc DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SitemapRow {
                    sitemap_url: row.get(0)?,
                    last_fetched_utc: row.get(1)?,
                    last_error: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_warm_unknown_url() {
        let store = WarmStore::open_in_memory().unwrap();
        assert!(store
            .should_warm("https://x/a", Duration::hours(24))
            .unwrap());
    }

    #[test]
    fn test_should_not_rewarm_fresh_url() {
        let store = WarmStore::open_in_memory().unwrap();
        store.mark_warmed("https://x/a", 200, "").unwrap();
        assert!(!store
            .should_warm("https://x/a", Duration::hours(24))
            .unwrap());
    }

    #[test]
    fn test_zero_interval_always_rewarms() {
        let store = WarmStore::open_in_memory().unwrap();
        store.mark_warmed("https://x/a", 200, "").unwrap();
        assert!(store
            .should_warm("https://x/a", Duration::zero())
            .unwrap());
    }

    #[test]
    fn test_flush_forces_rewarm() {
        let store = WarmStore::open_in_memory().unwrap();
        store.mark_warmed("https://x/a", 200, "").unwrap();
        store.mark_flush("deploy").unwrap();
        assert!(store
            .should_warm("https://x/a", Duration::hours(24))
            .unwrap());
    }

    #[test]
    fn test_warm_after_flush_is_fresh_again() {
        let store = WarmStore::open_in_memory().unwrap();
        store.mark_flush("deploy").unwrap();
        store.mark_warmed("https://x/a", 200, "").unwrap();
        assert!(!store
            .should_warm("https://x/a", Duration::hours(24))
            .unwrap());
    }

    #[test]
    fn test_unparseable_timestamp_means_warm() {
        let store = WarmStore::open_in_memory().unwrap();
        store.mark_warmed("https://x/a", 200, "").unwrap();
        {
            let conn = store.lock();
            conn.execute(
                "UPDATE warmed_url SET last_warmed_utc = 'not-a-timestamp' WHERE url = ?1",
                params!["https://x/a"],
            )
            .unwrap();
        }
        assert!(store
            .should_warm("https://x/a", Duration::hours(24))
            .unwrap());
    }

    #[test]
    fn test_warmed_count_increments() {
        let store = WarmStore::open_in_memory().unwrap();
        store.mark_warmed("https://x/a", 200, "").unwrap();
        store.mark_warmed("https://x/a", 503, "HTTP 503").unwrap();
        store.mark_warmed("https://x/a", 200, "").unwrap();

        let rows = store.recent_warmed(10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].warmed_count, 3);
        assert_eq!(rows[0].last_status, 200);
        assert!(rows[0].is_ok());
    }

    #[test]
    fn test_stats_classifies_outcomes() {
        let store = WarmStore::open_in_memory().unwrap();
        store.mark_warmed("https://x/ok", 200, "").unwrap();
        store.mark_warmed("https://x/redirect", 301, "").unwrap();
        store.mark_warmed("https://x/missing", 404, "HTTP 404").unwrap();
        store.mark_warmed("https://x/dead", 0, "connection refused").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.warmed_total, 4);
        assert_eq!(stats.ok_total, 2);
        assert_eq!(stats.err_total, 2);
        assert!(stats.last_flush_utc.is_none());
    }

    #[test]
    fn test_failed_listing_excludes_successes() {
        let store = WarmStore::open_in_memory().unwrap();
        store.mark_warmed("https://x/ok", 200, "").unwrap();
        store.mark_warmed("https://x/missing", 404, "HTTP 404").unwrap();

        let failed = store.failed(10).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].url, "https://x/missing");
        assert_eq!(failed[0].last_status, 404);
        assert!(!failed[0].is_ok());
    }

    #[test]
    fn test_mark_flush_records_reason_and_time() {
        let store = WarmStore::open_in_memory().unwrap();
        assert!(store.get_last_flush().unwrap().is_none());

        store.mark_flush("manual flush").unwrap();
        let flushed = store.get_last_flush().unwrap().unwrap();
        assert!(Utc::now() - flushed < Duration::seconds(5));

        let stats = store.stats().unwrap();
        assert!(stats.last_flush_utc.is_some());
    }

    #[test]
    fn test_sitemap_status_tracks_errors() {
        let store = WarmStore::open_in_memory().unwrap();
        store.mark_sitemap("https://x/sitemap.xml", "").unwrap();
        store
            .mark_sitemap("https://x/broken.xml", "HTTP 500")
            .unwrap();

        let rows = store.sitemap_status().unwrap();
        assert_eq!(rows.len(), 2);

        let ok = rows
            .iter()
            .find(|r| r.sitemap_url == "https://x/sitemap.xml")
            .unwrap();
        assert!(ok.is_ok());

        let broken = rows
            .iter()
            .find(|r| r.sitemap_url == "https://x/broken.xml")
            .unwrap();
        assert_eq!(broken.last_error.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn test_sitemap_upsert_overwrites_error() {
        let store = WarmStore::open_in_memory().unwrap();
        store
            .mark_sitemap("https://x/sitemap.xml", "timeout")
            .unwrap();
        store.mark_sitemap("https://x/sitemap.xml", "").unwrap();

        let rows = store.sitemap_status().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_ok());
    }
}
