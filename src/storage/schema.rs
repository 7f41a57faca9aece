//! Database schema definitions
//!
//! All SQL schema for the warmer database lives here.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per distinct URL ever warmed
CREATE TABLE IF NOT EXISTS warmed_url (
    url TEXT PRIMARY KEY,
    last_warmed_utc TEXT NOT NULL,
    last_status INTEGER NOT NULL,
    last_error TEXT,
    warmed_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_warmed_url_warmed_at ON warmed_url(last_warmed_utc);

-- One row per sitemap URL fetched
CREATE TABLE IF NOT EXISTS sitemap_seen (
    sitemap_url TEXT PRIMARY KEY,
    last_fetched_utc TEXT NOT NULL,
    last_error TEXT
);

-- Global key/value metadata (last_flush_utc, last_flush_reason)
CREATE TABLE IF NOT EXISTS meta (
    k TEXT PRIMARY KEY,
    v TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// Idempotent: every statement is `CREATE ... IF NOT EXISTS`.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["warmed_url", "sitemap_seen", "meta"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
