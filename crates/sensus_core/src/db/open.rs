//! Connection bootstrap for SQLite sessions.
//!
//! # Responsibility
//! - Open one physical connection for the configured database file.
//! - Configure connection pragmas required by core behavior.
//!
//! # Invariants
//! - Returned connections honour the configured `foreign_keys` setting.
//! - Returned connections carry the configured busy timeout.

use crate::db::config::ProviderConfig;
use log::error;
use rusqlite::Connection;
use std::time::Instant;

/// Opens and configures one connection.
///
/// # Side effects
/// - Emits a `db_open` error event with duration when the open fails.
pub(crate) fn open_connection(config: &ProviderConfig) -> rusqlite::Result<Connection> {
    let started_at = Instant::now();

    let result = Connection::open(&config.database_path)
        .and_then(|conn| configure_connection(&conn, config).map(|()| conn));

    if let Err(err) = &result {
        error!(
            "event=db_open module=db status=error duration_ms={} error_code=db_open_failed error={}",
            started_at.elapsed().as_millis(),
            err
        );
    }
    result
}

fn configure_connection(conn: &Connection, config: &ProviderConfig) -> rusqlite::Result<()> {
    let foreign_keys = if config.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys};"))?;
    conn.busy_timeout(config.busy_timeout())?;

    if let Some(mode) = &config.journal_mode {
        // journal_mode returns the resulting mode as a row.
        let _: String = conn.query_row(
            &format!("PRAGMA journal_mode = {};", mode.trim().to_ascii_lowercase()),
            [],
            |row| row.get(0),
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::open_connection;
    use crate::db::config::ProviderConfig;

    #[test]
    fn open_connection_applies_pragmas() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig::new(dir.path().join("open.db")).with_journal_mode("WAL");

        let conn = open_connection(&config).unwrap();
        let foreign_keys: i64 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap();
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .unwrap();

        assert_eq!(foreign_keys, 1);
        assert_eq!(journal_mode, "wal");
    }

    #[test]
    fn open_connection_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig::new(dir.path().join("missing/dir/open.db"));
        assert!(open_connection(&config).is_err());
    }
}
