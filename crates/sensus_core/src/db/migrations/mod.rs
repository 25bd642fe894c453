//! Schema script runner.
//!
//! # Responsibility
//! - Apply configured schema scripts in ascending version order.
//! - Apply all pending scripts atomically.
//!
//! # Invariants
//! - Applied script version is mirrored to `PRAGMA user_version`.
//! - A database newer than the configuration is rejected, never downgraded.

use crate::db::config::SchemaScript;
use crate::error::{ConfigResult, ConfigurationError};
use log::info;
use rusqlite::Connection;

/// Applies every script newer than the database's `user_version`.
///
/// Returns the schema version after the run.
pub fn apply_schema_scripts(
    conn: &mut Connection,
    scripts: &[SchemaScript],
) -> ConfigResult<u32> {
    let current_version = current_user_version(conn)?;
    let latest = scripts.last().map_or(0, |script| script.version);

    if current_version > latest && !scripts.is_empty() {
        return Err(ConfigurationError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version >= latest {
        return Ok(current_version);
    }

    let pending = scripts
        .iter()
        .filter(|script| script.version > current_version)
        .map(|script| Ok((script.version, script.load_sql()?)))
        .collect::<ConfigResult<Vec<_>>>()?;

    let tx = conn.transaction().map_err(schema_error)?;
    for (version, sql) in &pending {
        tx.execute_batch(sql).map_err(schema_error)?;
        tx.execute_batch(&format!("PRAGMA user_version = {version};"))
            .map_err(schema_error)?;
    }
    tx.commit().map_err(schema_error)?;

    info!(
        "event=schema_apply module=db status=ok from_version={} to_version={} scripts={}",
        current_version,
        latest,
        pending.len()
    );
    Ok(latest)
}

/// Reads `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> ConfigResult<u32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))
        .map_err(schema_error)
}

fn schema_error(source: rusqlite::Error) -> ConfigurationError {
    ConfigurationError::Schema { source }
}

#[cfg(test)]
mod tests {
    use super::{apply_schema_scripts, current_user_version};
    use crate::db::config::ProviderConfig;
    use crate::error::ConfigurationError;
    use rusqlite::Connection;

    #[test]
    fn applies_pending_scripts_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        let config = ProviderConfig::new("unused.db")
            .with_schema_sql(1, "CREATE TABLE a (id INTEGER PRIMARY KEY);")
            .with_schema_sql(2, "CREATE TABLE b (id INTEGER PRIMARY KEY);");

        assert_eq!(apply_schema_scripts(&mut conn, &config.schema).unwrap(), 2);
        assert_eq!(apply_schema_scripts(&mut conn, &config.schema).unwrap(), 2);
        assert_eq!(current_user_version(&conn).unwrap(), 2);
    }

    #[test]
    fn failing_script_leaves_version_untouched() {
        let mut conn = Connection::open_in_memory().unwrap();
        let config = ProviderConfig::new("unused.db")
            .with_schema_sql(1, "CREATE TABLE a (id INTEGER PRIMARY KEY);")
            .with_schema_sql(2, "CREATE TABLE broken (");

        let err = apply_schema_scripts(&mut conn, &config.schema).unwrap_err();
        assert!(matches!(err, ConfigurationError::Schema { .. }));
        assert_eq!(current_user_version(&conn).unwrap(), 0);
    }

    #[test]
    fn newer_database_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 9;").unwrap();
        let config = ProviderConfig::new("unused.db").with_schema_sql(1, "SELECT 1;");

        let err = apply_schema_scripts(&mut conn, &config.schema).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::UnsupportedSchemaVersion {
                db_version: 9,
                latest_supported: 1
            }
        ));
    }
}
