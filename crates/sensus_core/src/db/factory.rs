//! Session factory: the source of every database connection.
//!
//! # Responsibility
//! - Build once from a [`ProviderConfig`], applying schema scripts up front.
//! - Hand out [`Session`]s bound to one physical connection each.
//! - Track how many sessions are currently open.
//!
//! # Invariants
//! - Build failures are `ConfigurationError`s; open failures are engine errors.
//! - Each session decrements the live count exactly once, however it ends.
//! - After [`SessionFactory::close`] no new session can be opened.

use crate::db::config::{ProviderConfig, TransactionBehavior};
use crate::db::dialect::Dialect;
use crate::db::migrations::apply_schema_scripts;
use crate::db::open::open_connection;
use crate::error::{ConfigurationError, DataAccessError, DataAccessResult};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Builds sessions for one configured database.
#[derive(Debug)]
pub struct SessionFactory {
    config: ProviderConfig,
    dialect: Dialect,
    schema_version: u32,
    live: Arc<AtomicUsize>,
    next_session_id: AtomicU64,
    closed: AtomicBool,
}

impl SessionFactory {
    /// Validates `config`, runs pending schema scripts and returns a ready factory.
    ///
    /// # Errors
    /// - `DataAccessError::Configuration` for any invalid setting, unreadable
    ///   script, failing script or incompatible schema version.
    pub fn build(config: ProviderConfig) -> DataAccessResult<Arc<Self>> {
        let started_at = Instant::now();
        info!("event=factory_build module=db status=start");

        match Self::bootstrap(&config) {
            Ok(schema_version) => {
                info!(
                    "event=factory_build module=db status=ok duration_ms={} schema_version={} database={}",
                    started_at.elapsed().as_millis(),
                    schema_version,
                    config.database_path.display()
                );
                let dialect = Dialect::new(config.column_type_overrides.clone());
                Ok(Arc::new(Self {
                    config,
                    dialect,
                    schema_version,
                    live: Arc::new(AtomicUsize::new(0)),
                    next_session_id: AtomicU64::new(1),
                    closed: AtomicBool::new(false),
                }))
            }
            Err(err) => {
                error!(
                    "event=factory_build module=db status=error duration_ms={} error_code=configuration error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Loads a JSON configuration file and builds a factory from it.
    pub fn from_config_file(path: impl AsRef<Path>) -> DataAccessResult<Arc<Self>> {
        let config = ProviderConfig::from_file(path)?;
        Self::build(config)
    }

    fn bootstrap(config: &ProviderConfig) -> Result<u32, ConfigurationError> {
        config.validate()?;
        let mut conn =
            open_connection(config).map_err(|source| ConfigurationError::Schema { source })?;
        let version = apply_schema_scripts(&mut conn, &config.schema)?;
        if let Err((_, err)) = conn.close() {
            warn!(
                "event=factory_build module=db status=warn error_code=bootstrap_close_failed error={err}"
            );
        }
        Ok(version)
    }

    /// Opens a new session bound to its own connection.
    pub fn open_session(&self) -> DataAccessResult<Session> {
        if self.is_closed() {
            return Err(DataAccessError::FactoryClosed);
        }

        let conn = open_connection(&self.config)
            .map_err(|source| DataAccessError::engine("open_session", "session", source))?;
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let live = self.live.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("event=session_open module=db status=ok session_id={id} live={live}");

        Ok(Session {
            id,
            conn: Some(conn),
            live: Arc::clone(&self.live),
        })
    }

    /// Closes `session`, logging instead of propagating close failures.
    pub fn close_session(&self, session: Session) {
        session.close();
    }

    /// Shuts the factory down. Repeated calls are no-ops.
    ///
    /// Sessions already handed out stay usable until they are closed.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let live = self.live_connections();
        if live > 0 {
            warn!("event=factory_close module=db status=warn live={live}");
        } else {
            info!("event=factory_close module=db status=ok");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of sessions opened by this factory and not yet closed.
    pub fn live_connections(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Schema version reached during build.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub(crate) fn transaction_behavior(&self) -> TransactionBehavior {
        self.config.transaction_behavior
    }
}

/// One open connection handed out by a [`SessionFactory`].
#[derive(Debug)]
pub struct Session {
    id: u64,
    conn: Option<Connection>,
    live: Arc<AtomicUsize>,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Underlying connection.
    pub fn connection(&self) -> &Connection {
        // Only `close`/`drop` take the connection, and both consume the session.
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("session {} used after close", self.id))
    }

    /// Closes the connection. Close failures are logged and swallowed.
    pub fn close(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if let Err((_, err)) = conn.close() {
            error!(
                "event=session_close module=db status=error session_id={} error_code=close_failed error={}",
                self.id, err
            );
        }
        let live = self.live.fetch_sub(1, Ordering::AcqRel) - 1;
        debug!(
            "event=session_close module=db status=ok session_id={} live={}",
            self.id, live
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close_inner();
    }
}
