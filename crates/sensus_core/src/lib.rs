//! Generic persistence layer over SQLite.
//!
//! Callers describe entities with [`EntityDescriptor`], then use
//! [`GenericDao`] for CRUD, criteria queries and pagination. Transactions are
//! per call by default, or shared across calls through a [`SessionController`].

pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod session;

pub use db::provider;
pub use db::{
    ColumnType, Dialect, ProviderConfig, SchemaScript, Session, SessionFactory,
    TransactionBehavior,
};
pub use error::{ConfigResult, ConfigurationError, DataAccessError, DataAccessResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{check_identifier, ColumnDef, Entity, EntityDescriptor, KeyStrategy};
pub use query::{BindValue, Criteria, MatchMode, PageWindow, Predicate, Sort, SortDirection};
pub use repo::GenericDao;
pub use rusqlite::types::Value;
pub use session::{run_in_transaction, SessionController, UnitOfWork, UnitState};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
