//! Error taxonomy for the persistence core.
//!
//! # Responsibility
//! - Give callers one error kind (`DataAccessError`) for every operation failure.
//! - Keep first-build configuration failures distinguishable (`ConfigurationError`).
//!
//! # Invariants
//! - Engine failures keep the original `rusqlite::Error` as their source.
//! - A missing row on lookup is `Ok(None)`, never an error.

use crate::session::UnitState;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration loading and provider bootstrap.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Result type for every data-access operation.
pub type DataAccessResult<T> = Result<T, DataAccessError>;

/// Failures while building the session factory.
///
/// These are fatal for the provider: nothing can be served until the
/// configuration is fixed and the provider is rebuilt.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Configuration file could not be read.
    #[error("failed to read configuration `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Configuration file is not valid JSON for [`crate::ProviderConfig`].
    #[error("failed to parse configuration `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Configuration parsed but describes an unusable setup.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Bootstrap connection or schema script failed.
    #[error("schema bootstrap failed: {source}")]
    Schema {
        #[source]
        source: rusqlite::Error,
    },
    /// Database was written by a newer schema than this configuration knows.
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

/// Uniform failure of a data-access operation.
#[derive(Debug, Error)]
pub enum DataAccessError {
    /// Provider could not be built.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Underlying engine rejected the operation.
    #[error("{operation} on `{entity}` failed: {source}")]
    Engine {
        operation: &'static str,
        entity: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    /// Unit of work used outside the state the call requires.
    #[error("unit of work {unit_id} is {actual:?}, expected {expected}")]
    InvalidState {
        unit_id: String,
        expected: &'static str,
        actual: UnitState,
    },
    /// Update targeted a row that does not exist.
    #[error("{entity} not found: {key}")]
    RowNotFound { entity: &'static str, key: String },
    /// Row operation needs a primary key the entity does not carry yet.
    #[error("{entity} has no primary key value")]
    MissingIdentity { entity: &'static str },
    /// Criteria referenced a field the entity descriptor does not map.
    #[error("{entity} has no mapped field `{field}`")]
    UnknownField { entity: &'static str, field: String },
    /// Descriptor carries a table/column name that is not a plain identifier.
    #[error("`{0}` is not a valid SQL identifier")]
    InvalidIdentifier(String),
    /// Session factory was shut down.
    #[error("session factory is closed")]
    FactoryClosed,
}

impl DataAccessError {
    pub(crate) fn engine(
        operation: &'static str,
        entity: &'static str,
        source: rusqlite::Error,
    ) -> Self {
        Self::Engine {
            operation,
            entity,
            source,
        }
    }

    /// Short stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Engine { .. } => "engine",
            Self::InvalidState { .. } => "invalid_state",
            Self::RowNotFound { .. } => "row_not_found",
            Self::MissingIdentity { .. } => "missing_identity",
            Self::UnknownField { .. } => "unknown_field",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::FactoryClosed => "factory_closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigurationError, DataAccessError};
    use std::error::Error;

    #[test]
    fn engine_error_keeps_original_cause() {
        let err = DataAccessError::engine(
            "save",
            "person",
            rusqlite::Error::InvalidColumnName("nope".to_string()),
        );
        assert_eq!(err.code(), "engine");
        assert!(err.source().is_some());
        assert!(err.to_string().contains("save on `person` failed"));
    }

    #[test]
    fn configuration_error_converts_transparently() {
        let err: DataAccessError = ConfigurationError::Invalid("bad".to_string()).into();
        assert_eq!(err.code(), "configuration");
        assert_eq!(err.to_string(), "invalid configuration: bad");
    }
}
