//! Provider configuration loaded from a JSON file.
//!
//! # Responsibility
//! - Describe how sessions reach the database and which schema scripts run.
//! - Resolve relative paths against the directory of the configuration file.
//!
//! # Invariants
//! - A validated configuration never points at a private `:memory:` database.
//! - Schema script versions are strictly increasing.

use crate::db::dialect::ColumnType;
use crate::error::{ConfigResult, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "SENSUS_PERSISTENCE_CONFIG";
/// Configuration file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_FILE: &str = "./sensus-persistence.json";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// How a unit of work opens its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionBehavior {
    /// `BEGIN DEFERRED`: locks are taken on first read/write.
    #[default]
    Deferred,
    /// `BEGIN IMMEDIATE`: write lock taken at begin.
    Immediate,
}

impl TransactionBehavior {
    pub(crate) fn begin_sql(self) -> &'static str {
        match self {
            Self::Deferred => "BEGIN DEFERRED;",
            Self::Immediate => "BEGIN IMMEDIATE;",
        }
    }
}

/// One versioned schema script, inline or stored next to the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaScript {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl SchemaScript {
    /// Returns the script text, reading `path` when no inline SQL is given.
    pub fn load_sql(&self) -> ConfigResult<String> {
        match (&self.sql, &self.path) {
            (Some(sql), None) => Ok(sql.clone()),
            (None, Some(path)) => {
                std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
                    path: path.clone(),
                    source,
                })
            }
            _ => Err(ConfigurationError::Invalid(format!(
                "schema script {} must set exactly one of `sql` or `path`",
                self.version
            ))),
        }
    }
}

/// Settings consumed by [`crate::SessionFactory`] at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub database_path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_foreign_keys")]
    pub foreign_keys: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_mode: Option<String>,
    #[serde(default)]
    pub transaction_behavior: TransactionBehavior,
    #[serde(default)]
    pub schema: Vec<SchemaScript>,
    #[serde(default)]
    pub column_type_overrides: BTreeMap<ColumnType, String>,
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_foreign_keys() -> bool {
    true
}

impl ProviderConfig {
    /// Creates a configuration for one database file with default settings.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: true,
            journal_mode: None,
            transaction_behavior: TransactionBehavior::Deferred,
            schema: Vec::new(),
            column_type_overrides: BTreeMap::new(),
        }
    }

    /// Appends an inline schema script.
    pub fn with_schema_sql(mut self, version: u32, sql: impl Into<String>) -> Self {
        self.schema.push(SchemaScript {
            version,
            sql: Some(sql.into()),
            path: None,
        });
        self
    }

    pub fn with_transaction_behavior(mut self, behavior: TransactionBehavior) -> Self {
        self.transaction_behavior = behavior;
        self
    }

    pub fn with_journal_mode(mut self, mode: impl Into<String>) -> Self {
        self.journal_mode = Some(mode.into());
        self
    }

    pub fn with_column_type_override(
        mut self,
        column_type: ColumnType,
        sql: impl Into<String>,
    ) -> Self {
        self.column_type_overrides.insert(column_type, sql.into());
        self
    }

    /// Loads and validates a configuration file.
    ///
    /// Relative `database_path` and script `path` values are resolved against
    /// the directory containing `path`.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self =
            serde_json::from_str(&text).map_err(|source| ConfigurationError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_relative_paths(base_dir);
        config.validate()?;
        Ok(config)
    }

    /// Returns the configuration file path from the environment or the default.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Latest schema version this configuration declares (0 when none).
    pub fn latest_schema_version(&self) -> u32 {
        self.schema.last().map_or(0, |script| script.version)
    }

    /// Checks invariants that cannot be expressed by the serde shape.
    pub fn validate(&self) -> ConfigResult<()> {
        let db_path = self.database_path.to_string_lossy();
        if db_path.trim().is_empty() {
            return Err(ConfigurationError::Invalid(
                "database_path cannot be empty".to_string(),
            ));
        }
        if db_path.trim() == ":memory:" {
            return Err(ConfigurationError::Invalid(
                "database_path `:memory:` cannot be shared across sessions".to_string(),
            ));
        }

        if let Some(mode) = &self.journal_mode {
            let normalized = mode.trim().to_ascii_lowercase();
            if !matches!(
                normalized.as_str(),
                "delete" | "truncate" | "persist" | "memory" | "wal" | "off"
            ) {
                return Err(ConfigurationError::Invalid(format!(
                    "unsupported journal_mode `{mode}`"
                )));
            }
        }

        let mut previous = 0;
        for script in &self.schema {
            if script.version <= previous {
                return Err(ConfigurationError::Invalid(format!(
                    "schema versions must be strictly increasing from 1, got {} after {}",
                    script.version, previous
                )));
            }
            previous = script.version;
        }

        Ok(())
    }

    fn resolve_relative_paths(&mut self, base_dir: &Path) {
        if self.database_path.is_relative() && self.database_path != Path::new(":memory:") {
            self.database_path = base_dir.join(&self.database_path);
        }
        for script in &mut self.schema {
            if let Some(path) = script.path.as_mut() {
                if path.is_relative() {
                    *path = base_dir.join(&*path);
                }
            }
        }
    }
}
