//! Entity contract consumed by the generic DAO.
//!
//! # Responsibility
//! - Describe how a caller-defined record maps onto one table.
//! - Convert records to bind values and rows back to records.
//!
//! # Invariants
//! - Table and column names are plain SQL identifiers.
//! - `column_values()` returns values in `EntityDescriptor::columns` order.

use crate::db::dialect::{ColumnType, Dialect};
use crate::error::{DataAccessError, DataAccessResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::Row;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// How an entity obtains its primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Engine assigns an integer key on insert when none is set.
    Generated,
    /// Caller always supplies the key.
    Assigned,
}

/// Mapping of one entity field to a storage column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub field: &'static str,
    pub column: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl ColumnDef {
    pub const fn new(field: &'static str, column: &'static str, column_type: ColumnType) -> Self {
        Self {
            field,
            column,
            column_type,
            nullable: true,
        }
    }

    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Static mapping metadata for one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Name used in logs and errors.
    pub name: &'static str,
    pub table: &'static str,
    pub primary_key: ColumnDef,
    pub key_strategy: KeyStrategy,
    /// Non-key columns.
    pub columns: &'static [ColumnDef],
}

impl EntityDescriptor {
    /// Resolves a field name (or a column name) to its column.
    pub fn column_for(&self, field: &str) -> DataAccessResult<&'static str> {
        std::iter::once(&self.primary_key)
            .chain(self.columns.iter())
            .find(|def| def.field == field || def.column == field)
            .map(|def| def.column)
            .ok_or_else(|| DataAccessError::UnknownField {
                entity: self.name,
                field: field.to_string(),
            })
    }

    /// Checks every table/column name before it is placed into SQL.
    pub fn validate(&self) -> DataAccessResult<()> {
        check_identifier(self.table)?;
        check_identifier(self.primary_key.column)?;
        for def in self.columns {
            check_identifier(def.column)?;
        }
        Ok(())
    }

    /// Comma-separated list of all columns, primary key first.
    pub fn select_list(&self) -> String {
        std::iter::once(self.primary_key.column)
            .chain(self.columns.iter().map(|def| def.column))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this entity.
    pub fn create_table_sql(&self, dialect: &Dialect) -> String {
        let key_type = dialect.sql_type(self.primary_key.column_type);
        // SQLite accepts NULL in non-rowid primary keys unless told otherwise.
        let key_clause = match self.key_strategy {
            KeyStrategy::Generated => "PRIMARY KEY",
            KeyStrategy::Assigned => "PRIMARY KEY NOT NULL",
        };
        let mut columns = vec![format!(
            "{} {} {}",
            self.primary_key.column, key_type, key_clause
        )];
        for def in self.columns {
            let null_clause = if def.nullable { "" } else { " NOT NULL" };
            columns.push(format!(
                "{} {}{}",
                def.column,
                dialect.sql_type(def.column_type),
                null_clause
            ));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            self.table,
            columns.join(",\n    ")
        )
    }
}

/// Returns an error unless `name` is a plain SQL identifier.
pub fn check_identifier(name: &str) -> DataAccessResult<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(DataAccessError::InvalidIdentifier(name.to_string()))
    }
}

/// Record type persisted by [`crate::GenericDao`].
pub trait Entity: Sized {
    /// Mapping metadata, shared by every instance.
    fn descriptor() -> &'static EntityDescriptor;

    /// Primary key value, `None` while the record has no identity yet.
    fn primary_key(&self) -> Option<Value>;

    /// Non-key column values, in `descriptor().columns` order.
    fn column_values(&self) -> Vec<Value>;

    /// Builds a record from a row selected with `descriptor().select_list()`.
    ///
    /// Read columns by name so raw queries with a different column order map too.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Stores the key the engine generated on insert.
    fn assign_generated_key(&mut self, _key: i64) {}
}

#[cfg(test)]
mod tests {
    use super::{check_identifier, ColumnDef, EntityDescriptor, KeyStrategy};
    use crate::db::dialect::{ColumnType, Dialect};
    use crate::error::DataAccessError;

    const DESCRIPTOR: EntityDescriptor = EntityDescriptor {
        name: "note",
        table: "notes",
        primary_key: ColumnDef::new("id", "note_id", ColumnType::Integer),
        key_strategy: KeyStrategy::Generated,
        columns: &[
            ColumnDef::new("title", "title", ColumnType::Text).not_null(),
            ColumnDef::new("body", "body_text", ColumnType::LongVarChar),
        ],
    };

    #[test]
    fn column_for_resolves_fields_and_columns() {
        assert_eq!(DESCRIPTOR.column_for("id").unwrap(), "note_id");
        assert_eq!(DESCRIPTOR.column_for("body").unwrap(), "body_text");
        assert_eq!(DESCRIPTOR.column_for("body_text").unwrap(), "body_text");
        assert!(matches!(
            DESCRIPTOR.column_for("missing"),
            Err(DataAccessError::UnknownField { entity: "note", .. })
        ));
    }

    #[test]
    fn create_table_sql_uses_dialect_types() {
        let sql = DESCRIPTOR.create_table_sql(&Dialect::default());
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS notes"));
        assert!(sql.contains("note_id INTEGER PRIMARY KEY,"));
        assert!(sql.contains("title TEXT NOT NULL"));
        assert!(sql.contains("body_text TEXT"));
    }

    #[test]
    fn identifiers_reject_sql_fragments() {
        assert!(check_identifier("people_2").is_ok());
        assert!(check_identifier("people; DROP TABLE x").is_err());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("2people").is_err());
    }
}
