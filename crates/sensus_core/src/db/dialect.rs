//! Column-type mapping used when generating table DDL.
//!
//! The engine's own SQL dialect is not modelled here. Only the small set of
//! column-type overrides callers rely on is kept stable: long character types
//! are stored as large-object text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Portable column type declared by entity descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    /// Long variable character data.
    LongVarChar,
    /// Long variable national character data.
    LongNVarChar,
    Blob,
    Boolean,
    /// Epoch milliseconds.
    Timestamp,
}

/// SQL type mapping with per-configuration overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dialect {
    overrides: BTreeMap<ColumnType, String>,
}

impl Dialect {
    pub fn new(overrides: BTreeMap<ColumnType, String>) -> Self {
        Self { overrides }
    }

    /// Returns the SQL type name used in `CREATE TABLE` for `column_type`.
    pub fn sql_type(&self, column_type: ColumnType) -> &str {
        if let Some(sql) = self.overrides.get(&column_type) {
            return sql.as_str();
        }
        match column_type {
            ColumnType::Integer | ColumnType::Boolean | ColumnType::Timestamp => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::LongVarChar | ColumnType::LongNVarChar => "TEXT",
            ColumnType::Blob => "BLOB",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnType, Dialect};
    use std::collections::BTreeMap;

    #[test]
    fn long_character_types_map_to_large_text() {
        let dialect = Dialect::default();
        assert_eq!(dialect.sql_type(ColumnType::LongVarChar), "TEXT");
        assert_eq!(dialect.sql_type(ColumnType::LongNVarChar), "TEXT");
        assert_eq!(dialect.sql_type(ColumnType::Boolean), "INTEGER");
    }

    #[test]
    fn configured_override_wins() {
        let mut overrides = BTreeMap::new();
        overrides.insert(ColumnType::LongVarChar, "CLOB".to_string());
        let dialect = Dialect::new(overrides);
        assert_eq!(dialect.sql_type(ColumnType::LongVarChar), "CLOB");
        assert_eq!(dialect.sql_type(ColumnType::LongNVarChar), "TEXT");
    }
}
