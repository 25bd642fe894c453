//! SQL text and bind values for criteria-driven queries.
//!
//! Field names are resolved through the entity descriptor, so only mapped
//! identifiers ever reach the SQL text; all values are bound.

use crate::error::DataAccessResult;
use crate::model::entity::EntityDescriptor;
use crate::query::criteria::{Criteria, Predicate};
use rusqlite::types::Value;

/// Offset/limit pair for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: u32,
    pub max_rows: u32,
}

/// Rendered statement plus positional bind values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub sql: String,
    pub binds: Vec<Value>,
}

/// `SELECT` of all mapped columns filtered, ordered and optionally paged.
///
/// Ordering always ends with the primary key so pages are stable.
pub(crate) fn select(
    descriptor: &EntityDescriptor,
    criteria: &Criteria,
    window: Option<PageWindow>,
) -> DataAccessResult<Statement> {
    let mut binds = Vec::new();
    let mut sql = format!(
        "SELECT {} FROM {}",
        descriptor.select_list(),
        descriptor.table
    );
    push_where(&mut sql, &mut binds, descriptor, criteria.predicates())?;
    push_order(&mut sql, descriptor, criteria)?;

    if let Some(window) = window {
        sql.push_str(" LIMIT ? OFFSET ?");
        binds.push(Value::Integer(i64::from(window.max_rows)));
        binds.push(Value::Integer(i64::from(window.start)));
    }

    Ok(Statement { sql, binds })
}

/// `SELECT COUNT(*)` over the filtered rows. Sorts do not affect a count.
pub(crate) fn count(
    descriptor: &EntityDescriptor,
    criteria: &Criteria,
) -> DataAccessResult<Statement> {
    let mut binds = Vec::new();
    let mut sql = format!("SELECT COUNT(*) FROM {}", descriptor.table);
    push_where(&mut sql, &mut binds, descriptor, criteria.predicates())?;
    Ok(Statement { sql, binds })
}

fn push_where(
    sql: &mut String,
    binds: &mut Vec<Value>,
    descriptor: &EntityDescriptor,
    predicates: &[Predicate],
) -> DataAccessResult<()> {
    let mut clauses = Vec::with_capacity(predicates.len());
    for predicate in predicates {
        let column = descriptor.column_for(predicate.field())?;
        match predicate {
            Predicate::Equals { value, .. } => {
                clauses.push(format!("{column} = ?"));
                binds.push(value.clone());
            }
            Predicate::Like { pattern, mode, .. } => {
                // SQLite LIKE is case-insensitive for ASCII unless `case_sensitive_like` is set.
                clauses.push(format!("{column} LIKE ? ESCAPE '\\'"));
                binds.push(Value::Text(mode.to_like_pattern(pattern)));
            }
            Predicate::Between { lower, upper, .. } => {
                clauses.push(format!("{column} BETWEEN ? AND ?"));
                binds.push(lower.clone());
                binds.push(upper.clone());
            }
        }
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    Ok(())
}

fn push_order(
    sql: &mut String,
    descriptor: &EntityDescriptor,
    criteria: &Criteria,
) -> DataAccessResult<()> {
    let key_column = descriptor.primary_key.column;
    let mut terms = Vec::with_capacity(criteria.sorts().len() + 1);
    let mut key_sorted = false;

    for sort in criteria.sorts() {
        let column = descriptor.column_for(&sort.field)?;
        key_sorted |= column == key_column;
        terms.push(format!("{column} {}", sort.direction.as_sql()));
    }
    if !key_sorted {
        terms.push(format!("{key_column} ASC"));
    }

    sql.push_str(" ORDER BY ");
    sql.push_str(&terms.join(", "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{count, select, PageWindow};
    use crate::db::dialect::ColumnType;
    use crate::error::DataAccessError;
    use crate::model::entity::{ColumnDef, EntityDescriptor, KeyStrategy};
    use crate::query::criteria::{Criteria, MatchMode};
    use rusqlite::types::Value;

    const PEOPLE: EntityDescriptor = EntityDescriptor {
        name: "person",
        table: "people",
        primary_key: ColumnDef::new("id", "id", ColumnType::Integer),
        key_strategy: KeyStrategy::Generated,
        columns: &[
            ColumnDef::new("name", "full_name", ColumnType::Text),
            ColumnDef::new("age", "age", ColumnType::Integer),
        ],
    };

    #[test]
    fn select_without_criteria_orders_by_key() {
        let statement = select(&PEOPLE, &Criteria::new(), None).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT id, full_name, age FROM people ORDER BY id ASC"
        );
        assert!(statement.binds.is_empty());
    }

    #[test]
    fn select_renders_predicates_sorts_and_window_in_order() {
        let criteria = Criteria::new()
            .like("name", "smith", MatchMode::Start)
            .between("age", 18, 65)
            .sort_descending("age");

        let statement = select(
            &PEOPLE,
            &criteria,
            Some(PageWindow {
                start: 20,
                max_rows: 10,
            }),
        )
        .unwrap();

        assert_eq!(
            statement.sql,
            "SELECT id, full_name, age FROM people \
             WHERE full_name LIKE ? ESCAPE '\\' AND age BETWEEN ? AND ? \
             ORDER BY age DESC, id ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            statement.binds,
            vec![
                Value::Text("smith%".to_string()),
                Value::Integer(18),
                Value::Integer(65),
                Value::Integer(10),
                Value::Integer(20),
            ]
        );
    }

    #[test]
    fn explicit_key_sort_is_not_duplicated() {
        let criteria = Criteria::new().sort_descending("id");
        let statement = select(&PEOPLE, &criteria, None).unwrap();
        assert!(statement.sql.ends_with("ORDER BY id DESC"));
    }

    #[test]
    fn count_ignores_sorts() {
        let criteria = Criteria::new().equals("age", 30).sort_ascending("name");
        let statement = count(&PEOPLE, &criteria).unwrap();
        assert_eq!(statement.sql, "SELECT COUNT(*) FROM people WHERE age = ?");
        assert_eq!(statement.binds, vec![Value::Integer(30)]);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let criteria = Criteria::new().equals("salary", 1);
        assert!(matches!(
            count(&PEOPLE, &criteria),
            Err(DataAccessError::UnknownField { .. })
        ));
    }
}
