//! Generic record operations over any [`Entity`].
//!
//! # Responsibility
//! - Provide save/persist/update/delete/clear/find/count/paginate/raw-query
//!   for one entity type with an identical surface in both transaction modes.
//! - Keep the criteria accumulator for the DAO instance.
//!
//! # Invariants
//! - Owned mode: every call begins, commits or rolls back, and releases its
//!   own unit of work.
//! - Borrowed mode (bound controller active): calls never commit or release.
//! - Key and criteria validation run inside the unit of work, so any bound
//!   failure rolls the shared transaction back immediately.
//! - Query execution reads the accumulator and never clears it.

use crate::db::factory::SessionFactory;
use crate::db::provider;
use crate::error::{DataAccessError, DataAccessResult};
use crate::model::entity::{Entity, EntityDescriptor, KeyStrategy};
use crate::query::criteria::{BindValue, Criteria, MatchMode, Predicate};
use crate::query::sql::{self, PageWindow, Statement};
use crate::session::{SessionController, UnitOfWork, UnitState};
use log::{debug, error, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// Data access object for entity type `T`.
///
/// Build one per thread or serialize access: the criteria accumulator
/// needs `&mut self`.
#[derive(Debug)]
pub struct GenericDao<T: Entity> {
    source: FactorySource,
    link: Option<UnitOfWork>,
    criteria: Criteria,
    _entity: PhantomData<fn() -> T>,
}

/// Where a DAO gets its sessions from.
#[derive(Debug, Clone)]
enum FactorySource {
    /// Process-wide provider, looked up on every call so reconfiguration is picked up.
    Provider,
    Fixed(Arc<SessionFactory>),
}

impl<T: Entity> GenericDao<T> {
    /// Creates a DAO on the process-wide session provider.
    ///
    /// The provider is built here if needed, so configuration errors surface
    /// early; each later call uses whatever factory the provider holds then.
    pub fn new() -> DataAccessResult<Self> {
        provider::session_factory()?;
        Self::with_source(FactorySource::Provider)
    }

    /// Creates a DAO pinned to `factory` that owns a fresh unit of work per call.
    pub fn with_factory(factory: Arc<SessionFactory>) -> DataAccessResult<Self> {
        Self::with_source(FactorySource::Fixed(factory))
    }

    /// Creates a DAO that joins `controller`'s transaction while it is active.
    pub fn bound_to(controller: &SessionController) -> DataAccessResult<Self> {
        let mut dao = Self::with_factory(Arc::clone(controller.factory()))?;
        dao.link = Some(controller.unit());
        Ok(dao)
    }

    fn with_source(source: FactorySource) -> DataAccessResult<Self> {
        T::descriptor().validate()?;
        Ok(Self {
            source,
            link: None,
            criteria: Criteria::new(),
            _entity: PhantomData,
        })
    }

    /// Factory the next owned-mode call will use.
    pub fn factory(&self) -> DataAccessResult<Arc<SessionFactory>> {
        match &self.source {
            FactorySource::Provider => provider::session_factory(),
            FactorySource::Fixed(factory) => Ok(Arc::clone(factory)),
        }
    }

    /// Whether this DAO was created with [`GenericDao::bound_to`].
    pub fn is_bound(&self) -> bool {
        self.link.is_some()
    }

    // Criteria accumulator -------------------------------------------------

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn add_equals(&mut self, field: impl Into<String>, value: impl BindValue) -> &mut Self {
        self.criteria.add_equals(field, value);
        self
    }

    pub fn add_like(
        &mut self,
        field: impl Into<String>,
        pattern: impl Into<String>,
        mode: MatchMode,
    ) -> &mut Self {
        self.criteria.add_like(field, pattern, mode);
        self
    }

    pub fn add_like_anywhere(
        &mut self,
        field: impl Into<String>,
        pattern: impl Into<String>,
    ) -> &mut Self {
        self.criteria.add_like_anywhere(field, pattern);
        self
    }

    pub fn add_between(
        &mut self,
        field: impl Into<String>,
        lower: impl BindValue,
        upper: impl BindValue,
    ) -> &mut Self {
        self.criteria.add_between(field, lower, upper);
        self
    }

    pub fn add_sort_ascending(&mut self, field: impl Into<String>) -> &mut Self {
        self.criteria.add_sort_ascending(field);
        self
    }

    pub fn add_sort_descending(&mut self, field: impl Into<String>) -> &mut Self {
        self.criteria.add_sort_descending(field);
        self
    }

    /// Drops every accumulated predicate and sort.
    pub fn clear_criteria(&mut self) {
        self.criteria.clear();
    }

    // Row operations -------------------------------------------------------

    /// Inserts `entity`. A generated key is written back into `entity`.
    pub fn save(&self, entity: &mut T) -> DataAccessResult<()> {
        let descriptor = T::descriptor();
        let key = entity.primary_key();
        let values = entity.column_values();

        let generated =
            self.execute("save", |conn| insert(conn, descriptor, key, values, "save"))?;
        if let Some(rowid) = generated {
            entity.assign_generated_key(rowid);
        }
        Ok(())
    }

    /// Updates the row with `entity`'s key, or inserts it when absent.
    ///
    /// Entities without identity are inserted like [`GenericDao::save`].
    pub fn persist(&self, entity: &mut T) -> DataAccessResult<()> {
        let descriptor = T::descriptor();
        let values = entity.column_values();

        let Some(key) = entity.primary_key().filter(|value| *value != Value::Null) else {
            let generated = self.execute("persist", |conn| {
                insert(conn, descriptor, None, values, "persist")
            })?;
            if let Some(rowid) = generated {
                entity.assign_generated_key(rowid);
            }
            return Ok(());
        };

        self.execute("persist", |conn| {
            let statement = upsert(descriptor, key, values);
            conn.execute(&statement.sql, params_from_iter(statement.binds.iter()))
                .map_err(engine_error(descriptor, "persist"))?;
            Ok(())
        })
    }

    /// Updates the row with `entity`'s key.
    ///
    /// # Errors
    /// - `MissingIdentity` when `entity` has no key.
    /// - `RowNotFound` when no row has that key.
    pub fn update(&self, entity: &T) -> DataAccessResult<()> {
        let descriptor = T::descriptor();
        let key = entity.primary_key();
        let values = entity.column_values();

        self.execute("update", |conn| {
            let key = require_key(descriptor, key)?;
            let changed = if descriptor.columns.is_empty() {
                row_exists(conn, descriptor, &key)?
            } else {
                let assignments = descriptor
                    .columns
                    .iter()
                    .map(|def| format!("{} = ?", def.column))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "UPDATE {} SET {} WHERE {} = ?",
                    descriptor.table, assignments, descriptor.primary_key.column
                );
                let binds = values.into_iter().chain(std::iter::once(key.clone()));
                conn.execute(&sql, params_from_iter(binds))
                    .map_err(engine_error(descriptor, "update"))?
            };

            if changed == 0 {
                return Err(DataAccessError::RowNotFound {
                    entity: descriptor.name,
                    key: describe_key(&key),
                });
            }
            Ok(())
        })
    }

    /// Deletes the row with `entity`'s key. A missing row is not an error.
    pub fn delete(&self, entity: &T) -> DataAccessResult<()> {
        let descriptor = T::descriptor();
        let key = entity.primary_key();

        self.execute("delete", |conn| {
            let key = require_key(descriptor, key)?;
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?",
                descriptor.table, descriptor.primary_key.column
            );
            let removed = conn
                .execute(&sql, [&key])
                .map_err(engine_error(descriptor, "delete"))?;
            if removed == 0 {
                debug!(
                    "event=dao_delete module=repo status=noop entity={} key={}",
                    descriptor.name,
                    describe_key(&key)
                );
            }
            Ok(())
        })
    }

    /// Deletes every row of the entity table and returns how many were removed.
    pub fn clear_table(&self) -> DataAccessResult<usize> {
        let descriptor = T::descriptor();
        self.execute("clear_table", |conn| {
            conn.execute(&format!("DELETE FROM {}", descriptor.table), [])
                .map_err(engine_error(descriptor, "clear_table"))
        })
    }

    /// Creates the entity table from its descriptor if it does not exist.
    ///
    /// Column types go through the factory dialect, so configured overrides apply.
    pub fn create_table(&self) -> DataAccessResult<()> {
        let descriptor = T::descriptor();
        let factory = self.factory()?;
        self.execute("create_table", |conn| {
            conn.execute_batch(&descriptor.create_table_sql(factory.dialect()))
                .map_err(engine_error(descriptor, "create_table"))
        })
    }

    // Queries --------------------------------------------------------------

    /// Loads one entity by primary key. A missing row is `Ok(None)`.
    pub fn find_by_id(&self, key: impl BindValue) -> DataAccessResult<Option<T>> {
        let descriptor = T::descriptor();
        let key = key.into_value();
        self.execute("find_by_id", |conn| {
            let sql = format!(
                "SELECT {} FROM {} WHERE {} = ?",
                descriptor.select_list(),
                descriptor.table,
                descriptor.primary_key.column
            );
            conn.query_row(&sql, [&key], |row| T::from_row(row))
                .optional()
                .map_err(engine_error(descriptor, "find_by_id"))
        })
    }

    /// Loads every row, ordered by primary key.
    pub fn find_all(&self) -> DataAccessResult<Vec<T>> {
        self.select("find_all", &Criteria::new(), None)
    }

    /// Loads rows matching `predicates`, or the accumulated predicates when
    /// `None`. Accumulated sorts apply in both cases.
    pub fn find_by_criteria(&self, predicates: Option<&[Predicate]>) -> DataAccessResult<Vec<T>> {
        let criteria = self.effective_criteria(predicates);
        self.select("find_by_criteria", &criteria, None)
    }

    /// Counts rows matching `predicates`, or the accumulated predicates when `None`.
    pub fn row_count(&self, predicates: Option<&[Predicate]>) -> DataAccessResult<u64> {
        let criteria = self.effective_criteria(predicates);
        self.count("row_count", &criteria)
    }

    /// Loads at most `max_rows` rows starting at offset `start`.
    ///
    /// Uses the same predicate rule as [`GenericDao::find_by_criteria`]; rows are
    /// ordered by the accumulated sorts, then by primary key, before slicing.
    pub fn paginate(
        &self,
        start: u32,
        max_rows: u32,
        predicates: Option<&[Predicate]>,
    ) -> DataAccessResult<Vec<T>> {
        let criteria = self.effective_criteria(predicates);
        self.select("paginate", &criteria, Some(PageWindow { start, max_rows }))
    }

    /// Loads rows matching explicit per-call `criteria`; the accumulator is ignored.
    pub fn find_matching(&self, criteria: &Criteria) -> DataAccessResult<Vec<T>> {
        self.select("find_matching", criteria, None)
    }

    /// Counts rows matching explicit per-call `criteria`.
    pub fn count_matching(&self, criteria: &Criteria) -> DataAccessResult<u64> {
        self.count("count_matching", criteria)
    }

    /// Pages through rows matching explicit per-call `criteria`.
    pub fn paginate_matching(
        &self,
        criteria: &Criteria,
        start: u32,
        max_rows: u32,
    ) -> DataAccessResult<Vec<T>> {
        self.select(
            "paginate_matching",
            criteria,
            Some(PageWindow { start, max_rows }),
        )
    }

    /// Runs caller-supplied SQL verbatim and maps each row to `T`.
    ///
    /// The text is not validated or escaped: callers must never build it from
    /// untrusted input. Prefer [`GenericDao::raw_query_with_params`].
    pub fn raw_query(&self, sql: &str) -> DataAccessResult<Vec<T>> {
        self.raw_query_with_params(sql, &[])
    }

    /// Runs caller-supplied SQL with positional bind values and maps each row to `T`.
    pub fn raw_query_with_params(&self, sql: &str, params: &[Value]) -> DataAccessResult<Vec<T>> {
        let descriptor = T::descriptor();
        self.execute("raw_query", |conn| {
            query_entities(conn, sql, params).map_err(engine_error(descriptor, "raw_query"))
        })
    }

    fn select(
        &self,
        operation: &'static str,
        criteria: &Criteria,
        window: Option<PageWindow>,
    ) -> DataAccessResult<Vec<T>> {
        let descriptor = T::descriptor();
        self.execute(operation, |conn| {
            let Statement { sql, binds } = sql::select(descriptor, criteria, window)?;
            query_entities(conn, &sql, &binds).map_err(engine_error(descriptor, operation))
        })
    }

    fn count(&self, operation: &'static str, criteria: &Criteria) -> DataAccessResult<u64> {
        let descriptor = T::descriptor();
        self.execute(operation, |conn| {
            let Statement { sql, binds } = sql::count(descriptor, criteria)?;
            conn.query_row(&sql, params_from_iter(binds.iter()), |row| {
                row.get::<_, i64>(0)
            })
            .map(|count| u64::try_from(count).unwrap_or(0))
            .map_err(engine_error(descriptor, operation))
        })
    }

    fn effective_criteria(&self, predicates: Option<&[Predicate]>) -> Criteria {
        match predicates {
            Some(predicates) => self.criteria.with_predicates(predicates),
            None => self.criteria.clone(),
        }
    }

    // Transaction discipline ----------------------------------------------

    fn execute<R>(
        &self,
        operation: &'static str,
        work: impl FnOnce(&Connection) -> DataAccessResult<R>,
    ) -> DataAccessResult<R> {
        let entity = T::descriptor().name;
        let started_at = Instant::now();

        let (mode, result) = match self.shared_unit() {
            Ok(Some(unit)) => ("borrowed", run_borrowed(unit, work)),
            Ok(None) => match self.factory() {
                Ok(factory) => ("owned", run_owned(&factory, work)),
                Err(err) => ("owned", Err(err)),
            },
            Err(err) => ("borrowed", Err(err)),
        };

        match &result {
            Ok(_) => debug!(
                "event=dao_op module=repo status=ok op={} entity={} mode={} duration_ms={}",
                operation,
                entity,
                mode,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=dao_op module=repo status=error op={} entity={} mode={} duration_ms={} error_code={} error={}",
                operation,
                entity,
                mode,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        result
    }

    /// Controller unit to borrow, if the bound controller is running.
    fn shared_unit(&self) -> DataAccessResult<Option<&UnitOfWork>> {
        let Some(link) = self.link.as_ref() else {
            return Ok(None);
        };
        match link.state() {
            UnitState::Active => Ok(Some(link)),
            // The controller still owns this transaction until it is finalized.
            UnitState::RolledBack => Err(DataAccessError::InvalidState {
                unit_id: link.id().to_string(),
                expected: "active shared unit",
                actual: UnitState::RolledBack,
            }),
            UnitState::Idle | UnitState::Committed | UnitState::Released => Ok(None),
        }
    }
}

fn run_owned<R>(
    factory: &Arc<SessionFactory>,
    work: impl FnOnce(&Connection) -> DataAccessResult<R>,
) -> DataAccessResult<R> {
    let unit = UnitOfWork::begin_owned(Arc::clone(factory))?;
    match unit.with_connection(work) {
        Ok(value) => {
            unit.commit()?;
            unit.release()?;
            Ok(value)
        }
        Err(err) => {
            abandon(&unit);
            if let Err(release_err) = unit.release() {
                warn!(
                    "event=unit_release module=repo status=error unit_id={} error={}",
                    unit.id(),
                    release_err
                );
            }
            Err(err)
        }
    }
}

fn run_borrowed<R>(
    unit: &UnitOfWork,
    work: impl FnOnce(&Connection) -> DataAccessResult<R>,
) -> DataAccessResult<R> {
    match unit.with_connection(work) {
        Ok(value) => {
            // No-op on a borrowed handle; the controller commits.
            unit.commit()?;
            Ok(value)
        }
        Err(err) => {
            abandon(unit);
            Err(err)
        }
    }
}

fn abandon(unit: &UnitOfWork) {
    if let Err(err) = unit.rollback() {
        warn!(
            "event=unit_rollback module=repo status=error unit_id={} error={}",
            unit.id(),
            err
        );
    }
}

fn insert(
    conn: &Connection,
    descriptor: &EntityDescriptor,
    key: Option<Value>,
    values: Vec<Value>,
    operation: &'static str,
) -> DataAccessResult<Option<i64>> {
    let key = key.filter(|value| *value != Value::Null);
    if key.is_none() && descriptor.key_strategy == KeyStrategy::Assigned {
        return Err(DataAccessError::MissingIdentity {
            entity: descriptor.name,
        });
    }

    let mut columns: Vec<&str> = Vec::with_capacity(descriptor.columns.len() + 1);
    let mut binds: Vec<Value> = Vec::with_capacity(descriptor.columns.len() + 1);
    if let Some(key) = key.as_ref() {
        columns.push(descriptor.primary_key.column);
        binds.push(key.clone());
    }
    columns.extend(descriptor.columns.iter().map(|def| def.column));
    binds.extend(values);

    let sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", descriptor.table)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            descriptor.table,
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        )
    };

    conn.execute(&sql, params_from_iter(binds.iter()))
        .map_err(engine_error(descriptor, operation))?;

    Ok(match key {
        Some(_) => None,
        None => Some(conn.last_insert_rowid()),
    })
}

fn upsert(descriptor: &EntityDescriptor, key: Value, values: Vec<Value>) -> Statement {
    let key_column = descriptor.primary_key.column;
    let columns = std::iter::once(key_column)
        .chain(descriptor.columns.iter().map(|def| def.column))
        .collect::<Vec<_>>();
    let conflict_action = if descriptor.columns.is_empty() {
        "NOTHING".to_string()
    } else {
        let assignments = descriptor
            .columns
            .iter()
            .map(|def| format!("{0} = excluded.{0}", def.column))
            .collect::<Vec<_>>()
            .join(", ");
        format!("UPDATE SET {assignments}")
    };

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO {}",
        descriptor.table,
        columns.join(", "),
        vec!["?"; columns.len()].join(", "),
        key_column,
        conflict_action
    );
    let binds = std::iter::once(key).chain(values).collect();
    Statement { sql, binds }
}

fn row_exists(
    conn: &Connection,
    descriptor: &EntityDescriptor,
    key: &Value,
) -> DataAccessResult<usize> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?",
        descriptor.table, descriptor.primary_key.column
    );
    conn.query_row(&sql, [key], |row| row.get::<_, i64>(0))
        .map(|count| usize::try_from(count).unwrap_or(0))
        .map_err(engine_error(descriptor, "update"))
}

fn query_entities<T: Entity>(
    conn: &Connection,
    sql: &str,
    binds: &[Value],
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(binds.iter()), |row| T::from_row(row))?;
    let entities = rows.collect::<rusqlite::Result<Vec<T>>>()?;
    Ok(entities)
}

fn require_key(descriptor: &EntityDescriptor, key: Option<Value>) -> DataAccessResult<Value> {
    key.filter(|value| *value != Value::Null)
        .ok_or(DataAccessError::MissingIdentity {
            entity: descriptor.name,
        })
}

fn engine_error(
    descriptor: &EntityDescriptor,
    operation: &'static str,
) -> impl FnOnce(rusqlite::Error) -> DataAccessError {
    let entity = descriptor.name;
    move |source| DataAccessError::engine(operation, entity, source)
}

fn describe_key(key: &Value) -> String {
    match key {
        Value::Null => "NULL".to_string(),
        Value::Integer(value) => value.to_string(),
        Value::Real(value) => value.to_string(),
        Value::Text(value) => value.clone(),
        Value::Blob(bytes) => format!("<{} byte blob>", bytes.len()),
    }
}
