//! Unit of work: one session plus one transaction with explicit ownership.
//!
//! # Responsibility
//! - Drive `Idle -> Active -> Committed | RolledBack -> Released`.
//! - Let a single owner commit and release while borrowed handles share the
//!   same transaction without finalizing it.
//!
//! # Invariants
//! - A transaction is open iff the unit holds a session in `Active` state.
//! - Only the owned handle commits or releases; borrowed commit/release are no-ops.
//! - Rollback is honoured from any handle.
//! - An owned unit is released exactly once: explicitly or on drop.

use crate::db::factory::{Session, SessionFactory};
use crate::error::{DataAccessError, DataAccessResult};
use log::{debug, error, warn};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Lifecycle state of a [`UnitOfWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Idle,
    Active,
    Committed,
    RolledBack,
    Released,
}

#[derive(Debug)]
struct UnitCore {
    session: Option<Session>,
    state: UnitState,
}

#[derive(Debug)]
struct UnitShared {
    id: Uuid,
    factory: Arc<SessionFactory>,
    core: Mutex<UnitCore>,
}

/// Handle on one session + transaction.
///
/// The handle created by [`UnitOfWork::new`] is the owner. [`UnitOfWork::share`]
/// hands out borrowed handles on the same transaction.
#[derive(Debug)]
pub struct UnitOfWork {
    shared: Arc<UnitShared>,
    owned: bool,
}

impl UnitOfWork {
    /// Creates an idle, owned unit. No connection is opened yet.
    pub fn new(factory: Arc<SessionFactory>) -> Self {
        Self {
            shared: Arc::new(UnitShared {
                id: Uuid::new_v4(),
                factory,
                core: Mutex::new(UnitCore {
                    session: None,
                    state: UnitState::Idle,
                }),
            }),
            owned: true,
        }
    }

    /// Creates an owned unit and begins its transaction.
    pub fn begin_owned(factory: Arc<SessionFactory>) -> DataAccessResult<Self> {
        let unit = Self::new(factory);
        unit.begin()?;
        Ok(unit)
    }

    /// Returns a borrowed handle on the same transaction.
    pub fn share(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            owned: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn state(&self) -> UnitState {
        self.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == UnitState::Active
    }

    pub fn factory(&self) -> &Arc<SessionFactory> {
        &self.shared.factory
    }

    /// Acquires a session and opens the transaction: `Idle -> Active`.
    pub fn begin(&self) -> DataAccessResult<()> {
        let mut core = self.lock();
        if !self.owned || core.state != UnitState::Idle {
            return Err(self.invalid_state("owned idle unit", core.state));
        }

        let session = self.shared.factory.open_session()?;
        let begin_sql = self.shared.factory.transaction_behavior().begin_sql();
        if let Err(source) = session.connection().execute_batch(begin_sql) {
            session.close();
            return Err(DataAccessError::engine("begin", "unit_of_work", source));
        }

        debug!(
            "event=unit_begin module=session status=ok unit_id={} session_id={}",
            self.shared.id,
            session.id()
        );
        core.session = Some(session);
        core.state = UnitState::Active;
        Ok(())
    }

    /// Commits the transaction: `Active -> Committed`.
    ///
    /// A borrowed handle defers to the owner and returns `Ok(())` without
    /// touching the transaction. Committing anything but an active unit fails,
    /// so a transaction rolled back by an earlier failure is never reported
    /// as committed. If the engine rejects the commit, the unit is rolled back
    /// and the engine error returned.
    pub fn commit(&self) -> DataAccessResult<()> {
        if !self.owned {
            debug!(
                "event=unit_commit module=session status=deferred unit_id={}",
                self.shared.id
            );
            return Ok(());
        }

        let mut core = self.lock();
        if core.state != UnitState::Active {
            return Err(self.invalid_state("active unit", core.state));
        }

        let result = match core.session.as_ref() {
            Some(session) => session.connection().execute_batch("COMMIT;"),
            None => return Err(self.invalid_state("unit with open session", core.state)),
        };

        match result {
            Ok(()) => {
                core.state = UnitState::Committed;
                debug!(
                    "event=unit_commit module=session status=ok unit_id={}",
                    self.shared.id
                );
                Ok(())
            }
            Err(source) => {
                error!(
                    "event=unit_commit module=session status=error unit_id={} error={}",
                    self.shared.id, source
                );
                rollback_core(&mut core, self.shared.id);
                Err(DataAccessError::engine("commit", "unit_of_work", source))
            }
        }
    }

    /// Rolls the transaction back: `Active -> RolledBack`.
    ///
    /// Permitted from owned and borrowed handles. Engine failures during the
    /// rollback are logged and swallowed. Rolling back twice is a no-op.
    pub fn rollback(&self) -> DataAccessResult<()> {
        let mut core = self.lock();
        match core.state {
            UnitState::Active => {
                rollback_core(&mut core, self.shared.id);
                Ok(())
            }
            UnitState::RolledBack => Ok(()),
            other => Err(self.invalid_state("active unit", other)),
        }
    }

    /// Closes the session: `Committed | RolledBack -> Released`.
    ///
    /// No-op for borrowed handles and for units already released.
    pub fn release(&self) -> DataAccessResult<()> {
        if !self.owned {
            return Ok(());
        }

        let mut core = self.lock();
        match core.state {
            UnitState::Committed | UnitState::RolledBack => {
                release_core(&mut core, self.shared.id);
                Ok(())
            }
            UnitState::Released => Ok(()),
            other => Err(self.invalid_state("committed or rolled back unit", other)),
        }
    }

    /// Runs `work` against the active connection.
    ///
    /// `work` must not call back into this unit.
    pub fn with_connection<R>(
        &self,
        work: impl FnOnce(&Connection) -> DataAccessResult<R>,
    ) -> DataAccessResult<R> {
        let core = self.lock();
        match (core.state, core.session.as_ref()) {
            (UnitState::Active, Some(session)) => work(session.connection()),
            (state, _) => Err(self.invalid_state("active unit", state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, UnitCore> {
        // A panic inside `work` leaves the state machine intact; drop still cleans up.
        self.shared
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn invalid_state(&self, expected: &'static str, actual: UnitState) -> DataAccessError {
        DataAccessError::InvalidState {
            unit_id: self.shared.id.to_string(),
            expected,
            actual,
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }

        let id = self.shared.id;
        let mut core = self.lock();
        if core.state == UnitState::Active {
            warn!("event=unit_drop module=session status=warn unit_id={id} action=rollback");
            rollback_core(&mut core, id);
        }
        if core.state != UnitState::Released {
            release_core(&mut core, id);
        }
    }
}

fn rollback_core(core: &mut UnitCore, id: Uuid) {
    if let Some(session) = core.session.as_ref() {
        let conn = session.connection();
        // SQLite ends the transaction itself on some errors.
        if conn.is_autocommit() {
            debug!(
                "event=unit_rollback module=session status=skipped unit_id={id} reason=no_transaction"
            );
        } else if let Err(err) = conn.execute_batch("ROLLBACK;") {
            error!(
                "event=unit_rollback module=session status=error unit_id={id} error_code=rollback_failed error={err}"
            );
        } else {
            debug!("event=unit_rollback module=session status=ok unit_id={id}");
        }
    }
    core.state = UnitState::RolledBack;
}

fn release_core(core: &mut UnitCore, id: Uuid) {
    if let Some(session) = core.session.take() {
        session.close();
        debug!("event=unit_release module=session status=ok unit_id={id}");
    }
    core.state = UnitState::Released;
}
