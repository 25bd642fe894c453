//! External session controller.
//!
//! # Responsibility
//! - Own one unit of work shared by several DAO operations.
//! - Finalize the shared transaction once, by explicit commit or rollback.
//!
//! # Invariants
//! - DAOs bound to an active controller never commit or release its unit.
//! - `commit`/`rollback` always release the unit, including when they fail.
//! - Dropping an unfinished controller rolls back and releases.

use crate::db::factory::SessionFactory;
use crate::error::{DataAccessError, DataAccessResult};
use crate::session::unit::{UnitOfWork, UnitState};
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Owner of a transaction that spans several DAO calls.
///
/// ```no_run
/// # use sensus_core::{SessionController, SessionFactory};
/// # fn demo(factory: std::sync::Arc<SessionFactory>) -> sensus_core::DataAccessResult<()> {
/// let controller = SessionController::open_with(factory)?;
/// // bind DAOs with `GenericDao::bound_to(&controller)` and run them here
/// controller.commit()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionController {
    unit: UnitOfWork,
}

impl SessionController {
    /// Creates a controller whose unit is not started yet.
    pub fn new(factory: Arc<SessionFactory>) -> Self {
        Self {
            unit: UnitOfWork::new(factory),
        }
    }

    /// Creates a controller and opens its transaction.
    pub fn open_with(factory: Arc<SessionFactory>) -> DataAccessResult<Self> {
        let controller = Self::new(factory);
        controller.open()?;
        Ok(controller)
    }

    /// Begins the owned unit of work.
    pub fn open(&self) -> DataAccessResult<()> {
        self.unit.begin()?;
        info!(
            "event=controller_open module=session status=ok unit_id={}",
            self.unit.id()
        );
        Ok(())
    }

    /// Commits the shared transaction and releases it.
    ///
    /// Fails with `InvalidState` when a bound operation already rolled the
    /// transaction back.
    pub fn commit(self) -> DataAccessResult<()> {
        let result = self.unit.commit();
        match &result {
            Ok(()) => info!(
                "event=controller_commit module=session status=ok unit_id={}",
                self.unit.id()
            ),
            Err(err) => warn!(
                "event=controller_commit module=session status=error unit_id={} error_code={} error={}",
                self.unit.id(),
                err.code(),
                err
            ),
        }
        self.finish();
        result
    }

    /// Rolls the shared transaction back and releases it.
    pub fn rollback(self) -> DataAccessResult<()> {
        let result = self.unit.rollback();
        info!(
            "event=controller_rollback module=session status={} unit_id={}",
            if result.is_ok() { "ok" } else { "error" },
            self.unit.id()
        );
        self.finish();
        result
    }

    /// Whether DAOs bound to this controller currently run in borrowed mode.
    pub fn is_active(&self) -> bool {
        self.unit.is_active()
    }

    pub fn state(&self) -> UnitState {
        self.unit.state()
    }

    pub fn id(&self) -> Uuid {
        self.unit.id()
    }

    pub fn factory(&self) -> &Arc<SessionFactory> {
        self.unit.factory()
    }

    /// Borrowed handle on the controller's unit.
    pub fn unit(&self) -> UnitOfWork {
        self.unit.share()
    }

    fn finish(&self) {
        // Release only fails for idle units, which hold nothing.
        if let Err(err) = self.unit.release() {
            warn!(
                "event=controller_release module=session status=skipped unit_id={} error={}",
                self.unit.id(),
                err
            );
        }
    }
}

/// Runs `work` in one shared transaction.
///
/// Commits when `work` returns `Ok`, rolls back when it returns `Err`.
pub fn run_in_transaction<R, E>(
    factory: Arc<SessionFactory>,
    work: impl FnOnce(&SessionController) -> Result<R, E>,
) -> Result<R, E>
where
    E: From<DataAccessError>,
{
    let controller = SessionController::open_with(factory)?;
    match work(&controller) {
        Ok(value) => {
            controller.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = controller.rollback() {
                warn!(
                    "event=transaction_rollback module=session status=error error={rollback_err}"
                );
            }
            Err(err)
        }
    }
}
