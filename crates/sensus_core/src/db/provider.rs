//! Process-wide session provider.
//!
//! # Responsibility
//! - Build the shared [`SessionFactory`] lazily on first use.
//! - Allow explicit reconfiguration and idempotent shutdown.
//!
//! # Invariants
//! - At most one factory is built per (re)configuration, even under
//!   concurrent first use.
//! - Shutdown closes the current factory once; later calls are no-ops.

use crate::db::config::ProviderConfig;
use crate::db::factory::{Session, SessionFactory};
use crate::error::DataAccessResult;
use log::info;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static PROVIDER: Lazy<Mutex<Option<Arc<SessionFactory>>>> = Lazy::new(|| Mutex::new(None));

fn slot() -> MutexGuard<'static, Option<Arc<SessionFactory>>> {
    // The slot only holds an `Option<Arc<_>>`; a panic elsewhere cannot leave it torn.
    PROVIDER.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns the shared factory, building it from the default configuration
/// file on first use.
///
/// The file is named by `SENSUS_PERSISTENCE_CONFIG` or defaults to
/// `./sensus-persistence.json`.
pub fn session_factory() -> DataAccessResult<Arc<SessionFactory>> {
    let mut slot = slot();
    if let Some(factory) = slot.as_ref() {
        if !factory.is_closed() {
            return Ok(Arc::clone(factory));
        }
    }

    let path = ProviderConfig::default_path();
    info!(
        "event=provider_init module=db status=start config={}",
        path.display()
    );
    let factory = SessionFactory::from_config_file(&path)?;
    *slot = Some(Arc::clone(&factory));
    Ok(factory)
}

/// Replaces the shared factory with one built from `config`.
///
/// The previous factory is closed only after the new one builds, so a bad
/// configuration leaves the running provider untouched.
pub fn configure(config: ProviderConfig) -> DataAccessResult<Arc<SessionFactory>> {
    let mut slot = slot();
    let factory = SessionFactory::build(config)?;
    if let Some(previous) = slot.replace(Arc::clone(&factory)) {
        previous.close();
        info!("event=provider_reconfigure module=db status=ok");
    }
    Ok(factory)
}

/// Opens a session from the shared factory.
pub fn acquire() -> DataAccessResult<Session> {
    session_factory()?.open_session()
}

/// Closes a session. Close failures are logged, never returned.
pub fn release(session: Session) {
    session.close();
}

/// Closes and forgets the shared factory. Safe to call repeatedly.
pub fn shutdown() {
    if let Some(factory) = slot().take() {
        factory.close();
        info!("event=provider_shutdown module=db status=ok");
    }
}

/// Whether a live shared factory exists.
pub fn is_initialized() -> bool {
    slot().as_ref().is_some_and(|factory| !factory.is_closed())
}
