//! Transaction ownership: units of work and the external controller.
//!
//! # Responsibility
//! - Pair every owned session with exactly one release.
//! - Let one caller share a transaction across several DAO operations.
//!
//! # Invariants
//! - Ownership is a flag on the unit handle, never ambient global state.

mod controller;
mod unit;

pub use controller::{run_in_transaction, SessionController};
pub use unit::{UnitOfWork, UnitState};
