//! Generic data access over mapped entities.
//!
//! # Responsibility
//! - Run entity CRUD, criteria queries and pagination through one DAO type.
//! - Apply the owned/borrowed transaction discipline on every call.
//!
//! # Invariants
//! - Engine failures surface as `DataAccessError::Engine`, never as panics.

pub mod generic_dao;

pub use generic_dao::GenericDao;
