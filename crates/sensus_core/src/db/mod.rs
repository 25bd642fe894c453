//! SQLite storage bootstrap and session provisioning.
//!
//! # Responsibility
//! - Load provider configuration and build the session factory.
//! - Open and configure one connection per session.
//! - Apply configured schema scripts before any session is served.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - No session is handed out by a factory whose build failed.

pub mod config;
pub mod dialect;
pub mod factory;
pub mod migrations;
mod open;
pub mod provider;

pub use config::{ProviderConfig, SchemaScript, TransactionBehavior};
pub use dialect::{ColumnType, Dialect};
pub use factory::{Session, SessionFactory};
