//! Entity mapping contracts.
//!
//! # Responsibility
//! - Replace runtime type discovery with a descriptor each entity supplies.

pub mod entity;

pub use entity::{check_identifier, ColumnDef, Entity, EntityDescriptor, KeyStrategy};
