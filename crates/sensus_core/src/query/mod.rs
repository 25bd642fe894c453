//! Criteria building and rendering.

pub mod criteria;
pub(crate) mod sql;

pub use criteria::{BindValue, Criteria, MatchMode, Predicate, Sort, SortDirection};
pub use sql::PageWindow;
