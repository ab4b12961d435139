//! Read-only, parameterized report queries.

pub mod builder;
pub mod dialect;
pub mod domain;

pub use builder::{BuiltQuery, DomainSettings, QueryBuilder};
pub use dialect::Dialect;
pub use domain::{ColumnKind, ColumnSpec, Domain};
