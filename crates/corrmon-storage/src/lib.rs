//! Relational storage layer for correlation rules, historical alerts and
//! incidents.
//!
//! All persistence goes through [`store::Store`], a thin async access layer
//! over SeaORM + SQLite. One row type per table is re-exported at the crate
//! root; the raw SeaORM entities live under [`entities`].

pub mod auth;
pub mod entities;
pub mod error;
pub mod store;


pub use error::{Result, StorageError};
pub use store::incident::{DistributionBucket, IncidentRow};
pub use store::rule::RuleRow;
pub use store::user::UserRow;
pub use store::Store;
