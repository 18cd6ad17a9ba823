//! Infrastructure layer.

pub mod cache;
pub mod database;

pub use self::{cache::Cache, database::Database};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
