//! [`Query`] definition.

pub mod session;
pub mod user;
pub mod users;

/// [`Query`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Query;
