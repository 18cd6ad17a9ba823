//! GraphQL API definitions.

mod mutation;
mod query;
pub mod scalar;
pub mod user;

use juniper::EmptySubscription;

use crate::{define_error, Context};

pub use self::{mutation::Mutation, query::Query, user::User};

/// GraphQL schema.
pub type Schema =
    juniper::RootNode<'static, Query, Mutation, EmptySubscription<Context>>;

define_error! {
    enum ArgumentError {
        #[code = "INVALID_ARGUMENT"]
        #[status = BAD_REQUEST]
        #[message = "Page size must be a positive number"]
        PageSize,

        #[code = "INVALID_ARGUMENT"]
        #[status = BAD_REQUEST]
        #[message = "Invalid search or sort criteria"]
        Criteria,
    }
}
