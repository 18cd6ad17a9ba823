//! [`Command`] definition.

pub mod authorize_user_session;
pub mod create_user;
pub mod create_user_session;
pub mod invalidate_user_session;
pub mod refresh_user_session;
pub mod update_user_profile;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authorize_user_session::AuthorizeUserSession, create_user::CreateUser,
    create_user_session::CreateUserSession,
    invalidate_user_session::InvalidateUserSession,
    refresh_user_session::RefreshUserSession,
    update_user_profile::UpdateUserProfile,
};
