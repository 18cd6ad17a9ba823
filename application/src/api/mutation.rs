//! GraphQL [`Mutation`]s definitions.

use juniper::graphql_object;
use service::{command, query, Command as _, Query as _};

use crate::{api, define_error, AsError, Context, Error, Session};

/// Root of all GraphQL mutations.
#[derive(Clone, Copy, Debug)]
pub struct Mutation;

impl Mutation {
    /// Name of the [`tracing::Span`] for the mutations.
    const SPAN_NAME: &'static str = "GraphQL mutation";

    /// Builds [`api::user::session::CreateResult`] out of a freshly created
    /// `Session`, making it the current one for the rest of the request.
    async fn session_created(
        output: command::create_user_session::Output,
        ctx: &Context,
    ) -> api::user::session::CreateResult {
        let ttl_minutes = ctx
            .service()
            .execute(query::session::TokenTtl)
            .await
            .unwrap_or_else(|e| match e {});

        ctx.set_current_session(Session {
            user_id: output.user.id.into(),
            token: output.token.clone(),
            claims: output.session,
        })
        .await;

        api::user::session::CreateResult::new(output, ttl_minutes)
    }
}

#[graphql_object(context = Context)]
impl Mutation {
    /// Creates a new `User` and signs it in.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `EMAIL_OCCUPIED` - provided `UserEmail` is occupied by another
    ///                      `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            email = %email,
            gql.name = "createUser",
            name = %name,
            otel.name = Self::SPAN_NAME,
            surname = ?surname.as_ref().map(ToString::to_string),
        ),
    )]
    pub async fn create_user(
        name: api::user::Name,
        surname: Option<api::user::Surname>,
        email: api::user::Email,
        password: api::user::Password,
        ctx: &Context,
    ) -> Result<api::user::session::CreateResult, Error> {
        let user = ctx
            .service()
            .execute(command::CreateUser {
                name: name.into(),
                surname: surname.map(Into::into),
                email: email.into(),
                password: secrecy::SecretBox::init_with(move || {
                    password.into()
                }),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;
        let output = ctx
            .service()
            .execute(command::CreateUserSession::ByUserId(user.id))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        Ok(Self::session_created(output, ctx).await)
    }

    /// Creates a new `Session` with the provided credentials.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `WRONG_CREDENTIALS` - provided credentials do not match any `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            email = %email,
            gql.name = "createUserSession",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn create_user_session(
        email: api::user::Email,
        password: api::user::Password,
        ctx: &Context,
    ) -> Result<api::user::session::CreateResult, Error> {
        let output = ctx
            .service()
            .execute(command::CreateUserSession::ByCredentials {
                email: email.into(),
                password: secrecy::SecretBox::init_with(move || {
                    password.into()
                }),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        Ok(Self::session_created(output, ctx).await)
    }

    /// Exchanges the current `Session` for a new one.
    ///
    /// The current `Session` cannot be used afterwards.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authorized.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "refreshUserSession",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn refresh_user_session(
        ctx: &Context,
    ) -> Result<api::user::session::CreateResult, Error> {
        let token = ctx.current_session().await?.token;

        let output = ctx
            .service()
            .execute(command::RefreshUserSession { token })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        let ttl_minutes = ctx
            .service()
            .execute(query::session::TokenTtl)
            .await
            .unwrap_or_else(|e| match e {});
        Ok(api::user::session::CreateResult::new(output, ttl_minutes))
    }

    /// Signs out of the current `Session`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authorized.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "deleteUserSession",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn delete_user_session(ctx: &Context) -> Result<bool, Error> {
        let session = ctx.current_session().await?.claims;

        ctx.service()
            .execute(command::InvalidateUserSession { session })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        Ok(true)
    }

    /// Updates the profile of the current `User`.
    ///
    /// Omitted fields are left untouched.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authorized;
    /// - `USER_NOT_EXISTS` - the current `User` doesn't exist anymore.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "updateMyProfile",
            name = ?name.as_ref().map(ToString::to_string),
            otel.name = Self::SPAN_NAME,
            profile_path = ?profile_path.as_ref().map(ToString::to_string),
            surname = ?surname.as_ref().map(ToString::to_string),
        ),
    )]
    pub async fn update_my_profile(
        name: Option<api::user::Name>,
        surname: Option<api::user::Surname>,
        profile_path: Option<api::user::ProfilePath>,
        ctx: &Context,
    ) -> Result<api::User, Error> {
        let my_id = ctx.current_session().await?.user_id;

        ctx.service()
            .execute(command::UpdateUserProfile {
                user_id: my_id.into(),
                name: name.map(Into::into),
                surname: surname.map(Into::into),
                profile_path: profile_path.map(Into::into),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }
}

impl AsError for command::create_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "EMAIL_OCCUPIED"]
                #[status = CONFLICT]
                #[message = "`UserEmail` is occupied by another `User`"]
                EmailOccupied,
            }
        }

        match self {
            Self::Cache(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
            Self::EmailOccupied(_) => Some(Error::EmailOccupied.into()),
        }
    }
}

impl AsError for command::create_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "WRONG_CREDENTIALS"]
                #[status = UNAUTHORIZED]
                #[message = "Provided credentials do not match any `User`"]
                WrongCredentials,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::JsonWebTokenEncodeError(_) => None,
            Self::UserNotExists(_) | Self::WrongCredentials => {
                Some(Error::WrongCredentials.into())
            }
        }
    }
}

impl AsError for command::invalidate_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Cache(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::refresh_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Authorize(e) => e.try_as_error(),
            Self::Create(e) => e.try_as_error(),
            Self::Invalidate(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::update_user_profile::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Cache(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
            Self::UserNotExists(_) => {
                Some(api::query::UserError::NotExists.into())
            }
        }
    }
}
