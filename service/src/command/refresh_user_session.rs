//! [`Command`] for refreshing a [`Session`].

use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::user::{session, Session},
    Service,
};

use super::{
    authorize_user_session, create_user_session, invalidate_user_session,
    AuthorizeUserSession, Command, CreateUserSession, InvalidateUserSession,
};

/// [`Command`] for exchanging a valid [`Session`] for a new one.
///
/// The exchanged [`Session`] is invalidated.
#[derive(Clone, Debug, From)]
pub struct RefreshUserSession {
    /// [`session::Token`] of the [`Session`] to refresh.
    pub token: session::Token,
}

impl<Db, Ch> Command<RefreshUserSession> for Service<Db, Ch>
where
    Self: Command<
            AuthorizeUserSession,
            Ok = Session,
            Err = Traced<authorize_user_session::ExecutionError>,
        > + Command<
            CreateUserSession,
            Ok = create_user_session::Output,
            Err = Traced<create_user_session::ExecutionError>,
        > + Command<
            InvalidateUserSession,
            Ok = (),
            Err = Traced<invalidate_user_session::ExecutionError>,
        >,
{
    type Ok = create_user_session::Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RefreshUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RefreshUserSession { token } = cmd;

        let session = self
            .execute(AuthorizeUserSession { token })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let out = self
            .execute(CreateUserSession::ByUserId(session.user_id))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        self.execute(InvalidateUserSession { session })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(out)
    }
}

/// Error of [`RefreshUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Failed to authorize the refreshed [`Session`].
    #[display("Failed to authorize `Session`: {_0}")]
    Authorize(authorize_user_session::ExecutionError),

    /// Failed to create a new [`Session`].
    #[display("Failed to create `Session`: {_0}")]
    Create(create_user_session::ExecutionError),

    /// Failed to invalidate the refreshed [`Session`].
    #[display("Failed to invalidate `Session`: {_0}")]
    Invalidate(invalidate_user_session::ExecutionError),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{
            AuthorizeUserSession, Command as _, CreateUser, CreateUserSession,
        },
        domain::user,
        infra::{cache, database},
        Config, Service,
    };

    use super::{ExecutionError, RefreshUserSession};

    #[tokio::test]
    async fn exchanges_session() {
        let svc = Service::new(
            Config::new(b"secret"),
            database::Memory::default(),
            cache::Memory::default(),
        );
        let user = svc
            .execute(CreateUser {
                name: user::Name::new("Ann").unwrap(),
                surname: None,
                email: user::Email::new("ann@example.com").unwrap(),
                password: user::Password::new("password123")
                    .unwrap()
                    .into_secret(),
            })
            .await
            .unwrap();
        let old = svc
            .execute(CreateUserSession::ByUserId(user.id))
            .await
            .unwrap();

        let new = svc
            .execute(RefreshUserSession {
                token: old.token.clone(),
            })
            .await
            .unwrap();
        assert_eq!(new.user.id, user.id);
        assert_ne!(new.session.id, old.session.id);

        assert!(svc
            .execute(AuthorizeUserSession { token: new.token })
            .await
            .is_ok());
        let err = svc
            .execute(RefreshUserSession { token: old.token })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Authorize(_)));
    }
}
