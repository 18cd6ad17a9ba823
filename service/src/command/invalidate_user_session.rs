//! [`Command`] for invalidating a [`Session`].

use common::{log::Channel, operations::Insert, Logger};
use derive_more::{Display, Error, From};
use serde_json::json;
use tracerr::Traced;

use crate::{
    domain::user::Session,
    infra::{cache, Cache},
    Service,
};

use super::Command;

/// [`Logger`] of [`InvalidateUserSession`].
const LOG: Logger = Logger::for_module("Auth").with_channel(Channel::Security);

/// [`Command`] for invalidating a [`Session`] before its expiration.
#[derive(Clone, Copy, Debug, From)]
pub struct InvalidateUserSession {
    /// [`Session`] to invalidate.
    pub session: Session,
}

impl<Db, Ch> Command<InvalidateUserSession> for Service<Db, Ch>
where
    Ch: Cache<Insert<cache::Entry>, Ok = (), Err = Traced<cache::Error>>,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: InvalidateUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        let InvalidateUserSession { session } = cmd;

        // Already expired `Session` cannot be used anyway.
        let Some(ttl) = session.expires_at.remaining() else {
            return Ok(());
        };
        self.cache()
            .execute(Insert(cache::Entry::new(
                cache::Key::revoked_session(session.id),
                json!(true),
                ttl,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> ExecutionError))?;

        LOG.info(
            "User logged out",
            &json!({
                "user_id": session.user_id.to_string(),
                "session_id": session.id.to_string(),
            }),
        );

        Ok(())
    }
}

/// Error of [`InvalidateUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Cache`] error.
    #[display("`Cache` operation failed: {_0}")]
    Cache(cache::Error),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{
            authorize_user_session, AuthorizeUserSession, Command as _,
            CreateUser, CreateUserSession,
        },
        domain::user,
        infra::{cache, database},
        Config, Service,
    };

    use super::InvalidateUserSession;

    #[tokio::test]
    async fn revoked_token_is_rejected() {
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
        let first = svc
            .execute(CreateUserSession::ByUserId(user.id))
            .await
            .unwrap();
        let second = svc
            .execute(CreateUserSession::ByUserId(user.id))
            .await
            .unwrap();

        svc.execute(InvalidateUserSession {
            session: first.session,
        })
        .await
        .unwrap();

        let err = svc
            .execute(AuthorizeUserSession { token: first.token })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            authorize_user_session::ExecutionError::SessionRevoked(id)
                if *id == first.session.id,
        ));
        assert!(
            svc.execute(AuthorizeUserSession { token: second.token })
                .await
                .is_ok(),
            "other sessions stay valid",
        );
    }
}
