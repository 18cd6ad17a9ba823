//! [`Command`] for authorizing a [`User`].

use common::{
    log::Channel,
    operations::{By, Exists, Select},
    Logger,
};
use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use serde_json::json;
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{cache, database, Cache, Database},
    Service,
};

use super::Command;

/// [`Logger`] of [`AuthorizeUserSession`].
const LOG: Logger = Logger::for_module("Auth").with_channel(Channel::Security);

/// [`Command`] for authorizing a [`User`].
#[derive(Clone, Debug, From)]
pub struct AuthorizeUserSession {
    /// [`Session`] token to authorize.
    pub token: session::Token,
}

impl<Db, Ch> Command<AuthorizeUserSession> for Service<Db, Ch>
where
    Db: Database<
        Select<By<Option<User>, user::Id>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
    Ch: Cache<Exists<cache::Key>, Ok = bool, Err = Traced<cache::Error>>,
{
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeUserSession { token } = cmd;

        let session = jsonwebtoken::decode::<Session>(
            token.as_ref(),
            &self.config().jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(tracerr::from_and_wrap!(=> E))?
        .claims;

        let revoked = self
            .cache()
            .execute(Exists(cache::Key::revoked_session(session.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if revoked {
            LOG.warning(
                "Revoked session used",
                &json!({ "session_id": session.id.to_string() }),
            );
            return Err(tracerr::new!(E::SessionRevoked(session.id)));
        }

        drop(
            self.database()
                .execute(Select(By::new(session.user_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or_else(|| E::UserNotExists(session.user_id))
                .map_err(tracerr::wrap!())?,
        );

        Ok(session)
    }
}

/// Error of [`AuthorizeUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Cache`] error.
    #[display("`Cache` operation failed: {_0}")]
    Cache(cache::Error),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),

    /// [`Session`] has been invalidated.
    #[display("`Session(id: {_0})` has been revoked")]
    #[from(ignore)]
    SessionRevoked(#[error(not(source))] session::Id),

    /// [`User`] the [`Session`] belongs to does not exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use crate::{
        command::{Command as _, CreateUser, CreateUserSession},
        domain::user::{self, session},
        infra::{cache, database},
        Config, Service,
    };

    use super::{AuthorizeUserSession, ExecutionError};

    #[tokio::test]
    async fn authorizes_issued_token() {
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
        let out = svc
            .execute(CreateUserSession::ByUserId(user.id))
            .await
            .unwrap();

        let session = svc
            .execute(AuthorizeUserSession { token: out.token })
            .await
            .unwrap();
        assert_eq!(session, out.session);
    }

    #[tokio::test]
    async fn rejects_foreign_tokens() {
        let issuer = Service::new(
            Config::new(b"other"),
            database::Memory::default(),
            cache::Memory::default(),
        );
        let user = issuer
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
        let out = issuer
            .execute(CreateUserSession::ByUserId(user.id))
            .await
            .unwrap();

        let svc = Service::new(
            Config::new(b"secret"),
            database::Memory::default(),
            cache::Memory::default(),
        );
        for token in [out.token, session::Token::from_str("garbage").unwrap()] {
            let err = svc
                .execute(AuthorizeUserSession { token })
                .await
                .unwrap_err();
            assert!(matches!(
                err.as_ref(),
                ExecutionError::JsonWebTokenDecodeError(_),
            ));
        }
    }
}
