//! [`Command`] for creating a [`Session`].

use common::{
    log::Channel,
    operations::{By, Select},
    DateTime, Logger,
};
use derive_more::{Display, Error, From};
use secrecy::SecretBox;
use serde_json::json;
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{session::Token, Email, Password};
use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Logger`] of [`CreateUserSession`].
const LOG: Logger = Logger::for_module("Auth").with_channel(Channel::Security);

/// [`Command`] for creating a [`Session`].
#[derive(Clone, Debug, From)]
pub enum CreateUserSession {
    /// Create a new [`Session`] by [`User`] credentials.
    ByCredentials {
        /// [`Email`] of a [`User`].
        email: user::Email,

        /// [`Password`] of a [`User`].
        password: SecretBox<user::Password>,
    },

    /// Create a new [`Session`] by [`User`] ID.
    ByUserId(user::Id),
}

/// Output of [`CreateUserSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`Token`] of the created [`Session`].
    pub token: session::Token,

    /// Created [`Session`] itself.
    pub session: Session,

    /// [`User`] whose [`Session`] has been created.
    pub user: User,
}

impl<Db, Ch> Command<CreateUserSession> for Service<Db, Ch>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + for<'l> Database<
            Select<By<Option<User>, &'l user::Email>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use CreateUserSession as Cmd;
        use ExecutionError as E;

        let user = match cmd {
            Cmd::ByCredentials { email, password } => {
                let user = self
                    .database()
                    .execute(Select(By::new(&email)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .filter(|u| u.password_hash.verify(&password));
                let Some(user) = user else {
                    LOG.warning(
                        "Failed login attempt",
                        &json!({ "email": email.to_string() }),
                    );
                    return Err(tracerr::new!(E::WrongCredentials));
                };
                user
            }
            Cmd::ByUserId(user_id) => self
                .database()
                .execute(Select(By::new(user_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or_else(|| E::UserNotExists(user_id))
                .map_err(tracerr::wrap!())?,
        };

        let session = Session {
            id: session::Id::new(),
            user_id: user.id,
            expires_at: (DateTime::now() + self.config().session_ttl)
                .trunc_to_seconds()
                .coerce(),
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &session,
            &self.config().jwt_encoding_key,
        )
        .map_err(tracerr::from_and_wrap!(=> E))?;

        // SAFETY: `jsonwebtoken::encode` always returns a valid
        //         `session::Token`.
        #[expect(unsafe_code, reason = "invariants are preserved")]
        let token = unsafe { session::Token::new_unchecked(token) };

        LOG.info(
            "User logged in",
            &json!({
                "user_id": user.id.to_string(),
                "session_id": session.id.to_string(),
            }),
        );

        Ok(Output {
            token,
            session,
            user,
        })
    }
}

/// Error of [`CreateUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] encoding error.
    #[display("Failed to encode a JSON Web Token: {_0}")]
    JsonWebTokenEncodeError(jsonwebtoken::errors::Error),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),

    /// [`CreateUserSession::ByCredentials`] contains wrong credentials.
    #[display("Wrong `User` credentials")]
    WrongCredentials,
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{Command as _, CreateUser},
        domain::user,
        infra::{cache, database},
        Config, Service,
    };

    use super::{CreateUserSession, ExecutionError};

    async fn service_with_user(
    ) -> (Service<database::Memory, cache::Memory>, user::Id) {
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
        (svc, user.id)
    }

    fn credentials(email: &str, password: &str) -> CreateUserSession {
        CreateUserSession::ByCredentials {
            email: user::Email::new(email).unwrap(),
            password: user::Password::new(password).unwrap().into_secret(),
        }
    }

    #[tokio::test]
    async fn logs_in_with_valid_credentials() {
        let (svc, id) = service_with_user().await;

        let out = svc
            .execute(credentials("ANN@example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(out.user.id, id);
        assert_eq!(out.session.user_id, id);
        assert!(out.session.expires_at.remaining().is_some());
        assert_eq!(
            out.session.expires_at,
            out.session.expires_at.trunc_to_seconds(),
        );
        assert!(!out.token.as_ref().is_empty());
    }

    #[tokio::test]
    async fn rejects_wrong_credentials() {
        let (svc, _) = service_with_user().await;

        for cmd in [
            credentials("ann@example.com", "password321"),
            credentials("bob@example.com", "password123"),
        ] {
            let err = svc.execute(cmd).await.unwrap_err();
            assert!(matches!(err.as_ref(), ExecutionError::WrongCredentials));
        }
    }

    #[tokio::test]
    async fn issues_distinct_sessions() {
        let (svc, id) = service_with_user().await;

        let first = svc.execute(CreateUserSession::ByUserId(id)).await.unwrap();
        let second = svc.execute(CreateUserSession::ByUserId(id)).await.unwrap();
        assert_ne!(first.session.id, second.session.id);
        assert_ne!(first.token, second.token);

        let missing = user::Id::new();
        let err = svc
            .execute(CreateUserSession::ByUserId(missing))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::UserNotExists(id) if *id == missing,
        ));
    }
}
