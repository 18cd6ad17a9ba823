//! [`Command`] for creating a new [`User`].

use common::{
    operations::{By, Delete, Insert, Select},
    DateTime, Logger,
};
use derive_more::{Display, Error, From};
use secrecy::SecretBox;
use serde_json::json;
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{Email, Name, Password, Surname};
use crate::{
    domain::{user, User},
    infra::{cache, database, Cache, Database},
    Service,
};

use super::Command;

/// [`Logger`] of [`CreateUser`].
const LOG: Logger = Logger::for_module("User");

/// [`Command`] for creating a new [`User`].
#[derive(Clone, Debug)]
pub struct CreateUser {
    /// [`Name`] of a new [`User`].
    pub name: user::Name,

    /// [`Surname`] of a new [`User`], if any.
    pub surname: Option<user::Surname>,

    /// [`Email`] of a new [`User`].
    pub email: user::Email,

    /// [`Password`] of a new [`User`].
    pub password: SecretBox<user::Password>,
}

impl<Db, Ch> Command<CreateUser> for Service<Db, Ch>
where
    Db: for<'l> Database<
            Select<By<Option<User>, &'l user::Email>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Insert<User>, Ok = (), Err = Traced<database::Error>>,
    Ch: Cache<Delete<Vec<cache::Tag>>, Ok = bool, Err = Traced<cache::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateUser) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateUser {
            name,
            surname,
            email,
            password,
        } = cmd;

        let existing = self
            .database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if existing.is_some() {
            return Err(tracerr::new!(E::EmailOccupied(email)));
        }

        let user = User {
            id: user::Id::new(),
            name,
            surname,
            email,
            password_hash: user::PasswordHash::new(&password),
            profile_path: None,
            created_at: DateTime::now().coerce(),
            updated_at: None,
            deleted_at: None,
        };

        // Concurrent creation may pass the check above.
        if let Err(e) = self.database().execute(Insert(user.clone())).await {
            return Err(
                if e.as_ref().is_unique_violation(Some("users_email_key")) {
                    tracerr::new!(E::EmailOccupied(user.email))
                } else {
                    tracerr::map_from(e)
                },
            );
        }

        _ = self
            .cache()
            .execute(Delete(vec![cache::Tag::users()]))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        LOG.event(
            "User created",
            &json!({ "user_id": user.id.to_string() }),
        );

        Ok(user)
    }
}

/// Error of [`CreateUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Cache`] error.
    #[display("`Cache` operation failed: {_0}")]
    Cache(cache::Error),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`user::Email`] is already occupied.
    #[display("`{_0}` email is occupied")]
    #[from(ignore)]
    EmailOccupied(#[error(not(source))] user::Email),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::Command as _,
        domain::user,
        infra::{cache, database},
        Config, Service,
    };

    use super::{CreateUser, ExecutionError};

    fn cmd(email: &str) -> CreateUser {
        CreateUser {
            name: user::Name::new("Ann").unwrap(),
            surname: None,
            email: user::Email::new(email).unwrap(),
            password: user::Password::new("password123").unwrap().into_secret(),
        }
    }

    #[tokio::test]
    async fn creates_user() {
        let svc = Service::new(
            Config::new(b"secret"),
            database::Memory::default(),
            cache::Memory::default(),
        );

        let user = svc.execute(cmd("Ann@Example.com")).await.unwrap();
        assert_eq!(user.email.to_string(), "ann@example.com");
        assert!(user.updated_at.is_none());
    }

    #[tokio::test]
    async fn rejects_occupied_email() {
        let svc = Service::new(
            Config::new(b"secret"),
            database::Memory::default(),
            cache::Memory::default(),
        );
        drop(svc.execute(cmd("ann@example.com")).await.unwrap());

        let err = svc.execute(cmd("ANN@example.com")).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::EmailOccupied(_)));
    }
}
