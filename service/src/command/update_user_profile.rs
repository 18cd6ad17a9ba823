//! [`Command`] for updating a profile of a [`User`].

use common::{
    operations::{By, Commit, Delete, Lock, Select, Transact, Transacted, Update},
    DateTime, Logger,
};
use derive_more::{Display, Error, From};
use serde_json::json;
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{Name, ProfilePath, Surname};
use crate::{
    domain::{user, User},
    infra::{cache, database, Cache, Database},
    Service,
};

use super::Command;

/// [`Logger`] of [`UpdateUserProfile`].
const LOG: Logger = Logger::for_module("User");

/// [`Command`] for updating a profile of a [`User`].
///
/// Only the provided fields are changed.
#[derive(Clone, Debug)]
pub struct UpdateUserProfile {
    /// ID of the [`User`] to update.
    pub user_id: user::Id,

    /// New [`Name`] of the [`User`].
    pub name: Option<user::Name>,

    /// New [`Surname`] of the [`User`].
    pub surname: Option<user::Surname>,

    /// New [`ProfilePath`] of the [`User`].
    pub profile_path: Option<user::ProfilePath>,
}

impl<Db, Ch> Command<UpdateUserProfile> for Service<Db, Ch>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<User, user::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Update<User>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
    Ch: Cache<Delete<cache::Key>, Ok = bool, Err = Traced<cache::Error>>
        + Cache<Delete<Vec<cache::Tag>>, Ok = bool, Err = Traced<cache::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateUserProfile,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateUserProfile {
            user_id,
            name,
            surname,
            profile_path,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent actions upon the same `User`.
        tx.execute(Lock(By::new(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let mut user = tx
            .execute(Select(By::<Option<User>, _>::new(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(user_id))
            .map_err(tracerr::wrap!())?;

        let mut changed = vec![];
        if let Some(name) = name.filter(|n| *n != user.name) {
            user.name = name;
            changed.push("name");
        }
        if let Some(surname) =
            surname.filter(|s| user.surname.as_ref() != Some(s))
        {
            user.surname = Some(surname);
            changed.push("surname");
        }
        if let Some(path) =
            profile_path.filter(|p| user.profile_path.as_ref() != Some(p))
        {
            user.profile_path = Some(path);
            changed.push("profile_path");
        }
        if changed.is_empty() {
            return Ok(user);
        }

        user.updated_at = Some(DateTime::now().coerce());
        tx.execute(Update(user.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        _ = self
            .cache()
            .execute(Delete(cache::Key::user(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        _ = self
            .cache()
            .execute(Delete(vec![cache::Tag::user(user_id)]))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        LOG.event(
            "User profile updated",
            &json!({ "user_id": user_id.to_string(), "fields": changed }),
        );

        Ok(user)
    }
}

/// Error of [`UpdateUserProfile`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Cache`] error.
    #[display("`Cache` operation failed: {_0}")]
    Cache(cache::Error),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::operations::{Exists, Insert};
    use serde_json::json;

    use crate::{
        command::{Command as _, CreateUser},
        domain::user,
        infra::{cache, database, Cache as _},
        Config, Service,
    };

    use super::{ExecutionError, UpdateUserProfile};

    fn update(user_id: user::Id) -> UpdateUserProfile {
        UpdateUserProfile {
            user_id,
            name: None,
            surname: None,
            profile_path: None,
        }
    }

    #[tokio::test]
    async fn updates_only_provided_fields() {
        let svc = Service::new(
            Config::new(b"secret"),
            database::Memory::default(),
            cache::Memory::default(),
        );
        let user = svc
            .execute(CreateUser {
                name: user::Name::new("Ann").unwrap(),
                surname: Some(user::Surname::new("Lee").unwrap()),
                email: user::Email::new("ann@example.com").unwrap(),
                password: user::Password::new("password123")
                    .unwrap()
                    .into_secret(),
            })
            .await
            .unwrap();

        let unchanged = svc.execute(update(user.id)).await.unwrap();
        assert!(unchanged.updated_at.is_none());

        let updated = svc
            .execute(UpdateUserProfile {
                name: Some(user::Name::new("Anna").unwrap()),
                ..update(user.id)
            })
            .await
            .unwrap();
        assert_eq!(updated.name.to_string(), "Anna");
        assert_eq!(updated.surname, user.surname);
        assert!(updated.updated_at.is_some());
    }

    #[tokio::test]
    async fn evicts_cached_user() {
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
        svc.cache()
            .execute(Insert(
                cache::Entry::forever(cache::Key::user(user.id), json!({}))
                    .tagged([cache::Tag::user(user.id)]),
            ))
            .await
            .unwrap();

        drop(
            svc.execute(UpdateUserProfile {
                profile_path: Some(user::ProfilePath::new("a.png").unwrap()),
                ..update(user.id)
            })
            .await
            .unwrap(),
        );

        let cached = svc
            .cache()
            .execute(Exists(cache::Key::user(user.id)))
            .await
            .unwrap();
        assert!(!cached);
    }

    #[tokio::test]
    async fn fails_for_missing_user() {
        let svc = Service::new(
            Config::new(b"secret"),
            database::Memory::default(),
            cache::Memory::default(),
        );

        let id = user::Id::new();
        let err = svc.execute(update(id)).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::UserNotExists(missing) if *missing == id,
        ));
    }
}
