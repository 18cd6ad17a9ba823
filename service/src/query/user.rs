//! [`Query`] collection related to a single [`User`].

use common::operations::{By, Insert, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{self, user, user::Session},
    infra::{cache, database, Cache, Database},
    read::{user::Row, User},
    Service,
};

use super::Query;

/// Queries a [`User`] by its [`user::Id`].
///
/// The [`User`] is read through the [`Cache`].
#[derive(Clone, Copy, Debug, From)]
pub struct ById(pub user::Id);

impl<Db, Ch> Query<ById> for Service<Db, Ch>
where
    Db: Database<
        Select<By<Option<domain::User>, user::Id>>,
        Ok = Option<domain::User>,
        Err = Traced<database::Error>,
    >,
    Ch: Cache<
            Select<By<Option<cache::Value>, cache::Key>>,
            Ok = Option<cache::Value>,
            Err = Traced<cache::Error>,
        > + Cache<Insert<cache::Entry>, Ok = (), Err = Traced<cache::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, ById(id): ById) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        cache::remember(
            self.cache(),
            cache::Key::user(id),
            Some(self.config().user_cache_ttl),
            vec![cache::Tag::users(), cache::Tag::user(id)],
            || async move {
                self.database()
                    .execute(Select(By::new(id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .and_then(|u| {
                        u.map(|u| User::from(Row::from(&u)))
                            .ok_or_else(|| tracerr::new!(E::UserNotExists(id)))
                    })
            },
        )
        .await
    }
}

/// Queries a [`User`] owning the provided authorized [`Session`].
///
/// Resolves to [`None`] if the [`User`] doesn't exist anymore.
#[derive(Clone, Copy, Debug, From)]
pub struct Authenticated(pub Session);

impl<Db, Ch> Query<Authenticated> for Service<Db, Ch>
where
    Self: Query<ById, Ok = User, Err = Traced<ExecutionError>>,
{
    type Ok = Option<User>;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        Authenticated(session): Authenticated,
    ) -> Result<Self::Ok, Self::Err> {
        match self
            .execute(ById(session.user_id))
            .await
            .map_err(tracerr::wrap!())
        {
            Ok(user) => Ok(Some(user)),
            Err(e) if matches!(e.as_ref(), ExecutionError::UserNotExists(_)) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Error of [`ById`] and [`Authenticated`] [`Query`] execution.
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
    use common::operations::{By, Select, Update};

    use crate::{
        command::{Command as _, CreateUser, CreateUserSession},
        domain::{self, user},
        infra::{cache, database, Database as _},
        Config, Query as _, Service,
    };

    use super::{Authenticated, ById, ExecutionError};

    async fn service_with_user(
    ) -> (Service<database::Memory, cache::Memory>, domain::User) {
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
        (svc, user)
    }

    #[tokio::test]
    async fn reads_through_cache() {
        let (svc, user) = service_with_user().await;

        let read = svc.execute(ById(user.id)).await.unwrap();
        assert_eq!(read.name, "Ann");

        // Bypasses the cache eviction done by commands.
        let mut renamed = svc
            .database()
            .execute(Select(By::<Option<domain::User>, _>::new(user.id)))
            .await
            .unwrap()
            .unwrap();
        renamed.name = user::Name::new("Anna").unwrap();
        svc.database().execute(Update(renamed)).await.unwrap();

        let cached = svc.execute(ById(user.id)).await.unwrap();
        assert_eq!(cached.name, "Ann");
    }

    #[tokio::test]
    async fn reports_missing_user() {
        let (svc, _) = service_with_user().await;

        let id = user::Id::new();
        let err = svc.execute(ById(id)).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::UserNotExists(missing) if *missing == id,
        ));
    }

    #[tokio::test]
    async fn resolves_session_owner() {
        let (svc, user) = service_with_user().await;
        let out = svc
            .execute(CreateUserSession::ByUserId(user.id))
            .await
            .unwrap();

        let me = svc.execute(Authenticated(out.session)).await.unwrap();
        assert_eq!(me.map(|u| u.id), Some(user.id));

        let mut orphan = out.session;
        orphan.user_id = user::Id::new();
        assert!(svc.execute(Authenticated(orphan)).await.unwrap().is_none());
    }
}
