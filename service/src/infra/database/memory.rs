//! In-process [`Database`] implementation.

use std::{collections::HashMap, sync::Arc};

use common::operations::{By, Commit, Insert, Lock, Select, Transact, Update};
use derive_more::{Display, Error as StdError};
use tokio::sync::RwLock;
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{database, Database},
    read::user::{list::rows, Row},
};

/// In-process [`Database`] keeping everything in memory.
///
/// [`Transact`]ions are not isolated: every change is visible immediately
/// and [`Commit`] does nothing.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// Stored [`User`]s.
    users: Arc<RwLock<HashMap<user::Id, User>>>,
}

/// [`Memory`] database error.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// Unique constraint is violated.
    #[display("Unique constraint `{_0}` is violated")]
    UniqueViolation(#[error(not(source))] &'static str),
}

impl Error {
    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::UniqueViolation(c) => constraint.map_or(true, |x| x == *c),
        }
    }
}

impl Database<Transact> for Memory {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl Database<Lock<By<User, user::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<User, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl Database<Select<By<Option<User>, user::Id>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .users
            .read()
            .await
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }
}

impl<'e> Database<Select<By<Option<User>, &'e user::Email>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'e user::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.deleted_at.is_none() && &u.email == email)
            .cloned())
    }
}

impl Database<Insert<User>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.email == user.email && u.id != user.id)
        {
            return Err(tracerr::new!(database::Error::from(
                Error::UniqueViolation("users_email_key")
            )));
        }
        drop(users.insert(user.id, user));
        Ok(())
    }
}

impl Database<Update<User>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(user): Update<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Insert(user)).await.map_err(tracerr::wrap!())
    }
}

impl Database<Select<By<rows::Page, rows::Selector>>> for Memory {
    type Ok = rows::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<rows::Page, rows::Selector>>,
    ) -> Result<Self::Ok, Self::Err> {
        let rows::Selector {
            arguments,
            filter: criteria,
        } = by.into_inner();
        let order_by = criteria.order_by();

        let mut edges = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.deleted_at.is_none())
            .map(Row::from)
            .filter(|r| criteria.matches(r))
            .map(|r| (order_by.position(&r), r))
            .collect::<Vec<_>>();
        edges.sort_by(|(a, _), (b, _)| order_by.compare(a, b));

        let edges = edges
            .into_iter()
            .skip_while(|(pos, _)| {
                arguments
                    .cursor()
                    .is_some_and(|after| order_by.compare(pos, after).is_le())
            })
            .take(arguments.limit().saturating_add(1));

        Ok(rows::Page::from_overfetched(&arguments, edges))
    }
}
