//! [`Cache`]-related implementations.

pub mod memory;

use std::{future::Future, time::Duration};

use common::operations::{By, Insert, Select};
use derive_more::{AsRef, Display, Error as StdError, From, Into};
use serde::{de::DeserializeOwned, Serialize};
use tracerr::Traced;

use crate::domain::user;

pub use self::memory::Memory;

/// Cache operation.
pub use common::Handler as Cache;

/// Value stored in a [`Cache`].
pub type Value = serde_json::Value;

/// Key of a [`Value`] in a [`Cache`].
#[derive(AsRef, Clone, Debug, Display, Eq, From, Hash, Into, PartialEq)]
#[as_ref(str)]
#[from(String, &str)]
pub struct Key(String);

impl Key {
    /// Returns a [`Key`] of the cached [`user::Id`] row.
    #[must_use]
    pub fn user(id: user::Id) -> Self {
        Self(format!("user:{id}"))
    }

    /// Returns a [`Key`] marking the [`user::session::Id`] as revoked.
    #[must_use]
    pub fn revoked_session(id: user::session::Id) -> Self {
        Self(format!("session:revoked:{id}"))
    }
}

/// Tag grouping [`Value`]s in a [`Cache`] for bulk invalidation.
#[derive(AsRef, Clone, Debug, Display, Eq, From, Hash, Into, PartialEq)]
#[as_ref(str)]
#[from(String, &str)]
pub struct Tag(String);

impl Tag {
    /// Returns a [`Tag`] of all the cached users data.
    #[must_use]
    pub fn users() -> Self {
        Self("users".into())
    }

    /// Returns a [`Tag`] of the cached data of the [`user::Id`].
    #[must_use]
    pub fn user(id: user::Id) -> Self {
        Self(format!("user:{id}"))
    }
}

/// [`Value`] to be put into a [`Cache`].
#[derive(Clone, Debug)]
pub struct Entry {
    /// [`Key`] to put the [`Value`] under.
    pub key: Key,

    /// [`Value`] to put.
    pub value: Value,

    /// Time-to-live of the [`Value`].
    ///
    /// [`None`] means the [`Value`] never expires.
    pub ttl: Option<Duration>,

    /// [`Tag`]s of the [`Value`].
    pub tags: Vec<Tag>,
}

impl Entry {
    /// Creates a new [`Entry`] expiring after the provided `ttl`.
    #[must_use]
    pub fn new(key: Key, value: Value, ttl: Duration) -> Self {
        Self {
            key,
            value,
            ttl: Some(ttl),
            tags: vec![],
        }
    }

    /// Creates a new [`Entry`] never expiring.
    #[must_use]
    pub fn forever(key: Key, value: Value) -> Self {
        Self {
            key,
            value,
            ttl: None,
            tags: vec![],
        }
    }

    /// Tags this [`Entry`] with the provided [`Tag`]s.
    #[must_use]
    pub fn tagged(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }
}

/// Atomic change of an integer [`Value`] in a [`Cache`].
///
/// A missing [`Value`] is treated as `0`.
#[derive(Clone, Debug)]
pub struct Increment {
    /// [`Key`] of the [`Value`] to change.
    pub key: Key,

    /// Amount to add to the [`Value`].
    pub by: i64,
}

impl Increment {
    /// Creates a new [`Increment`] adding `by` to the [`Value`].
    #[must_use]
    pub fn by(key: Key, by: i64) -> Self {
        Self { key, by }
    }

    /// Creates a new [`Increment`] subtracting `by` from the [`Value`].
    #[must_use]
    pub fn decrement(key: Key, by: i64) -> Self {
        Self { key, by: -by }
    }
}

/// [`Cache`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// [`Value`] is not an integer, so cannot be incremented.
    #[display("Cached value under `{_0}` key is not an integer")]
    #[from(ignore)]
    NotInteger(#[error(not(source))] Key),

    /// [`Value`] cannot be converted to or from a typed value.
    #[display("Failed to (de)serialize cached value: {_0}")]
    Serde(serde_json::Error),
}

/// Returns the typed [`Value`] cached under the provided [`Key`], or computes,
/// caches (with the `ttl` and `tags`) and returns it if there is none.
///
/// `compute` is called at most once per call. Concurrent calls missing the
/// same [`Key`] compute independently, and the last write wins.
///
/// # Errors
///
/// If the [`Cache`] fails, or the `compute` fails. Nothing is cached in the
/// latter case.
pub async fn remember<C, T, E, F, Fut>(
    cache: &C,
    key: Key,
    ttl: Option<Duration>,
    tags: Vec<Tag>,
    compute: F,
) -> Result<T, Traced<E>>
where
    C: Cache<
            Select<By<Option<Value>, Key>>,
            Ok = Option<Value>,
            Err = Traced<Error>,
        > + Cache<Insert<Entry>, Ok = (), Err = Traced<Error>>,
    T: Serialize + DeserializeOwned,
    E: From<Error>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, Traced<E>>>,
{
    if let Some(cached) = cache
        .execute(Select(By::new(key.clone())))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))?
    {
        return serde_json::from_value(cached)
            .map_err(Error::from)
            .map_err(tracerr::from_and_wrap!(=> E));
    }

    let computed = compute().await.map_err(tracerr::wrap!())?;

    let value = serde_json::to_value(&computed)
        .map_err(Error::from)
        .map_err(tracerr::from_and_wrap!(=> E))?;
    cache
        .execute(Insert(Entry {
            key,
            value,
            ttl,
            tags,
        }))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))?;

    Ok(computed)
}
