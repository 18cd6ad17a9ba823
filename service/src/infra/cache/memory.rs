//! In-process [`Cache`] implementation.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use common::operations::{By, Delete, Exists, Flush, Insert, Select, Update};
use tokio::{sync::RwLock, time::Instant};
use tracerr::Traced;

use super::{Cache, Entry, Error, Increment, Key, Tag, Value};

/// In-process [`Cache`] keeping [`Value`]s in memory.
///
/// Expired [`Value`]s are never returned, and are evicted on every write.
#[derive(Clone, Debug, Default)]
pub struct Memory(Arc<RwLock<State>>);

/// Contents of a [`Memory`] cache.
#[derive(Debug, Default)]
struct State {
    /// Stored [`Value`]s by their [`Key`]s.
    entries: HashMap<Key, Stored>,

    /// [`Key`]s tagged with a [`Tag`].
    tags: HashMap<Tag, HashSet<Key>>,
}

/// [`Value`] stored in a [`Memory`] cache.
#[derive(Debug)]
struct Stored {
    /// Stored [`Value`].
    value: Value,

    /// [`Instant`] this [`Stored`] value expires at, if ever.
    expires_at: Option<Instant>,

    /// [`Tag`]s of this [`Stored`] value.
    tags: Vec<Tag>,
}

impl Stored {
    /// Indicates whether this [`Stored`] value is still alive at `now`.
    fn is_alive(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

impl State {
    /// Returns the alive [`Value`] under the provided [`Key`].
    fn get(&self, key: &Key, now: Instant) -> Option<&Value> {
        self.entries
            .get(key)
            .filter(|s| s.is_alive(now))
            .map(|s| &s.value)
    }

    /// Puts the provided [`Entry`], replacing any previous one.
    fn put(&mut self, entry: Entry, now: Instant) {
        let Entry {
            key,
            value,
            ttl,
            tags,
        } = entry;

        self.evict_expired(now);
        drop(self.remove(&key));
        for tag in &tags {
            _ = self.tags.entry(tag.clone()).or_default().insert(key.clone());
        }
        _ = self.entries.insert(
            key,
            Stored {
                value,
                expires_at: ttl.map(|ttl| now + ttl),
                tags,
            },
        );
    }

    /// Removes all the [`Stored`] values expired at `now`.
    fn evict_expired(&mut self, now: Instant) {
        let expired = self
            .entries
            .iter()
            .filter(|(_, s)| !s.is_alive(now))
            .map(|(k, _)| k.clone())
            .collect::<Vec<_>>();
        for k in &expired {
            drop(self.remove(k));
        }
    }

    /// Removes the [`Stored`] value under the provided [`Key`] along with its
    /// [`Tag`] links.
    fn remove(&mut self, key: &Key) -> Option<Stored> {
        let stored = self.entries.remove(key)?;
        for tag in &stored.tags {
            if let Some(keys) = self.tags.get_mut(tag) {
                _ = keys.remove(key);
                if keys.is_empty() {
                    _ = self.tags.remove(tag);
                }
            }
        }
        Some(stored)
    }
}

impl Cache<Select<By<Option<Value>, Key>>> for Memory {
    type Ok = Option<Value>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Value>, Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let key = by.into_inner();
        Ok(self.0.read().await.get(&key, Instant::now()).cloned())
    }
}

impl Cache<Select<By<HashMap<Key, Value>, Vec<Key>>>> for Memory {
    type Ok = HashMap<Key, Value>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<Key, Value>, Vec<Key>>>,
    ) -> Result<Self::Ok, Self::Err> {
        let now = Instant::now();
        let state = self.0.read().await;
        Ok(by
            .into_inner()
            .into_iter()
            .filter_map(|k| {
                let v = state.get(&k, now)?.clone();
                Some((k, v))
            })
            .collect())
    }
}

impl Cache<Exists<Key>> for Memory {
    type Ok = bool;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Exists(key): Exists<Key>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.0.read().await.get(&key, Instant::now()).is_some())
    }
}

impl Cache<Insert<Entry>> for Memory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Insert(entry): Insert<Entry>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.write().await.put(entry, Instant::now());
        Ok(())
    }
}

impl Cache<Insert<Vec<Entry>>> for Memory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Insert(entries): Insert<Vec<Entry>>,
    ) -> Result<Self::Ok, Self::Err> {
        let now = Instant::now();
        let mut state = self.0.write().await;
        for e in entries {
            state.put(e, now);
        }
        Ok(())
    }
}

impl Cache<Delete<Key>> for Memory {
    type Ok = bool;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Delete(key): Delete<Key>,
    ) -> Result<Self::Ok, Self::Err> {
        let now = Instant::now();
        Ok(self
            .0
            .write()
            .await
            .remove(&key)
            .is_some_and(|s| s.is_alive(now)))
    }
}

impl Cache<Delete<Vec<Key>>> for Memory {
    type Ok = bool;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Delete(keys): Delete<Vec<Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let now = Instant::now();
        let mut state = self.0.write().await;
        Ok(keys.iter().fold(false, |removed, k| {
            state.remove(k).is_some_and(|s| s.is_alive(now)) || removed
        }))
    }
}

impl Cache<Delete<Vec<Tag>>> for Memory {
    type Ok = bool;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Delete(tags): Delete<Vec<Tag>>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.0.write().await;
        let keys = tags
            .iter()
            .filter_map(|t| state.tags.remove(t))
            .flatten()
            .collect::<HashSet<_>>();
        for k in &keys {
            drop(state.remove(k));
        }
        Ok(!keys.is_empty())
    }
}

impl Cache<Flush> for Memory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(&self, _: Flush) -> Result<Self::Ok, Self::Err> {
        let mut state = self.0.write().await;
        state.entries.clear();
        state.tags.clear();
        Ok(())
    }
}

impl Cache<Update<Increment>> for Memory {
    type Ok = i64;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Update(inc): Update<Increment>,
    ) -> Result<Self::Ok, Self::Err> {
        let Increment { key, by } = inc;
        let now = Instant::now();
        let mut state = self.0.write().await;

        if let Some(stored) =
            state.entries.get_mut(&key).filter(|s| s.is_alive(now))
        {
            let current = stored
                .value
                .as_i64()
                .ok_or_else(|| Error::NotInteger(key.clone()))
                .map_err(tracerr::wrap!())?;
            let next = current.saturating_add(by);
            stored.value = next.into();
            return Ok(next);
        }

        state.put(Entry::forever(key, by.into()), now);
        Ok(by)
    }
}

#[cfg(test)]
mod spec {
    use std::{collections::HashMap, time::Duration};

    use common::operations::{
        By, Delete, Exists, Flush, Insert, Select, Update,
    };
    use serde_json::json;
    use tracerr::Traced;

    use crate::{
        domain::user,
        infra::cache::{self, Cache as _, Entry, Increment, Key, Tag, Value},
    };

    use super::Memory;

    async fn get(cache: &Memory, key: &str) -> Option<Value> {
        cache
            .execute(Select(By::<Option<Value>, _>::new(Key::from(key))))
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn expires_after_ttl() {
        let cache = Memory::default();
        cache
            .execute(Insert(Entry::new(
                "a".into(),
                json!(1),
                Duration::from_secs(60),
            )))
            .await
            .unwrap();
        cache
            .execute(Insert(Entry::forever("b".into(), json!(2))))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(get(&cache, "a").await, Some(json!(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(get(&cache, "a").await, None);
        assert!(!cache.execute(Exists(Key::from("a"))).await.unwrap());
        assert_eq!(get(&cache, "b").await, Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn evicts_expired_entries_on_write() {
        let cache = Memory::default();
        cache
            .execute(Insert(
                (0..1000)
                    .map(|i| {
                        Entry::new(
                            Key::from(format!("revoked:{i}")),
                            json!(true),
                            Duration::from_secs(1),
                        )
                        .tagged([Tag::users()])
                    })
                    .collect::<Vec<_>>(),
            ))
            .await
            .unwrap();
        cache
            .execute(Insert(Entry::forever("kept".into(), json!(1))))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(3600)).await;
        cache
            .execute(Insert(Entry::forever("fresh".into(), json!(2))))
            .await
            .unwrap();

        let state = cache.0.read().await;
        assert_eq!(state.entries.len(), 2);
        assert!(state.tags.is_empty());
    }

    #[tokio::test]
    async fn bulk_operations() {
        let cache = Memory::default();
        cache
            .execute(Insert(vec![
                Entry::forever("a".into(), json!("x")),
                Entry::forever("b".into(), json!("y")),
            ]))
            .await
            .unwrap();

        let many = cache
            .execute(Select(By::<HashMap<_, _>, _>::new(vec![
                Key::from("a"),
                Key::from("b"),
                Key::from("c"),
            ])))
            .await
            .unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[&Key::from("b")], json!("y"));

        assert!(cache.execute(Delete(Key::from("a"))).await.unwrap());
        assert!(!cache.execute(Delete(Key::from("a"))).await.unwrap());
        assert!(cache
            .execute(Delete(vec![Key::from("a"), Key::from("b")]))
            .await
            .unwrap());

        cache
            .execute(Insert(Entry::forever("c".into(), json!(3))))
            .await
            .unwrap();
        cache.execute(Flush).await.unwrap();
        assert_eq!(get(&cache, "c").await, None);
    }

    #[tokio::test]
    async fn invalidates_by_tags() {
        let cache = Memory::default();
        let id = user::Id::new();
        cache
            .execute(Insert(
                Entry::forever(Key::user(id), json!({}))
                    .tagged([Tag::users(), Tag::user(id)]),
            ))
            .await
            .unwrap();
        cache
            .execute(Insert(
                Entry::forever("list".into(), json!([])).tagged([Tag::users()]),
            ))
            .await
            .unwrap();
        cache
            .execute(Insert(Entry::forever("other".into(), json!(0))))
            .await
            .unwrap();

        assert!(cache.execute(Delete(vec![Tag::user(id)])).await.unwrap());
        assert_eq!(get(&cache, &Key::user(id).to_string()).await, None);
        assert!(get(&cache, "list").await.is_some());

        assert!(cache.execute(Delete(vec![Tag::users()])).await.unwrap());
        assert!(!cache.execute(Delete(vec![Tag::users()])).await.unwrap());
        assert_eq!(get(&cache, "list").await, None);
        assert!(get(&cache, "other").await.is_some());
    }

    #[tokio::test]
    async fn increments_and_decrements() {
        let cache = Memory::default();
        let key = Key::from("hits");

        let n = cache
            .execute(Update(Increment::by(key.clone(), 2)))
            .await
            .unwrap();
        assert_eq!(n, 2);
        let n = cache
            .execute(Update(Increment::decrement(key.clone(), 5)))
            .await
            .unwrap();
        assert_eq!(n, -3);

        cache
            .execute(Insert(Entry::forever("text".into(), json!("x"))))
            .await
            .unwrap();
        let err = cache
            .execute(Update(Increment::by("text".into(), 1)))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), cache::Error::NotInteger(_)));
    }

    #[tokio::test]
    async fn remembers_computed_value() {
        let cache = Memory::default();
        let key = Key::from("answer");

        let v: u32 = cache::remember(&cache, key.clone(), None, vec![], || async {
            Ok::<_, Traced<cache::Error>>(42)
        })
        .await
        .unwrap();
        assert_eq!(v, 42);

        let v: u32 = cache::remember(&cache, key, None, vec![], || async {
            Err(tracerr::new!(cache::Error::NotInteger("computed".into())))
        })
        .await
        .unwrap();
        assert_eq!(v, 42);
    }

    #[tokio::test]
    async fn does_not_remember_failures() {
        let cache = Memory::default();
        let key = Key::from("failing");

        let res: Result<u32, _> =
            cache::remember(&cache, key.clone(), None, vec![], || async {
                Err(tracerr::new!(cache::Error::NotInteger("x".into())))
            })
            .await;
        assert!(res.is_err());
        assert!(!cache.execute(Exists(key)).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_misses_both_compute_and_last_write_wins() {
        let cache = Memory::default();
        let key = Key::from("race");

        let (a, b) = tokio::join!(
            cache::remember(&cache, key.clone(), None, vec![], || async {
                tokio::task::yield_now().await;
                Ok::<_, Traced<cache::Error>>(1_u8)
            }),
            cache::remember(&cache, key.clone(), None, vec![], || async {
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                Ok::<_, Traced<cache::Error>>(2_u8)
            }),
        );
        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert_eq!(get(&cache, "race").await, Some(json!(2)));
    }
}
