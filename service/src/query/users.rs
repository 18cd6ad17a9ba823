//! [`Query`] collection related to the multiple [`User`]s.

use std::time::Instant;

use common::{
    operations::{By, Insert, Select},
    Logger,
};
use derive_more::{Display, Error, From};
use serde_json::json;
use tracerr::Traced;

use crate::{
    infra::{cache, database, Cache, Database},
    read::{
        user::list::{
            self, rows, Criteria, Cursor, CursorError, SearchCriteria,
            SortCriteria,
        },
        User,
    },
    Service,
};

use super::Query;

/// [`Logger`] of [`CursorPaginated`].
const LOG: Logger = Logger::for_module("User");

/// Queries a [`list::Page`] of [`User`]s with keyset pagination.
///
/// Every [`User`] of the [`list::Page`] is read through the [`Cache`], so it
/// may be stale up to [`Config::user_cache_ttl`].
///
/// [`Config::user_cache_ttl`]: crate::Config::user_cache_ttl
#[derive(Clone, Debug)]
pub struct CursorPaginated {
    /// [`Cursor`] returned by the previous [`list::Page`], if any.
    pub cursor: Option<String>,

    /// Maximum number of [`User`]s in the [`list::Page`].
    pub page_size: i32,

    /// [`SearchCriteria`] to filter [`User`]s with.
    pub search: Option<SearchCriteria>,

    /// [`SortCriteria`] to order [`User`]s by.
    pub sort: Option<SortCriteria>,
}

impl Default for CursorPaginated {
    fn default() -> Self {
        Self {
            cursor: None,
            page_size: list::DEFAULT_PAGE_SIZE,
            search: None,
            sort: None,
        }
    }
}

impl<Db, Ch> Query<CursorPaginated> for Service<Db, Ch>
where
    Db: Database<
        Select<By<rows::Page, rows::Selector>>,
        Ok = rows::Page,
        Err = Traced<database::Error>,
    >,
    Ch: Cache<
            Select<By<Option<cache::Value>, cache::Key>>,
            Ok = Option<cache::Value>,
            Err = Traced<cache::Error>,
        > + Cache<Insert<cache::Entry>, Ok = (), Err = Traced<cache::Error>>,
{
    type Ok = list::Page;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        query: CursorPaginated,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CursorPaginated {
            cursor,
            page_size,
            search,
            sort,
        } = query;

        LOG.debug(
            "Listing users",
            &json!({
                "cursor": cursor,
                "page_size": page_size,
                "search": search.as_ref().map(|s| json!({
                    "term": s.term(),
                    "columns": s.columns(),
                })),
                "sort": sort.as_ref().map(SortCriteria::sorts),
            }),
        );
        let started = Instant::now();

        let criteria = Criteria::new(search, sort.as_ref());
        let position = cursor
            .as_deref()
            .map(|c| Cursor::decode(c).and_then(|c| criteria.seek(c)))
            .transpose()
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let arguments = rows::Arguments::new(page_size, position)
            .ok_or(E::InvalidPageSize(page_size))
            .map_err(tracerr::wrap!())?;

        let rows = self
            .database()
            .execute(Select(By::new(rows::Selector {
                arguments,
                filter: criteria.clone(),
            })))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let ttl = self.config().user_cache_ttl;
        let mut edges = Vec::with_capacity(rows.edges.len());
        for rows::Edge {
            cursor: position,
            node: row,
        } in rows.edges
        {
            let id = row.id;
            let user = cache::remember(
                self.cache(),
                cache::Key::user(id),
                Some(ttl),
                vec![cache::Tag::users(), cache::Tag::user(id)],
                || async move { Ok::<_, Traced<E>>(User::from(row)) },
            )
            .await?;
            edges.push((criteria.cursor(position), user));
        }
        let page = list::Page::new(edges, rows.has_more);

        LOG.info(
            "Users listed",
            &json!({
                "duration_ms": u64::try_from(started.elapsed().as_millis())
                    .unwrap_or(u64::MAX),
                "count": page.edges.len(),
                "has_more": page.has_more,
            }),
        );

        Ok(page)
    }
}

/// Error of [`CursorPaginated`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Cache`] error.
    #[display("`Cache` operation failed: {_0}")]
    Cache(cache::Error),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Cursor`] cannot be used.
    #[display("Invalid cursor: {_0}")]
    InvalidCursor(CursorError),

    /// Requested page size is not positive.
    #[display("Page size must be positive, but `{_0}` requested")]
    #[from(ignore)]
    InvalidPageSize(#[error(not(source))] i32),
}

#[cfg(test)]
mod spec {
    use std::{collections::HashSet, time::Duration};

    use common::{
        operations::{By, Insert, Select, Update},
        pagination::Order,
        DateTime,
    };

    use crate::{
        domain::{self, user},
        infra::{cache, database, Database as _},
        read::user::list::{Column, SearchCriteria, Sort, SortCriteria},
        Config, Query as _, Service,
    };

    use super::{CursorPaginated, ExecutionError};

    type Svc = Service<database::Memory, cache::Memory>;

    fn service() -> Svc {
        Service::new(
            Config::new(b"secret"),
            database::Memory::default(),
            cache::Memory::default(),
        )
    }

    /// Stores [`domain::User`]s with the provided names and surnames,
    /// created at the provided UNIX timestamps.
    async fn seed(
        svc: &Svc,
        users: impl IntoIterator<Item = (&str, Option<&str>, i64)>,
    ) -> Vec<user::Id> {
        let hash = user::PasswordHash::new(
            &user::Password::new("password123").unwrap().into_secret(),
        );
        let mut ids = vec![];
        for (name, surname, created_at) in users {
            let id = user::Id::new();
            let user = domain::User {
                id,
                name: user::Name::new(name).unwrap(),
                surname: surname.map(|s| user::Surname::new(s).unwrap()),
                email: user::Email::new(format!("{id}@example.com")).unwrap(),
                password_hash: hash.clone(),
                profile_path: None,
                created_at: DateTime::from_unix_timestamp(created_at)
                    .unwrap()
                    .coerce(),
                updated_at: None,
                deleted_at: None,
            };
            ids.push(user.id);
            svc.database().execute(Insert(user)).await.unwrap();
        }
        ids
    }

    /// Collects all the pages of the provided [`CursorPaginated`] query.
    async fn collect_pages(
        svc: &Svc,
        query: CursorPaginated,
    ) -> Vec<Vec<user::Id>> {
        let mut pages = vec![];
        let mut cursor = None;
        loop {
            let page = svc
                .execute(CursorPaginated {
                    cursor,
                    ..query.clone()
                })
                .await
                .unwrap();
            assert_eq!(page.has_more, page.next_cursor().is_some());
            pages.push(page.nodes().map(|u| u.id).collect());
            cursor = page.next_cursor().map(ToString::to_string);
            if cursor.is_none() {
                return pages;
            }
        }
    }

    #[tokio::test]
    async fn pages_through_all_users() {
        let svc = service();
        let ids = seed(
            &svc,
            (0..25).map(|i| ("User", None, 1_700_000_000 + i / 3)),
        )
        .await;

        let pages = collect_pages(
            &svc,
            CursorPaginated {
                page_size: 10,
                ..CursorPaginated::default()
            },
        )
        .await;

        assert_eq!(
            pages.iter().map(Vec::len).collect::<Vec<_>>(),
            [10, 10, 5],
        );
        let seen = pages.into_iter().flatten().collect::<Vec<_>>();
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 25, "duplicates");
        assert_eq!(
            seen.iter().collect::<HashSet<_>>(),
            ids.iter().collect::<HashSet<_>>(),
        );
    }

    #[tokio::test]
    async fn default_order_breaks_ties_by_id() {
        let svc = service();
        let mut ids = seed(&svc, (0..5).map(|_| ("Same", None, 1_700_000_000)))
            .await;
        let newest = seed(&svc, [("Newest", None, 1_800_000_000)]).await;

        let page = svc.execute(CursorPaginated::default()).await.unwrap();

        ids.sort_unstable_by(|a, b| b.cmp(a));
        let expected = newest.into_iter().chain(ids).collect::<Vec<_>>();
        assert_eq!(page.nodes().map(|u| u.id).collect::<Vec<_>>(), expected);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn returns_stable_pages() {
        let svc = service();
        let users = (0..7).map(|i| ("User", None, 1_700_000_000 + i % 2));
        drop(seed(&svc, users).await);
        let query = CursorPaginated {
            page_size: 3,
            ..CursorPaginated::default()
        };

        let first = svc.execute(query.clone()).await.unwrap();
        let again = svc.execute(query).await.unwrap();

        assert_eq!(
            first.nodes().collect::<Vec<_>>(),
            again.nodes().collect::<Vec<_>>(),
        );
        assert_eq!(first.next_cursor(), again.next_cursor());
    }

    #[tokio::test]
    async fn sorts_with_nulls_first() {
        let svc = service();
        let ids = seed(
            &svc,
            [
                ("Bob", Some("Brown"), 1_700_000_000),
                ("Ann", None, 1_700_000_000),
                ("Cid", Some("Adams"), 1_700_000_000),
                ("Dan", None, 1_700_000_000),
            ],
        )
        .await;

        let query = |order| CursorPaginated {
            page_size: 1,
            sort: Some(SortCriteria::new([Sort {
                column: Column::Surname,
                order,
            }])),
            ..CursorPaginated::default()
        };
        let (brown, adams) = (ids[0], ids[2]);
        let mut nulls = vec![ids[1], ids[3]];
        nulls.sort_unstable_by(|a, b| b.cmp(a));

        let asc = collect_pages(&svc, query(Order::Ascending))
            .await
            .concat();
        let expected = nulls.iter().copied().chain([adams, brown]);
        assert_eq!(asc, expected.collect::<Vec<_>>());

        let desc = collect_pages(&svc, query(Order::Descending))
            .await
            .concat();
        let expected = [brown, adams].into_iter().chain(nulls);
        assert_eq!(desc, expected.collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn searches_any_listed_column() {
        let svc = service();
        let ids = seed(
            &svc,
            [
                ("Leena", None, 1_700_000_003),
                ("Bob", Some("LEE"), 1_700_000_002),
                ("Ann", Some("Smith"), 1_700_000_001),
            ],
        )
        .await;

        let search = |columns: &[Column]| CursorPaginated {
            search: Some(SearchCriteria::new("lee", columns.to_vec()).unwrap()),
            ..CursorPaginated::default()
        };

        let page = svc
            .execute(search(&[Column::Name, Column::Surname]))
            .await
            .unwrap();
        assert_eq!(page.nodes().map(|u| u.id).collect::<Vec<_>>(), &ids[..2]);

        let page = svc.execute(search(&[Column::Surname])).await.unwrap();
        assert_eq!(page.nodes().map(|u| u.id).collect::<Vec<_>>(), [ids[1]]);

        let page = svc.execute(search(&[Column::Email])).await.unwrap();
        assert_eq!(page.nodes().count(), 0);
    }

    #[tokio::test]
    async fn rejects_non_positive_page_size() {
        let svc = service();

        for page_size in [0, -1] {
            let err = svc
                .execute(CursorPaginated {
                    page_size,
                    ..CursorPaginated::default()
                })
                .await
                .unwrap_err();
            assert!(matches!(
                err.as_ref(),
                ExecutionError::InvalidPageSize(n) if *n == page_size,
            ));
        }
    }

    #[tokio::test]
    async fn rejects_invalid_cursors() {
        let svc = service();
        let users = (0..3).map(|i| ("User", None, 1_700_000_000 + i));
        drop(seed(&svc, users).await);

        let err = svc
            .execute(CursorPaginated {
                cursor: Some("corrupted".into()),
                ..CursorPaginated::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::InvalidCursor(_)));

        let page = svc
            .execute(CursorPaginated {
                page_size: 1,
                ..CursorPaginated::default()
            })
            .await
            .unwrap();
        let cursor = page.next_cursor().map(ToString::to_string);
        let err = svc
            .execute(CursorPaginated {
                cursor,
                search: Some(SearchCriteria::new("user", []).unwrap()),
                ..CursorPaginated::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::InvalidCursor(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn serves_cached_users_until_ttl() {
        let svc = service();
        let ids = seed(&svc, [("Ann", None, 1_700_000_000)]).await;

        let page = svc.execute(CursorPaginated::default()).await.unwrap();
        assert_eq!(page.nodes().next().unwrap().name, "Ann");

        let mut user = svc
            .database()
            .execute(Select(By::<Option<domain::User>, _>::new(ids[0])))
            .await
            .unwrap()
            .unwrap();
        user.name = user::Name::new("Anna").unwrap();
        svc.database().execute(Update(user)).await.unwrap();

        let page = svc.execute(CursorPaginated::default()).await.unwrap();
        assert_eq!(page.nodes().next().unwrap().name, "Ann", "stale");

        tokio::time::advance(
            svc.config().user_cache_ttl + Duration::from_secs(1),
        )
        .await;

        let page = svc.execute(CursorPaginated::default()).await.unwrap();
        assert_eq!(page.nodes().next().unwrap().name, "Anna", "refreshed");
    }

    #[tokio::test]
    async fn fails_on_corrupted_cached_user() {
        let svc = service();
        let users = (0..3).map(|i| ("User", None, 1_700_000_000 + i));
        let ids = seed(&svc, users).await;

        svc.cache()
            .execute(Insert(cache::Entry::forever(
                cache::Key::user(ids[1]),
                serde_json::json!(42),
            )))
            .await
            .unwrap();

        let err = svc.execute(CursorPaginated::default()).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::Cache(cache::Error::Serde(_)),
        ));
    }
}
