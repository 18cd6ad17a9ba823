//! [`User`] read model definition.

use common::DateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{self, user};

/// Raw `users` row, as it's fetched from a [`Database`] and kept in a
/// [`Cache`].
///
/// [`Cache`]: crate::infra::Cache
/// [`Database`]: crate::infra::Database
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Row {
    /// ID of the user.
    pub id: user::Id,

    /// Name of the user.
    pub name: String,

    /// Surname of the user, if any.
    pub surname: Option<String>,

    /// Email address of the user.
    pub email: String,

    /// Path to a profile picture of the user, if any.
    pub profile_path: Option<String>,

    /// [`DateTime`] when the user was created.
    pub created_at: DateTime,

    /// [`DateTime`] when the user was modified the last time.
    pub updated_at: Option<DateTime>,
}

impl From<&domain::User> for Row {
    fn from(user: &domain::User) -> Self {
        Self {
            id: user.id,
            name: user.name.to_string(),
            surname: user.surname.as_ref().map(ToString::to_string),
            email: user.email.to_string(),
            profile_path: user.profile_path.as_ref().map(ToString::to_string),
            created_at: user.created_at.coerce(),
            updated_at: user.updated_at.map(|dt| dt.coerce()),
        }
    }
}

/// Flattened projection of a [`domain::User`] exposed to clients.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    /// ID of this [`User`].
    pub id: user::Id,

    /// Name of this [`User`].
    pub name: String,

    /// Surname of this [`User`], if any.
    pub surname: Option<String>,

    /// Email address of this [`User`].
    pub email: String,

    /// Path to a profile picture of this [`User`], if any.
    pub profile_path: Option<String>,

    /// [`DateTime`] when this [`User`] was created.
    pub created_at: DateTime,

    /// [`DateTime`] when this [`User`] was modified the last time.
    pub updated_at: Option<DateTime>,
}

impl From<Row> for User {
    fn from(row: Row) -> Self {
        let Row {
            id,
            name,
            surname,
            email,
            profile_path,
            created_at,
            updated_at,
        } = row;
        Self {
            id,
            name,
            surname,
            email,
            profile_path,
            created_at,
            updated_at,
        }
    }
}

pub mod list {
    //! [`User`]s list definitions.

    use std::{cmp, fmt, hash::Hash as _};

    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use common::{define_pagination, pagination::Order, DateTime};
    use derive_more::{Display, Error};
    use serde::{Deserialize, Serialize};
    use serde_json::Value as Json;
    use xxhash_rust::xxh3;

    use crate::domain::user;

    use super::{Row, User};

    define_pagination!(Cursor, User, Criteria);

    pub mod rows {
        //! Storage-level pagination over [`Row`]s.
        //!
        //! [`Row`]: super::Row

        use common::define_pagination;

        define_pagination!(super::Position, super::Row, super::Criteria);
    }

    /// Number of [`User`]s in a [`Page`] when no size is requested.
    pub const DEFAULT_PAGE_SIZE: i32 = 20;

    /// Column of a [`User`] which can be searched or sorted by.
    #[derive(
        Clone,
        Copy,
        Debug,
        Deserialize,
        Eq,
        Hash,
        PartialEq,
        Serialize,
        strum::Display,
    )]
    #[serde(rename_all = "snake_case")]
    #[strum(serialize_all = "snake_case")]
    pub enum Column {
        /// [`User::id`].
        Id,

        /// [`User::name`].
        Name,

        /// [`User::surname`].
        Surname,

        /// [`User::email`].
        Email,

        /// [`User::created_at`].
        CreatedAt,

        /// [`User::updated_at`].
        UpdatedAt,
    }

    impl Column {
        /// [`Column`]s a free-text search runs over by default.
        pub const SEARCHABLE: [Self; 3] = [Self::Name, Self::Surname, Self::Email];

        /// Indicates whether this [`Column`] can be searched over.
        #[must_use]
        pub const fn is_searchable(self) -> bool {
            match self {
                Self::Name | Self::Surname | Self::Email => true,
                Self::Id | Self::CreatedAt | Self::UpdatedAt => false,
            }
        }

        /// Returns textual contents of this [`Column`] in the provided [`Row`].
        ///
        /// [`None`] is returned for non-textual or `NULL` [`Column`]s.
        #[must_use]
        pub fn text(self, row: &Row) -> Option<&str> {
            match self {
                Self::Name => Some(&row.name),
                Self::Surname => row.surname.as_deref(),
                Self::Email => Some(&row.email),
                Self::Id | Self::CreatedAt | Self::UpdatedAt => None,
            }
        }

        /// Returns [`Value`] of this [`Column`] in the provided [`Row`].
        #[must_use]
        pub fn value(self, row: &Row) -> Value {
            match self {
                Self::Id => Value::Id(row.id),
                Self::Name => Value::Text(Some(row.name.clone())),
                Self::Surname => Value::Text(row.surname.clone()),
                Self::Email => Value::Text(Some(row.email.clone())),
                Self::CreatedAt => Value::DateTime(Some(row.created_at)),
                Self::UpdatedAt => Value::DateTime(row.updated_at),
            }
        }

        /// Parses a [`Value`] of this [`Column`] out of its JSON
        /// representation.
        fn parse_value(self, json: Json) -> Option<Value> {
            match (self, json) {
                (Self::Id, Json::String(s)) => s.parse().ok().map(Value::Id),
                (Self::Name | Self::Surname | Self::Email, Json::String(s)) => {
                    Some(Value::Text(Some(s)))
                }
                (Self::Surname, Json::Null) => Some(Value::Text(None)),
                (Self::CreatedAt | Self::UpdatedAt, Json::String(s)) => {
                    DateTime::from_rfc3339(&s)
                        .ok()
                        .map(|dt| Value::DateTime(Some(dt)))
                }
                (Self::UpdatedAt, Json::Null) => Some(Value::DateTime(None)),
                _ => None,
            }
        }
    }

    /// Value of a [`Column`] a [`User`] is ordered by.
    ///
    /// `NULL`s are ordered before any other value.
    #[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
    pub enum Value {
        /// [`Column::Id`] value.
        Id(user::Id),

        /// Textual [`Column`] value.
        Text(Option<String>),

        /// [`DateTime`] [`Column`] value.
        DateTime(Option<DateTime>),
    }

    impl Value {
        /// Returns JSON representation of this [`Value`].
        fn to_json(&self) -> Json {
            match self {
                Self::Id(id) => Json::String(id.to_string()),
                Self::Text(s) => s.clone().map_or(Json::Null, Json::String),
                Self::DateTime(dt) => {
                    dt.map_or(Json::Null, |dt| Json::String(dt.to_rfc3339()))
                }
            }
        }
    }

    /// Single [`Column`] sorting.
    #[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
    pub struct Sort {
        /// [`Column`] to sort by.
        #[serde(rename = "c")]
        pub column: Column,

        /// [`Order`] to sort in.
        #[serde(rename = "d")]
        pub order: Order,
    }

    /// Sorting requested by a client, most significant [`Sort`] first.
    #[derive(Clone, Debug, Default, Eq, PartialEq)]
    pub struct SortCriteria(Vec<Sort>);

    impl SortCriteria {
        /// Creates a new [`SortCriteria`] out of the provided [`Sort`]s.
        ///
        /// Repeated [`Column`]s are ignored, as only their first occurrence
        /// affects the ordering.
        #[must_use]
        pub fn new(sorts: impl IntoIterator<Item = Sort>) -> Self {
            let mut out = Vec::<Sort>::new();
            for s in sorts {
                if !out.iter().any(|o| o.column == s.column) {
                    out.push(s);
                }
            }
            Self(out)
        }

        /// Indicates whether any [`Sort`] is requested.
        #[must_use]
        pub fn has_sorts(&self) -> bool {
            !self.0.is_empty()
        }

        /// Returns the requested [`Sort`]s.
        #[must_use]
        pub fn sorts(&self) -> &[Sort] {
            &self.0
        }
    }

    /// Free-text search requested by a client.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub struct SearchCriteria {
        /// Term to search for.
        term: String,

        /// [`Column`]s to search the `term` in.
        columns: Vec<Column>,
    }

    impl SearchCriteria {
        /// Creates a new [`SearchCriteria`].
        ///
        /// The `term` is kept verbatim. No `columns` means
        /// [`Column::SEARCHABLE`].
        ///
        /// # Errors
        ///
        /// If any of the `columns` is not [searchable][0].
        ///
        /// [0]: Column::is_searchable
        pub fn new(
            term: &str,
            columns: impl IntoIterator<Item = Column>,
        ) -> Result<Self, CriteriaError> {
            let mut cols = Vec::<Column>::new();
            for c in columns {
                if !c.is_searchable() {
                    return Err(CriteriaError::NotSearchable(c));
                }
                if !cols.contains(&c) {
                    cols.push(c);
                }
            }
            if cols.is_empty() {
                cols = Column::SEARCHABLE.to_vec();
            }
            Ok(Self {
                term: term.to_owned(),
                columns: cols,
            })
        }

        /// Indicates whether there is anything to search for.
        #[must_use]
        pub fn has_search(&self) -> bool {
            !self.term.is_empty()
        }

        /// Returns the term to search for.
        #[must_use]
        pub fn term(&self) -> &str {
            &self.term
        }

        /// Returns the [`Column`]s to search in.
        #[must_use]
        pub fn columns(&self) -> &[Column] {
            &self.columns
        }

        /// Checks whether the provided [`Row`] contains the term in any of
        /// the [`Column`]s, case-insensitively.
        #[must_use]
        pub fn matches(&self, row: &Row) -> bool {
            if !self.has_search() {
                return true;
            }
            let term = self.term.to_lowercase();
            self.columns.iter().any(|c| {
                c.text(row).is_some_and(|t| t.to_lowercase().contains(&term))
            })
        }

        /// Calculates a stable fingerprint of this [`SearchCriteria`].
        ///
        /// [`None`] is returned if there is nothing to search for.
        #[must_use]
        pub fn fingerprint(&self) -> Option<u64> {
            if !self.has_search() {
                return None;
            }

            let mut columns =
                self.columns.iter().map(ToString::to_string).collect::<Vec<_>>();
            columns.sort_unstable();

            let mut hasher = xxh3::Xxh3Builder::new().build();
            self.term.to_lowercase().hash(&mut hasher);
            columns.hash(&mut hasher);
            Some(hasher.digest())
        }
    }

    /// Effective total ordering of a [`User`]s list.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub struct OrderBy(Vec<Sort>);

    impl OrderBy {
        /// [`OrderBy`] applied when no sorting is requested.
        const DEFAULT: [Sort; 2] = [
            Sort {
                column: Column::CreatedAt,
                order: Order::Descending,
            },
            Sort {
                column: Column::Id,
                order: Order::Descending,
            },
        ];

        /// Creates a total [`OrderBy`] out of the provided [`SortCriteria`].
        ///
        /// [`Column::Id`] in [`Order::Descending`] is appended as the final
        /// tie-break, unless it's sorted by already. [`Sort`]s after the
        /// [`Column::Id`] one are dropped, since they can't affect the order.
        #[must_use]
        pub fn new(sort: Option<&SortCriteria>) -> Self {
            let Some(sort) = sort.filter(|s| s.has_sorts()) else {
                return Self(Self::DEFAULT.to_vec());
            };

            let mut sorts = Vec::with_capacity(sort.sorts().len() + 1);
            for s in sort.sorts() {
                sorts.push(*s);
                if s.column == Column::Id {
                    return Self(sorts);
                }
            }
            sorts.push(Sort {
                column: Column::Id,
                order: Order::Descending,
            });
            Self(sorts)
        }

        /// Returns [`Sort`]s of this [`OrderBy`], most significant first.
        #[must_use]
        pub fn sorts(&self) -> &[Sort] {
            &self.0
        }

        /// Returns [`Position`] of the provided [`Row`] in this [`OrderBy`].
        #[must_use]
        pub fn position(&self, row: &Row) -> Position {
            Position(self.0.iter().map(|s| s.column.value(row)).collect())
        }

        /// Compares two [`Position`]s in this [`OrderBy`].
        #[must_use]
        pub fn compare(&self, a: &Position, b: &Position) -> cmp::Ordering {
            self.0
                .iter()
                .zip(a.0.iter().zip(&b.0))
                .map(|(s, (a, b))| s.order.apply(a.cmp(b)))
                .find(|o| o.is_ne())
                .unwrap_or(cmp::Ordering::Equal)
        }
    }

    /// Position of a [`Row`] in an [`OrderBy`]: values of its [`Sort`]
    /// [`Column`]s.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub struct Position(Vec<Value>);

    impl Position {
        /// Returns [`Value`]s of this [`Position`].
        #[must_use]
        pub fn values(&self) -> &[Value] {
            &self.0
        }
    }

    /// Filtering and ordering of a [`User`]s list.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub struct Criteria {
        /// [`SearchCriteria`] to filter by, if there is anything to search.
        search: Option<SearchCriteria>,

        /// Total [`OrderBy`] of the list.
        order_by: OrderBy,
    }

    impl Criteria {
        /// Creates new [`Criteria`] out of the client-requested ones.
        #[must_use]
        pub fn new(
            search: Option<SearchCriteria>,
            sort: Option<&SortCriteria>,
        ) -> Self {
            Self {
                search: search.filter(SearchCriteria::has_search),
                order_by: OrderBy::new(sort),
            }
        }

        /// Returns [`SearchCriteria`] to filter by, if any.
        #[must_use]
        pub fn search(&self) -> Option<&SearchCriteria> {
            self.search.as_ref()
        }

        /// Returns the total [`OrderBy`].
        #[must_use]
        pub fn order_by(&self) -> &OrderBy {
            &self.order_by
        }

        /// Checks whether the provided [`Row`] passes these [`Criteria`].
        #[must_use]
        pub fn matches(&self, row: &Row) -> bool {
            self.search.as_ref().map_or(true, |s| s.matches(row))
        }

        /// Creates a [`Cursor`] pointing to the provided [`Position`].
        #[must_use]
        pub fn cursor(&self, position: Position) -> Cursor {
            Cursor {
                order_by: self.order_by.clone(),
                filter: self.search.as_ref().and_then(SearchCriteria::fingerprint),
                position,
            }
        }

        /// Checks whether the provided [`Cursor`] has been issued for these
        /// [`Criteria`], and returns its [`Position`].
        ///
        /// # Errors
        ///
        /// If the [`Cursor`] was issued for a different [`OrderBy`] or
        /// [`SearchCriteria`].
        pub fn seek(&self, cursor: Cursor) -> Result<Position, CursorError> {
            if cursor.order_by != self.order_by {
                return Err(CursorError::OrderMismatch);
            }
            if cursor.filter
                != self.search.as_ref().and_then(SearchCriteria::fingerprint)
            {
                return Err(CursorError::FilterMismatch);
            }
            Ok(cursor.position)
        }
    }

    /// Opaque pointer to a [`Position`] in a [`User`]s list.
    ///
    /// Encoded as an unpadded base64url of a versioned JSON record.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub struct Cursor {
        /// [`OrderBy`] the [`Position`] belongs to.
        order_by: OrderBy,

        /// Fingerprint of the [`SearchCriteria`] this [`Cursor`] was issued
        /// for.
        filter: Option<u64>,

        /// [`Position`] of the last [`Row`] of the previous [`Page`].
        position: Position,
    }

    /// Wire representation of a [`Cursor`].
    #[derive(Deserialize, Serialize)]
    struct Encoded {
        /// Version of this format.
        v: u8,

        /// [`Sort`]s of the [`OrderBy`].
        o: Vec<Sort>,

        /// Fingerprint of the [`SearchCriteria`].
        #[serde(default, skip_serializing_if = "Option::is_none")]
        f: Option<u64>,

        /// [`Value`]s of the [`Position`].
        k: Vec<Json>,
    }

    impl Cursor {
        /// Current version of the [`Cursor`] encoding.
        const VERSION: u8 = 1;

        /// Returns [`Position`] of this [`Cursor`].
        #[must_use]
        pub fn position(&self) -> &Position {
            &self.position
        }

        /// Encodes this [`Cursor`] into an opaque string.
        #[expect(clippy::missing_panics_doc, reason = "infallible")]
        #[must_use]
        pub fn encode(&self) -> String {
            let encoded = Encoded {
                v: Self::VERSION,
                o: self.order_by.0.clone(),
                f: self.filter,
                k: self.position.0.iter().map(Value::to_json).collect(),
            };
            URL_SAFE_NO_PAD.encode(
                serde_json::to_vec(&encoded).expect("`Cursor` is serializable"),
            )
        }

        /// Decodes a [`Cursor`] out of the provided opaque string.
        ///
        /// # Errors
        ///
        /// If the `token` is not a [`Cursor`] produced by [`Cursor::encode()`].
        pub fn decode(token: &str) -> Result<Self, CursorError> {
            use CursorError as E;

            let bytes = URL_SAFE_NO_PAD.decode(token).map_err(E::Base64)?;
            let Encoded { v, o, f, k } =
                serde_json::from_slice(&bytes).map_err(E::Json)?;
            if v != Self::VERSION {
                return Err(E::Version(v));
            }
            if o.is_empty() || o.len() != k.len() {
                return Err(E::Keys);
            }
            let position = o
                .iter()
                .zip(k)
                .map(|(s, v)| s.column.parse_value(v).ok_or(E::Keys))
                .collect::<Result<_, _>>()?;

            Ok(Self {
                order_by: OrderBy(o),
                filter: f,
                position: Position(position),
            })
        }
    }

    impl fmt::Display for Cursor {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.encode())
        }
    }

    /// Error of building [`SearchCriteria`] out of a raw input.
    #[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
    pub enum CriteriaError {
        /// [`Column`] cannot be searched over.
        #[display("Column `{_0}` is not searchable")]
        NotSearchable(#[error(not(source))] Column),
    }

    /// Error of using a [`Cursor`].
    #[derive(Debug, Display, Error)]
    pub enum CursorError {
        /// [`Cursor`] is not a valid base64url string.
        #[display("`Cursor` is not a valid base64url: {_0}")]
        Base64(base64::DecodeError),

        /// [`Cursor`] is not a valid JSON.
        #[display("`Cursor` is not a valid JSON: {_0}")]
        Json(serde_json::Error),

        /// [`Cursor`] is of an unsupported version.
        #[display("`Cursor` version `{_0}` is not supported")]
        Version(#[error(not(source))] u8),

        /// [`Cursor`] keys don't match its [`OrderBy`].
        #[display("`Cursor` keys don't match its ordering")]
        Keys,

        /// [`Cursor`] was issued for a different [`OrderBy`].
        #[display("`Cursor` was issued for a different sorting")]
        OrderMismatch,

        /// [`Cursor`] was issued for a different [`SearchCriteria`].
        #[display("`Cursor` was issued for a different search")]
        FilterMismatch,
    }

    #[cfg(test)]
    mod spec {
        use std::cmp;

        use common::{pagination::Order, DateTime};

        use crate::{domain::user, read::user::Row};

        use super::{
            Column, Criteria, Cursor, CursorError, OrderBy, SearchCriteria,
            Sort, SortCriteria,
        };

        fn row(name: &str, surname: Option<&str>, email: &str) -> Row {
            Row {
                id: user::Id::new(),
                name: name.into(),
                surname: surname.map(Into::into),
                email: email.into(),
                profile_path: None,
                created_at: DateTime::now(),
                updated_at: None,
            }
        }

        fn asc(column: Column) -> Sort {
            Sort {
                column,
                order: Order::Ascending,
            }
        }

        fn desc(column: Column) -> Sort {
            Sort {
                column,
                order: Order::Descending,
            }
        }

        #[test]
        fn predicates() {
            assert!(!SortCriteria::default().has_sorts());
            assert!(SortCriteria::new([asc(Column::Name)])
                .has_sorts());

            assert!(!SearchCriteria::new("", []).unwrap().has_search());
            assert!(SearchCriteria::new("  ", []).unwrap().has_search());
            assert!(SearchCriteria::new("ann", []).unwrap().has_search());
            assert!(SearchCriteria::new("ann", [Column::CreatedAt]).is_err());
        }

        #[test]
        fn search_is_case_insensitive_or() {
            let search =
                SearchCriteria::new("SMI", [Column::Name, Column::Email])
                    .unwrap();

            assert!(search.matches(&row("Smith", None, "a@b.io")));
            assert!(search.matches(&row("Ann", None, "smiley@b.io")));
            assert!(!search.matches(&row("Ann", Some("Smith"), "a@b.io")));

            let search = SearchCriteria::new(" ", [Column::Name]).unwrap();
            assert!(search.matches(&row("Ann Marie", None, "a@b.io")));
            assert!(!search.matches(&row("Ann", None, "a b@b.io")));
        }

        #[test]
        fn appends_id_tie_break() {
            let default = OrderBy::new(None);
            assert_eq!(
                default
                    .sorts()
                    .iter()
                    .map(|s| (s.column, s.order))
                    .collect::<Vec<_>>(),
                [
                    (Column::CreatedAt, Order::Descending),
                    (Column::Id, Order::Descending),
                ],
            );

            let sort = SortCriteria::new([asc(Column::Name)]);
            let ob = OrderBy::new(Some(&sort));
            assert_eq!(ob.sorts().len(), 2);
            assert_eq!(ob.sorts()[1].column, Column::Id);

            let sort = SortCriteria::new([
                asc(Column::Id),
                asc(Column::Name),
            ]);
            let ob = OrderBy::new(Some(&sort));
            assert_eq!(ob.sorts().len(), 1);
            assert_eq!(ob.sorts()[0].order, Order::Ascending);
        }

        #[test]
        fn nulls_go_first() {
            let sort =
                SortCriteria::new([asc(Column::Surname)]);
            let ob = OrderBy::new(Some(&sort));

            let with = ob.position(&row("A", Some("B"), "a@b.io"));
            let without = ob.position(&row("A", None, "a@b.io"));
            assert_eq!(ob.compare(&without, &with), cmp::Ordering::Less);
        }

        #[test]
        fn cursor_round_trips() {
            let sort = SortCriteria::new([
                desc(Column::Surname),
                asc(Column::UpdatedAt),
            ]);
            let criteria = Criteria::new(
                Some(SearchCriteria::new("ann", []).unwrap()),
                Some(&sort),
            );
            let mut r = row("Ann", None, "ann@b.io");
            r.updated_at = Some(DateTime::now());
            let cursor = criteria.cursor(criteria.order_by().position(&r));

            let decoded = Cursor::decode(&cursor.encode()).unwrap();
            assert_eq!(decoded, cursor);
            assert_eq!(
                criteria.seek(decoded).unwrap(),
                criteria.order_by().position(&r),
            );
        }

        #[test]
        fn rejects_foreign_cursors() {
            assert!(matches!(
                Cursor::decode("corrupted"),
                Err(CursorError::Json(_) | CursorError::Base64(_)),
            ));
            assert!(matches!(
                Cursor::decode("!!!"),
                Err(CursorError::Base64(_)),
            ));

            let criteria = Criteria::new(None, None);
            let cursor = criteria
                .cursor(criteria.order_by().position(&row("A", None, "a@b.io")));

            let sorted = Criteria::new(
                None,
                Some(&SortCriteria::new([asc(Column::Name)])),
            );
            assert!(matches!(
                sorted.seek(cursor.clone()),
                Err(CursorError::OrderMismatch),
            ));

            let searched =
                Criteria::new(Some(SearchCriteria::new("a", []).unwrap()), None);
            assert!(matches!(
                searched.seek(cursor),
                Err(CursorError::FilterMismatch),
            ));
        }
    }
}
