//! [`User`]-related definitions.

use common::DateTime;
use derive_more::{AsRef, Display, From, Into};
use juniper::{graphql_object, GraphQLScalar, InputValue, ScalarValue, Value};
use service::{domain, read};
use uuid::Uuid;

use crate::{api, Context};

/// A [`User`] of the system.
#[derive(Clone, Debug, From, Into)]
pub struct User(read::User);

impl From<domain::User> for User {
    fn from(user: domain::User) -> Self {
        Self(read::user::Row::from(&user).into())
    }
}

/// A `User` of the system.
#[graphql_object(context = Context)]
impl User {
    /// Unique identifier of this `User`.
    #[must_use]
    pub fn id(&self) -> Id {
        self.0.id.into()
    }

    /// Name of this `User`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Surname of this `User`, if any.
    #[must_use]
    pub fn surname(&self) -> Option<&str> {
        self.0.surname.as_deref()
    }

    /// Email address of this `User`.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.0.email
    }

    /// Path to a profile picture of this `User`, if any.
    #[must_use]
    pub fn profile_path(&self) -> Option<&str> {
        self.0.profile_path.as_deref()
    }

    /// `DateTime` when this `User` was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime {
        self.0.created_at
    }

    /// `DateTime` when this `User` was modified the last time, if ever.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime> {
        self.0.updated_at
    }
}

/// Unique identifier of a `User`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::user::Id)]
#[into(domain::user::Id)]
#[graphql(name = "UserId", transparent)]
pub struct Id(Uuid);

/// Name of a `User`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "UserName",
    with = api::scalar::Via::<domain::user::Name>,
)]
pub struct Name(domain::user::Name);

/// Surname of a `User`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "UserSurname",
    with = api::scalar::Via::<domain::user::Surname>,
)]
pub struct Surname(domain::user::Surname);

/// Email address of a `User`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "UserEmail",
    with = api::scalar::Via::<domain::user::Email>,
)]
pub struct Email(domain::user::Email);

/// Path to a profile picture of a `User`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "UserProfilePath",
    with = api::scalar::Via::<domain::user::ProfilePath>,
)]
pub struct ProfilePath(domain::user::ProfilePath);

/// Password of a `User`.
///
/// Never rendered back to clients.
#[derive(Clone, Debug, From, GraphQLScalar, Into)]
#[graphql(name = "UserPassword", with = Self, parse_token(String))]
pub struct Password(domain::user::Password);

impl Password {
    /// Renders the provided [`Password`] masked.
    fn to_output<S: ScalarValue>(_: &Self) -> Value<S> {
        Value::scalar("********".to_owned())
    }

    /// Parses a [`Password`] out of the provided [`InputValue`].
    fn from_input<S: ScalarValue>(
        input: &InputValue<S>,
    ) -> Result<Self, String> {
        input
            .as_string_value()
            .ok_or_else(|| {
                format!(
                    "Cannot parse input scalar `UserPassword`: expected \
                     string input value, found: {input}",
                )
            })?
            .parse()
            .map(Self)
            .map_err(|e| {
                format!("Cannot parse input scalar `UserPassword`: {e}")
            })
    }
}

pub mod session {
    //! [`Session`]-related definitions.
    //!
    //! [`Session`]: crate::Session

    use common::DateTime;
    use derive_more::{AsRef, From, Into};
    use juniper::{GraphQLObject, GraphQLScalar};
    use service::{command, domain};

    use crate::{
        api::{self, scalar},
        Context,
    };

    /// `Session` access token.
    #[derive(AsRef, Clone, Debug, From, GraphQLScalar, Into)]
    #[graphql(
        name = "UserAuthToken",
        with = scalar::Via::<domain::user::session::Token>,
    )]
    pub struct Token(domain::user::session::Token);

    /// Bearer access token of a `Session`.
    #[derive(Clone, Debug, GraphQLObject)]
    #[graphql(name = "AuthToken")]
    pub struct AuthToken {
        /// Token to put into the `Authorization: Bearer` header.
        pub access_token: Token,

        /// Type of the `accessToken`. Always `bearer`.
        pub token_type: String,

        /// Number of seconds the `accessToken` stays valid after its issue.
        pub expires_in: i32,

        /// `DateTime` when the `accessToken` expires.
        pub expires_at: DateTime,
    }

    impl AuthToken {
        /// Type of every issued [`AuthToken`].
        pub const TOKEN_TYPE: &'static str = "bearer";

        /// Creates a new [`AuthToken`] issued for a `Session` lasting
        /// `ttl_minutes`.
        #[must_use]
        pub fn new(
            output: &command::create_user_session::Output,
            ttl_minutes: u64,
        ) -> Self {
            Self {
                access_token: output.token.clone().into(),
                token_type: Self::TOKEN_TYPE.to_owned(),
                expires_in: i32::try_from(ttl_minutes.saturating_mul(60))
                    .unwrap_or(i32::MAX),
                expires_at: output.session.expires_at.coerce(),
            }
        }
    }

    /// Result of a `Session` creation.
    #[derive(Clone, Debug, GraphQLObject)]
    #[graphql(context = Context, name = "CreateSessionResult")]
    pub struct CreateResult {
        /// Access token of the created `Session`.
        pub token: AuthToken,

        /// `User` associated with the created `Session`.
        pub user: api::User,
    }

    impl CreateResult {
        /// Creates a new [`CreateResult`] out of the provided
        /// [`command::create_user_session::Output`].
        #[must_use]
        pub fn new(
            output: command::create_user_session::Output,
            ttl_minutes: u64,
        ) -> Self {
            Self {
                token: AuthToken::new(&output, ttl_minutes),
                user: output.user.into(),
            }
        }
    }
}

pub mod list {
    //! Definitions related to [`User`] list.

    use common::pagination::Order;
    use derive_more::{Display, From, Into};
    use juniper::{
        graphql_object, GraphQLEnum, GraphQLInputObject, GraphQLScalar,
    };
    use service::read::user::list;

    use crate::Context;

    use super::User;

    /// Opaque cursor of the `User` list.
    ///
    /// Kept raw, so malformed cursors are reported by the list itself.
    #[derive(Clone, Debug, Display, From, GraphQLScalar, Into)]
    #[graphql(name = "UserListCursor", transparent)]
    pub struct Cursor(String);

    /// Page of the [`User`] list.
    #[derive(Clone, Debug, From, Into)]
    pub struct Page(list::Page);

    /// Page of the `User` list.
    #[graphql_object(name = "UserPage", context = Context)]
    impl Page {
        /// `User`s of this page in order.
        #[must_use]
        pub fn items(&self) -> Vec<User> {
            self.0.nodes().cloned().map(User::from).collect()
        }

        /// Cursor to fetch the next page with, if there is one.
        #[must_use]
        pub fn next_cursor(&self) -> Option<Cursor> {
            self.0.next_cursor().map(|c| Cursor(c.encode()))
        }

        /// Indicator whether there are more `User`s after this page.
        #[must_use]
        pub fn has_more(&self) -> bool {
            self.0.has_more
        }
    }

    /// Column of a `User` to search or sort by.
    #[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
    #[graphql(name = "UserColumn")]
    pub enum Column {
        /// `User.id` column.
        Id,

        /// `User.name` column.
        Name,

        /// `User.surname` column.
        Surname,

        /// `User.email` column.
        Email,

        /// `User.createdAt` column.
        CreatedAt,

        /// `User.updatedAt` column.
        UpdatedAt,
    }

    impl From<Column> for list::Column {
        fn from(column: Column) -> Self {
            match column {
                Column::Id => Self::Id,
                Column::Name => Self::Name,
                Column::Surname => Self::Surname,
                Column::Email => Self::Email,
                Column::CreatedAt => Self::CreatedAt,
                Column::UpdatedAt => Self::UpdatedAt,
            }
        }
    }

    /// Direction to sort the `User` list in.
    #[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
    #[graphql(name = "SortDirection")]
    pub enum Direction {
        /// Smallest values first.
        Asc,

        /// Largest values first.
        Desc,
    }

    impl From<Direction> for Order {
        fn from(direction: Direction) -> Self {
            match direction {
                Direction::Asc => Self::Ascending,
                Direction::Desc => Self::Descending,
            }
        }
    }

    /// Free-text search over the `User` list.
    #[derive(Clone, Debug, GraphQLInputObject)]
    #[graphql(name = "UserSearch")]
    pub struct Search {
        /// Term to look for, case-insensitively.
        pub term: String,

        /// Columns to look in. `name`, `surname` and `email` if omitted.
        pub columns: Option<Vec<Column>>,
    }

    impl Search {
        /// Converts this [`Search`] into a [`list::SearchCriteria`].
        ///
        /// # Errors
        ///
        /// If any of the requested [`Column`]s is not searchable.
        pub fn into_criteria(
            self,
        ) -> Result<list::SearchCriteria, list::CriteriaError> {
            let Self { term, columns } = self;
            list::SearchCriteria::new(
                &term,
                columns.into_iter().flatten().map(Into::into),
            )
        }
    }

    /// Sorting of the `User` list by a single column.
    #[derive(Clone, Copy, Debug, GraphQLInputObject)]
    #[graphql(name = "UserSort")]
    pub struct Sort {
        /// Column to sort by.
        pub column: Column,

        /// Direction to sort in. `ASC` if omitted.
        pub direction: Option<Direction>,
    }

    impl From<Sort> for list::Sort {
        fn from(sort: Sort) -> Self {
            Self {
                column: sort.column.into(),
                order: sort.direction.map_or(Order::Ascending, Into::into),
            }
        }
    }
}

#[cfg(test)]
mod spec {
    use common::pagination::Order;
    use service::read::user::list as read;

    use super::list::{Column, Direction, Search, Sort};

    #[test]
    fn search_defaults_to_text_columns() {
        let criteria = Search {
            term: " ann ".into(),
            columns: None,
        }
        .into_criteria()
        .unwrap();

        assert_eq!(criteria.term(), " ann ");
        assert_eq!(criteria.columns(), read::Column::SEARCHABLE);
    }

    #[test]
    fn search_rejects_non_text_columns() {
        let err = Search {
            term: "ann".into(),
            columns: Some(vec![Column::Email, Column::CreatedAt]),
        }
        .into_criteria()
        .unwrap_err();

        assert_eq!(
            err,
            read::CriteriaError::NotSearchable(read::Column::CreatedAt),
        );
    }

    #[test]
    fn sort_defaults_to_ascending() {
        let sort = read::Sort::from(Sort {
            column: Column::Surname,
            direction: None,
        });
        assert_eq!(sort.column, read::Column::Surname);
        assert_eq!(sort.order, Order::Ascending);

        let sort = read::Sort::from(Sort {
            column: Column::Id,
            direction: Some(Direction::Desc),
        });
        assert_eq!(sort.order, Order::Descending);
    }
}
