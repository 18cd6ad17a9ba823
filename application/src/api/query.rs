//! GraphQL [`Query`]s definitions.

use juniper::graphql_object;
use service::{query, read::user::list, Query as _};

use crate::{api, define_error, AsError, Context, Error};

/// Root of all GraphQL queries.
#[derive(Clone, Copy, Debug)]
pub struct Query;

impl Query {
    /// Name of the [`tracing::Span`] for the queries.
    pub(crate) const SPAN_NAME: &'static str = "GraphQL query";
}

#[graphql_object(context = Context)]
impl Query {
    /// Returns the currently authenticated `User`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authorized;
    /// - `USER_NOT_EXISTS` - the authenticated `User` doesn't exist anymore.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "myUser",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn my_user(ctx: &Context) -> Result<api::User, Error> {
        let session = ctx.current_session().await?;
        ctx.service()
            .execute(query::user::Authenticated(session.claims))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| UserError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the `User` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `USER_NOT_EXISTS` - the `User` with the specified ID does not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            id = %id,
            gql.name = "user",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn user(
        id: api::user::Id,
        ctx: &Context,
    ) -> Result<api::User, Error> {
        ctx.service()
            .execute(query::user::ById(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Fetches the page of `User`s.
    ///
    /// Pages are continued by passing the `nextCursor` of the previous page
    /// as `after`, along with the same `search` and `sort`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authorized;
    /// - `INVALID_ARGUMENT` - `first` is not positive, or a non-searchable
    ///                        column is searched in;
    /// - `INVALID_CURSOR` - `after` is malformed or was issued for another
    ///                      `search` or `sort`.
    #[tracing::instrument(
        skip_all,
        fields(
            after = ?after,
            first = %first,
            gql.name = "users",
            otel.name = Self::SPAN_NAME,
            search = ?search.as_ref().map(|s| &s.term),
        ),
    )]
    pub async fn users(
        #[graphql(default = list::DEFAULT_PAGE_SIZE)] first: i32,
        after: Option<api::user::list::Cursor>,
        search: Option<api::user::list::Search>,
        sort: Option<Vec<api::user::list::Sort>>,
        ctx: &Context,
    ) -> Result<api::user::list::Page, Error> {
        _ = ctx.current_session().await?;

        let search = search
            .map(api::user::list::Search::into_criteria)
            .transpose()
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;
        let sort = sort.map(|s| {
            list::SortCriteria::new(s.into_iter().map(list::Sort::from))
        });

        ctx.service()
            .execute(query::users::CursorPaginated {
                cursor: after.map(Into::into),
                page_size: first,
                search,
                sort,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }
}

impl AsError for query::user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Cache(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
            Self::UserNotExists(_) => Some(UserError::NotExists.into()),
        }
    }
}

impl AsError for query::users::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Cache(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
            Self::InvalidCursor(e) => e.try_as_error(),
            Self::InvalidPageSize(_) => {
                Some(api::ArgumentError::PageSize.into())
            }
        }
    }
}

impl AsError for list::CursorError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_CURSOR"]
                #[status = BAD_REQUEST]
                #[message = "Provided cursor is malformed or doesn't match \
                             the requested search and sort"]
                InvalidCursor,
            }
        }

        Some(Error::InvalidCursor.into())
    }
}

impl AsError for list::CriteriaError {
    fn try_as_error(&self) -> Option<Error> {
        Some(Error {
            message: self.to_string(),
            ..Error::from(api::ArgumentError::Criteria)
        })
    }
}

define_error! {
    enum UserError {
        #[code = "USER_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`User` with the specified ID does not exist"]
        NotExists,
    }
}
