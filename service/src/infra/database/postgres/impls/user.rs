//! [`User`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Lock, Select, Update},
    pagination::Order,
};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{
        database::{
            self,
            postgres::{Connection, LikePattern},
            Postgres,
        },
        Database,
    },
    read::user::{
        list::{rows, Column, OrderBy, Position, Value},
        Row,
    },
};

/// Columns of a [`User`] in the `users` table.
const USER_COLUMNS: &str = "\
    id, name, surname, email, password_hash, profile_path, \
    created_at, updated_at, deleted_at";

/// Converts the provided `users` table row into a [`User`].
fn user_from(row: &tokio_postgres::Row) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        surname: row.get("surname"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        profile_path: row.get("profile_path"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

impl<C> Database<Select<By<Option<User>, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: user::Id = by.into_inner();

        let sql = format!(
            "SELECT {USER_COLUMNS} \
             FROM users \
             WHERE id = $1::UUID \
               AND deleted_at IS NULL"
        );
        Ok(self
            .query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(user_from))
    }
}

impl<'e, C> Database<Select<By<Option<User>, &'e user::Email>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'e user::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();

        let sql = format!(
            "SELECT {USER_COLUMNS} \
             FROM users \
             WHERE email = $1::VARCHAR \
               AND deleted_at IS NULL \
             LIMIT 1"
        );
        Ok(self
            .query_opt(&sql, &[email])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(user_from))
    }
}

impl<C> Database<Insert<User>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<User>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(user)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<User>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(user): Update<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let User {
            id,
            name,
            surname,
            email,
            password_hash,
            profile_path,
            created_at,
            updated_at,
            deleted_at,
        } = user;

        const SQL: &str = "\
            INSERT INTO users (\
                id, name, surname, email, password_hash, profile_path, \
                created_at, updated_at, deleted_at\
            ) \
            VALUES (\
                $1::UUID, \
                $2::VARCHAR, $3::VARCHAR, \
                $4::VARCHAR, $5::VARCHAR, \
                $6::VARCHAR, \
                $7::TIMESTAMPTZ, $8::TIMESTAMPTZ, $9::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET name = EXCLUDED.name, \
                surname = EXCLUDED.surname, \
                email = EXCLUDED.email, \
                password_hash = EXCLUDED.password_hash, \
                profile_path = EXCLUDED.profile_path, \
                updated_at = EXCLUDED.updated_at, \
                deleted_at = EXCLUDED.deleted_at";
        self.exec(
            SQL,
            &[
                &id,
                &name,
                &surname,
                &email,
                &password_hash,
                &profile_path,
                &created_at,
                &updated_at,
                &deleted_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<User, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<User, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: user::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM users \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

/// Returns SQL expression of the provided [`Column`] to compare by.
///
/// Textual [`Column`]s are compared bytewise, the same way [`String`]s are.
const fn sort_expr(column: Column) -> &'static str {
    match column {
        Column::Id => "id",
        Column::Name => r#"name COLLATE "C""#,
        Column::Surname => r#"surname COLLATE "C""#,
        Column::Email => r#"email COLLATE "C""#,
        Column::CreatedAt => "created_at",
        Column::UpdatedAt => "updated_at",
    }
}

/// Returns SQL `ORDER BY` clause of the provided [`OrderBy`].
///
/// `NULL`s go first in [`Order::Ascending`] and last in [`Order::Descending`].
fn order_by_clause(order_by: &OrderBy) -> String {
    order_by
        .sorts()
        .iter()
        .format_with(", ", |s, f| {
            let nulls = match s.order {
                Order::Ascending => "FIRST",
                Order::Descending => "LAST",
            };
            f(&format_args!(
                "{} {} NULLS {nulls}",
                sort_expr(s.column),
                s.order.sql(),
            ))
        })
        .to_string()
}

/// Returns SQL predicate selecting rows placed strictly after the provided
/// [`Position`] in the [`OrderBy`], pushing the [`Position`] values into the
/// `params`.
fn seek_predicate(
    order_by: &OrderBy,
    position: &Position,
    params: &mut Vec<Box<dyn ToSql + Sync + Send>>,
) -> String {
    // Placeholders of the `position` values, `None` for `NULL`s.
    let placeholders = position
        .values()
        .iter()
        .map(|v| {
            let ty = match v {
                Value::Id(id) => {
                    params.push(Box::new(*id));
                    "UUID"
                }
                Value::Text(Some(s)) => {
                    params.push(Box::new(s.clone()));
                    "VARCHAR"
                }
                Value::DateTime(Some(dt)) => {
                    params.push(Box::new(*dt));
                    "TIMESTAMPTZ"
                }
                Value::Text(None) | Value::DateTime(None) => return None,
            };
            Some(format!("${}::{ty}", params.len()))
        })
        .collect::<Vec<_>>();

    let sorts = order_by.sorts().iter().zip(&placeholders);
    let equal = |col: &str, p: &Option<String>| {
        p.as_ref()
            .map_or_else(|| format!("{col} IS NULL"), |p| format!("{col} = {p}"))
    };
    let after = |col: &str, p: &Option<String>, order: Order| match (p, order) {
        (None, Order::Ascending) => format!("{col} IS NOT NULL"),
        (None, Order::Descending) => "FALSE".to_owned(),
        (Some(p), Order::Ascending) => format!("{col} > {p}"),
        (Some(p), Order::Descending) => {
            format!("({col} < {p} OR {col} IS NULL)")
        }
    };

    let branches = (0..placeholders.len()).map(|i| {
        sorts
            .clone()
            .take(i + 1)
            .enumerate()
            .format_with(" AND ", move |(j, (s, p)), f| {
                let col = sort_expr(s.column);
                if j < i {
                    f(&equal(col, p))
                } else {
                    f(&after(col, p, s.order))
                }
            })
            .to_string()
    });
    format!("({})", branches.format_with(" OR ", |b, f| f(&format_args!("({b})"))))
}

impl<C> Database<Select<By<rows::Page, rows::Selector>>> for Postgres<C>
where
    C: Connection,
{
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

        let limit = i64::try_from(arguments.limit())
            .unwrap_or(i64::MAX)
            .saturating_add(1);
        let mut params: Vec<Box<dyn ToSql + Sync + Send>> = vec![Box::new(limit)];

        let searching = criteria.search().map(|search| {
            params.push(Box::new(LikePattern::contains(search.term())));
            let idx = params.len();
            format!(
                "AND ({})",
                search.columns().iter().format_with(" OR ", |c, f| {
                    f(&format_args!("{c} ILIKE ${idx}::VARCHAR"))
                }),
            )
        });
        let seeking = arguments.cursor().map(|position| {
            format!("AND {}", seek_predicate(order_by, position, &mut params))
        });

        let sql = format!(
            "SELECT id, name, surname, email, profile_path, \
                    created_at, updated_at \
             FROM users \
             WHERE deleted_at IS NULL \
                   {searching} \
                   {seeking} \
             ORDER BY {ordering} \
             LIMIT $1::INT8",
            searching = searching.unwrap_or_default(),
            seeking = seeking.unwrap_or_default(),
            ordering = order_by_clause(order_by),
        );
        let params = params
            .iter()
            .map(|p| -> &(dyn ToSql + Sync) { &**p })
            .collect::<Vec<_>>();
        let edges = self
            .query(&sql, &params)
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|r| {
                let row = Row {
                    id: r.get("id"),
                    name: r.get("name"),
                    surname: r.get("surname"),
                    email: r.get("email"),
                    profile_path: r.get("profile_path"),
                    created_at: r.get("created_at"),
                    updated_at: r.get("updated_at"),
                };
                (order_by.position(&row), row)
            });

        Ok(rows::Page::from_overfetched(&arguments, edges))
    }
}
