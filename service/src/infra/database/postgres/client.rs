//! Postgres database client definitions.

use std::sync::Arc;

use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection, Connection},
};

/// Non-transactional Postgres database client.
///
/// Every statement runs in a [`connection::Client`] taken from the
/// [`connection::Pool`] for this statement only.
#[derive(Clone, Debug)]
pub struct NonTx {
    /// [`connection::Pool`] to take [`connection::Client`]s from.
    pool: connection::Pool,
}

impl NonTx {
    /// Creates a new [`NonTx`] client over the provided [`connection::Pool`].
    #[must_use]
    pub(crate) fn from_pool(pool: connection::Pool) -> Self {
        Self { pool }
    }

    /// Takes a [`connection::Client`] from the [`connection::Pool`].
    pub(crate) async fn client(
        &self,
    ) -> Result<connection::Client, Traced<database::Error>> {
        self.pool
            .get()
            .await
            .map_err(tracerr::from_and_wrap!(=> postgres::Error))
            .map_err(tracerr::map_from)
    }
}

impl Connection for NonTx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.client()
            .await
            .map_err(tracerr::wrap!())?
            .query(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn query_opt<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.client()
            .await
            .map_err(tracerr::wrap!())?
            .query_opt(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.client()
            .await
            .map_err(tracerr::wrap!())?
            .exec(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Transactional Postgres database client.
///
/// The [`connection::Transaction`] is begun lazily, on the first statement.
/// Dropping this client without [committing][0] rolls the transaction back.
///
/// [0]: Tx::commit
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`NonTx`] client to take a [`connection::Client`] from.
    non_tx: NonTx,

    /// Lazily begun [`connection::Transaction`].
    tx: Arc<Mutex<Option<connection::Transaction>>>,
}

impl Tx {
    /// Creates a new [`Tx`] client out of the provided [`NonTx`] one.
    #[must_use]
    pub fn from_non_tx(non_tx: NonTx) -> Self {
        Self {
            non_tx,
            tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the [`connection::Transaction`] of this [`Tx`] client, beginning
    /// it if necessary.
    async fn transaction(
        &self,
    ) -> Result<MappedMutexGuard<'_, connection::Transaction>, Traced<database::Error>>
    {
        let mut guard = self.tx.lock().await;
        if guard.is_none() {
            let client = self.non_tx.client().await.map_err(tracerr::wrap!())?;
            *guard = Some(
                connection::Transaction::begin(client)
                    .await
                    .map_err(tracerr::wrap!())?,
            );
        }
        Ok(MutexGuard::map(guard, |tx| {
            tx.as_mut().expect("begun right above")
        }))
    }

    /// Commits this [`Tx`] client.
    ///
    /// Does nothing if no statement has been run.
    ///
    /// # Errors
    ///
    /// If failed to commit the transaction of this [`Tx`] client.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        let Some(tx) = self.tx.lock().await.take() else {
            return Ok(());
        };
        tx.commit().await.map_err(tracerr::wrap!())
    }
}

impl Connection for Tx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.transaction()
            .await
            .map_err(tracerr::wrap!())?
            .query(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn query_opt<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.transaction()
            .await
            .map_err(tracerr::wrap!())?
            .query_opt(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.transaction()
            .await
            .map_err(tracerr::wrap!())?
            .exec(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }
}
