//! Database seam used by the fixture resolver, with the `PgPool` implementation.

use std::fmt;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::trace;

use crate::query::{ExistenceQuery, InsertStatement};

/// A database the resolver can open transactions against.
#[async_trait]
pub trait FixtureStore: Send + Sync {
    /// Transaction handle produced by [`FixtureStore::begin`].
    type Transaction: FixtureTransaction;

    /// Open a transaction.
    ///
    /// # Errors
    /// Returns the driver error if no connection or transaction is available.
    async fn begin(&self) -> Result<Self::Transaction, sqlx::Error>;

    /// Run a single autocommitted insert, returning the rows affected.
    ///
    /// # Errors
    /// Returns the driver error if the statement fails.
    async fn insert(&self, statement: &InsertStatement) -> Result<u64, sqlx::Error>;
}

/// An open transaction. Dropping it without commit rolls back.
#[async_trait]
pub trait FixtureTransaction: Send {
    /// Whether at least one row satisfies `query`.
    async fn exists(&mut self, query: &ExistenceQuery) -> Result<bool, sqlx::Error>;

    /// Insert one row, returning the rows affected.
    async fn insert(&mut self, statement: &InsertStatement) -> Result<u64, sqlx::Error>;

    /// Make the transaction's writes visible.
    async fn commit(self) -> Result<(), sqlx::Error>;

    /// Discard the transaction's writes.
    async fn rollback(self) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl FixtureStore for PgPool {
    type Transaction = PgFixtureTransaction;

    async fn begin(&self) -> Result<Self::Transaction, sqlx::Error> {
        let transaction = PgPool::begin(self).await?;
        Ok(PgFixtureTransaction { transaction })
    }

    async fn insert(&self, statement: &InsertStatement) -> Result<u64, sqlx::Error> {
        let mut builder = statement.to_query_builder();
        trace!(sql = builder.sql(), "executing fixture insert");
        let result = builder.build().execute(self).await?;
        Ok(result.rows_affected())
    }
}

/// [`FixtureTransaction`] over a PostgreSQL transaction.
pub struct PgFixtureTransaction {
    transaction: Transaction<'static, Postgres>,
}

impl fmt::Debug for PgFixtureTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgFixtureTransaction").finish_non_exhaustive()
    }
}

#[async_trait]
impl FixtureTransaction for PgFixtureTransaction {
    async fn exists(&mut self, query: &ExistenceQuery) -> Result<bool, sqlx::Error> {
        let mut builder = query.to_query_builder();
        trace!(sql = builder.sql(), "executing fixture existence check");
        let row = builder
            .build()
            .fetch_optional(&mut *self.transaction)
            .await?;
        Ok(row.is_some())
    }

    async fn insert(&mut self, statement: &InsertStatement) -> Result<u64, sqlx::Error> {
        let mut builder = statement.to_query_builder();
        trace!(sql = builder.sql(), "executing fixture insert");
        let result = builder.build().execute(&mut *self.transaction).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<(), sqlx::Error> {
        self.transaction.commit().await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        self.transaction.rollback().await
    }
}
