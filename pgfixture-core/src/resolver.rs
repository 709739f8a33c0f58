//! Resolve-or-create of fixture records.

use tracing::{debug, info, warn};

use crate::defaults::DefaultValueTable;
use crate::error::{FixtureError, StatementError};
use crate::query::{ExistenceQuery, InsertStatement};
use crate::store::{FixtureStore, FixtureTransaction};
use crate::values::{RelationValues, RelationValuesOption};

/// Outcome of a successful [`FixtureResolver::resolve_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A matching row already existed.
    Found,
    /// The row was inserted.
    Created,
}

/// Ensures records built from per-relation defaults exist in a store.
///
/// Failures are returned, never raised; see [`crate::DbManager`] for the
/// wrapper that aborts the running test instead.
#[derive(Debug)]
pub struct FixtureResolver<S> {
    store: S,
    defaults: DefaultValueTable,
}

impl<S: FixtureStore> FixtureResolver<S> {
    /// Resolver over `store` using `defaults` as the per-relation templates.
    #[must_use]
    pub fn new(store: S, defaults: DefaultValueTable) -> Self {
        Self { store, defaults }
    }

    /// Templates every record starts from.
    #[must_use]
    pub fn defaults(&self) -> &DefaultValueTable {
        &self.defaults
    }

    /// Defaults for `relation` with `options` applied, without touching the
    /// database.
    ///
    /// # Errors
    /// [`FixtureError::UnknownRelation`] when no defaults are configured.
    pub fn relation_values(
        &self,
        relation: &str,
        options: Vec<RelationValuesOption>,
    ) -> Result<RelationValues, FixtureError> {
        self.defaults.resolve(relation, options)
    }

    /// Make sure a row matching the resolved values exists, inserting it
    /// inside a transaction when the check finds nothing.
    ///
    /// A row sharing a unique key but differing elsewhere is not a match;
    /// the insert then fails in the database and surfaces as
    /// [`FixtureError::Insert`].
    ///
    /// # Errors
    /// Any configuration, statement, or database failure. The transaction is
    /// rolled back first; a failed rollback becomes [`FixtureError::Rollback`].
    pub async fn resolve_record(
        &self,
        relation: &str,
        options: Vec<RelationValuesOption>,
    ) -> Result<Resolution, FixtureError> {
        let values = self.relation_values(relation, options)?;
        debug!(
            relation,
            fields = ?values.field_names().collect::<Vec<_>>(),
            "resolving fixture record"
        );

        let mut transaction = self
            .store
            .begin()
            .await
            .map_err(|source| FixtureError::Begin {
                relation: relation.to_owned(),
                source,
            })?;

        match find_or_insert(&mut transaction, relation, &values).await {
            Ok(resolution) => {
                transaction
                    .commit()
                    .await
                    .map_err(|source| FixtureError::Commit {
                        relation: relation.to_owned(),
                        source,
                    })?;
                match resolution {
                    Resolution::Found => debug!(relation, "fixture record already present"),
                    Resolution::Created => info!(relation, "created fixture record"),
                }
                Ok(resolution)
            }
            Err(cause) => Err(rollback(transaction, relation, cause).await),
        }
    }

    /// Insert the resolved values with `ON CONFLICT DO NOTHING`, without an
    /// existence check or explicit transaction.
    ///
    /// Any row that collides on a unique key is accepted as-is, even if its
    /// other fields differ.
    ///
    /// # Errors
    /// Configuration, statement, or database failures other than the ignored
    /// conflict.
    pub async fn create_record(
        &self,
        relation: &str,
        options: Vec<RelationValuesOption>,
    ) -> Result<(), FixtureError> {
        let values = self.relation_values(relation, options)?;
        let statement = InsertStatement::new(relation, &values)
            .map_err(|source| FixtureError::Statement {
                relation: relation.to_owned(),
                source,
            })?
            .on_conflict_do_nothing();

        let affected =
            self.store
                .insert(&statement)
                .await
                .map_err(|source| FixtureError::Insert {
                    relation: relation.to_owned(),
                    source,
                })?;
        debug!(relation, rows_affected = affected, "inserted fixture record ignoring conflicts");
        Ok(())
    }
}

async fn find_or_insert<T: FixtureTransaction>(
    transaction: &mut T,
    relation: &str,
    values: &RelationValues,
) -> Result<Resolution, FixtureError> {
    let statement_error = |source: StatementError| FixtureError::Statement {
        relation: relation.to_owned(),
        source,
    };

    let query = ExistenceQuery::new(relation, values).map_err(statement_error)?;
    let found = transaction
        .exists(&query)
        .await
        .map_err(|source| FixtureError::Check {
            relation: relation.to_owned(),
            source,
        })?;
    if found {
        return Ok(Resolution::Found);
    }

    let statement = InsertStatement::new(relation, values).map_err(statement_error)?;
    transaction
        .insert(&statement)
        .await
        .map_err(|source| FixtureError::Insert {
            relation: relation.to_owned(),
            source,
        })?;
    Ok(Resolution::Created)
}

async fn rollback<T: FixtureTransaction>(
    transaction: T,
    relation: &str,
    cause: FixtureError,
) -> FixtureError {
    warn!(relation, error = %cause, "rolling back fixture transaction");
    match transaction.rollback().await {
        Ok(()) => cause,
        Err(source) => FixtureError::Rollback {
            relation: relation.to_owned(),
            cause: Box::new(cause),
            source,
        },
    }
}
