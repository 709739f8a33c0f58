//! Error types for statement building, fixture resolution and config loading.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to build a statement from a relation name and its values.
#[derive(Debug, Error)]
pub enum StatementError {
    /// Relation or field name is empty, contains NUL, or has more than one
    /// schema qualifier.
    #[error("invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),
    /// Cast target is not a usable type name.
    #[error("invalid SQL type name '{0}'")]
    InvalidType(String),
    /// Nothing to insert.
    #[error("relation '{0}' has no field values")]
    EmptyValues(String),
}

/// Any failure while resolving or creating a fixture record.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// No defaults are configured for the relation.
    #[error("no default values for relation '{0}'")]
    UnknownRelation(String),
    /// The store could not open a transaction.
    #[error("could not begin transaction for '{relation}': {source}")]
    Begin {
        /// Relation being resolved.
        relation: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },
    /// The resolved values do not form a valid statement.
    #[error("could not build statement for '{relation}': {source}")]
    Statement {
        /// Relation being resolved.
        relation: String,
        /// What was wrong with the names or values.
        #[source]
        source: StatementError,
    },
    /// The existence check failed to run.
    #[error("existence check failed for '{relation}': {source}")]
    Check {
        /// Relation being resolved.
        relation: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },
    /// The database rejected the insert, e.g. on a unique key collision.
    #[error("insert failed for '{relation}': {source}")]
    Insert {
        /// Relation being resolved.
        relation: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },
    /// The transaction could not be committed.
    #[error("commit failed for '{relation}': {source}")]
    Commit {
        /// Relation being resolved.
        relation: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },
    /// Rolling back after `cause` failed as well.
    #[error("rollback failed for '{relation}' after {cause}: {source}")]
    Rollback {
        /// Relation being resolved.
        relation: String,
        /// Failure that triggered the rollback.
        cause: Box<FixtureError>,
        /// Driver error from the rollback itself.
        #[source]
        source: sqlx::Error,
    },
}

impl FixtureError {
    /// Relation the failure belongs to.
    #[must_use]
    pub fn relation(&self) -> &str {
        match self {
            Self::UnknownRelation(relation)
            | Self::Begin { relation, .. }
            | Self::Statement { relation, .. }
            | Self::Check { relation, .. }
            | Self::Insert { relation, .. }
            | Self::Commit { relation, .. }
            | Self::Rollback { relation, .. } => relation,
        }
    }
}

/// Failure while loading a [`crate::config::FixtureConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A `.yaml`/`.yml` file did not parse.
    #[error("failed to parse YAML config {path}: {source}")]
    Yaml {
        /// File that was parsed.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_yml::Error,
    },
    /// A `.json` file did not parse.
    #[error("failed to parse JSON config {path}: {source}")]
    Json {
        /// File that was parsed.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// The file extension is neither YAML nor JSON.
    #[error("unsupported configuration format for {0}; use 'yaml' or 'json'")]
    UnsupportedFormat(PathBuf),
    /// An environment override could not be parsed.
    #[error("invalid {name} value '{value}'")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value found in the environment.
        value: String,
    },
}
