//! Declarative PostgreSQL fixtures for integration tests.
//!
//! A [`DbManager`] holds default field values per relation. Tests ask it to
//! make sure a record exists, optionally overriding individual fields with
//! [`set_field_value`]; the record is inserted only when no matching row is
//! found, and any failure aborts the test immediately.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod defaults;
pub mod error;
pub mod manager;
pub mod query;
pub mod resolver;
pub mod store;
pub mod telemetry;
pub mod values;


pub use config::FixtureConfig;
pub use defaults::DefaultValueTable;
pub use error::{ConfigError, FixtureError, StatementError};
pub use manager::{DbManager, FatalReporter, PanicReporter};
pub use resolver::{FixtureResolver, Resolution};
pub use store::{FixtureStore, FixtureTransaction, PgFixtureTransaction};
pub use telemetry::init_test_tracing;
pub use values::{FieldValue, RelationValues, RelationValuesOption, SqlExpr, set_field_value};
