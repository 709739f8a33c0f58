//! Fatal-on-error front end used directly from tests.

use tracing::error;

use crate::defaults::DefaultValueTable;
use crate::error::FixtureError;
use crate::resolver::FixtureResolver;
use crate::store::FixtureStore;
use crate::values::RelationValuesOption;

/// Sink that ends the running test. Never returns.
pub trait FatalReporter: Send + Sync {
    /// Abort the current test with `message`.
    fn fatal(&self, message: &str) -> !;
}

/// Reports by panicking, which fails the enclosing `#[test]` or
/// `#[tokio::test]` on the spot.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicReporter;

impl FatalReporter for PanicReporter {
    fn fatal(&self, message: &str) -> ! {
        error!(reason = message, "fixture setup failed");
        panic!("{message}");
    }
}

/// Test-facing fixture manager.
///
/// Wraps a [`FixtureResolver`] and turns every failure into an immediate
/// abort through its [`FatalReporter`], so a test never runs against
/// half-prepared data.
///
/// ```no_run
/// use pgfixture::{DbManager, DefaultValueTable, PanicReporter, RelationValues, set_field_value};
///
/// # async fn setup(pool: sqlx::PgPool) {
/// let defaults = DefaultValueTable::new([(
///     "users",
///     RelationValues::from([("id", "u1"), ("name", "Alice")]),
/// )]);
/// let fixtures = DbManager::new(pool, PanicReporter, defaults);
///
/// fixtures.resolve_record("users", vec![]).await;
/// fixtures
///     .resolve_record("users", vec![set_field_value("id", "u2")])
///     .await;
/// # }
/// ```
#[derive(Debug)]
pub struct DbManager<S, R = PanicReporter> {
    resolver: FixtureResolver<S>,
    reporter: R,
}

impl<S: FixtureStore, R: FatalReporter> DbManager<S, R> {
    /// Manager over `store` that aborts through `reporter` on any failure.
    #[must_use]
    pub fn new(store: S, reporter: R, defaults: DefaultValueTable) -> Self {
        Self {
            resolver: FixtureResolver::new(store, defaults),
            reporter,
        }
    }

    /// Ensure a record built from the relation's defaults and `options`
    /// exists, creating it transactionally when missing.
    pub async fn resolve_record(&self, relation: &str, options: Vec<RelationValuesOption>) {
        if let Err(err) = self.resolver.resolve_record(relation, options).await {
            self.report("resolve", &err);
        }
    }

    /// Insert a record with `ON CONFLICT DO NOTHING`, accepting any existing
    /// row that collides on a unique key.
    pub async fn create_record(&self, relation: &str, options: Vec<RelationValuesOption>) {
        if let Err(err) = self.resolver.create_record(relation, options).await {
            self.report("create", &err);
        }
    }

    fn report(&self, action: &str, err: &FixtureError) -> ! {
        let message = fatal_message(action, err);
        self.reporter.fatal(&message)
    }
}

fn fatal_message(action: &str, err: &FixtureError) -> String {
    match err {
        FixtureError::UnknownRelation(_) => err.to_string(),
        other => format!(
            "Test setup failed: could not {action} test record for '{}': {other}",
            other.relation()
        ),
    }
}
