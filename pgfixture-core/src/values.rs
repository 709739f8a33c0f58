//! Field values and the per-relation value sets fixture rows are built from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// An opaque SQL expression rendered verbatim into inserts, such as `now()`.
///
/// Expression-valued fields are never part of an existence check because
/// their value is only known once the database evaluates them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SqlExpr(String);

impl SqlExpr {
    /// Wrap raw SQL text. The text is trusted and inserted without escaping.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    /// The database's current timestamp.
    #[must_use]
    pub fn current_timestamp() -> Self {
        Self::new("CURRENT_TIMESTAMP")
    }

    /// Raw SQL text of the expression.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single column value of a fixture record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawFieldValue")]
pub enum FieldValue {
    /// SQL `NULL`.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal, bound as `BIGINT`.
    Int(i64),
    /// Floating point literal, bound as `DOUBLE PRECISION`.
    Float(f64),
    /// Text literal.
    Text(String),
    /// UUID literal.
    Uuid(Uuid),
    /// Timestamp literal, bound as `TIMESTAMPTZ`.
    Timestamp(DateTime<Utc>),
    /// Opaque SQL expression.
    Expr(SqlExpr),
    /// Text bound as a parameter and cast server-side, rendered `$n::pg_type`.
    ///
    /// Reaches column types no other variant binds to, such as enums,
    /// `date`, `jsonb` or `inet`.
    Cast {
        /// Text form of the value, as PostgreSQL would parse it.
        value: String,
        /// Target type name, written verbatim after `::`.
        pg_type: String,
    },
}

impl FieldValue {
    /// Text `value` cast to `pg_type` by the database.
    #[must_use]
    pub fn cast(value: impl Into<String>, pg_type: impl Into<String>) -> Self {
        Self::Cast {
            value: value.into(),
            pg_type: pg_type.into(),
        }
    }

    /// Whether the value is an opaque SQL expression.
    #[must_use]
    pub const fn is_expr(&self) -> bool {
        matches!(self, Self::Expr(_))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<SqlExpr> for FieldValue {
    fn from(value: SqlExpr) -> Self {
        Self::Expr(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// Untagged scalars map directly; `{expr: ..}`, `{uuid: ..}`,
// `{timestamp: ..}` and `{cast: {value, type}}` select the typed variants.
// `Unsigned` only catches integers past `i64::MAX`, which would otherwise
// fall through to `Float`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFieldValue {
    Null(()),
    Bool(bool),
    Int(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
    Tagged(TaggedValue),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaggedValue {
    Expr(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Cast(CastValue),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CastValue {
    value: String,
    #[serde(rename = "type")]
    pg_type: String,
}

impl TryFrom<RawFieldValue> for FieldValue {
    type Error = String;

    fn try_from(raw: RawFieldValue) -> Result<Self, Self::Error> {
        Ok(match raw {
            RawFieldValue::Null(()) => Self::Null,
            RawFieldValue::Bool(value) => Self::Bool(value),
            RawFieldValue::Int(value) => Self::Int(value),
            RawFieldValue::Unsigned(value) => {
                return Err(format!("integer {value} is out of range for BIGINT"));
            }
            RawFieldValue::Float(value) => Self::Float(value),
            RawFieldValue::Text(value) => Self::Text(value),
            RawFieldValue::Tagged(TaggedValue::Expr(sql)) => Self::Expr(SqlExpr::new(sql)),
            RawFieldValue::Tagged(TaggedValue::Uuid(value)) => Self::Uuid(value),
            RawFieldValue::Tagged(TaggedValue::Timestamp(value)) => Self::Timestamp(value),
            RawFieldValue::Tagged(TaggedValue::Cast(CastValue { value, pg_type })) => {
                Self::Cast { value, pg_type }
            }
        })
    }
}

/// Field name to value mapping for one record.
///
/// Keys are unique. Iteration is sorted by field name so generated SQL is
/// stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RelationValues(BTreeMap<String, FieldValue>);

impl RelationValues {
    /// An empty value set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`RelationValues::set`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    /// Set or replace a field, returning the previous value.
    pub fn set(
        &mut self,
        field: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.0.insert(field.into(), value.into())
    }

    /// Look up a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no fields are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// Field names in name order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Fields that can take part in an equality filter.
    pub(crate) fn comparable(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.iter().filter(|(_, value)| !value.is_expr())
    }

    /// Apply overrides in order; later overrides win.
    pub fn apply(&mut self, options: impl IntoIterator<Item = RelationValuesOption>) {
        for option in options {
            option(self);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for RelationValues
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        )
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for RelationValues
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from(fields: [(K, V); N]) -> Self {
        fields.into_iter().collect()
    }
}

/// Deferred mutation applied to a copy of a relation's default values.
pub type RelationValuesOption = Box<dyn FnOnce(&mut RelationValues) + Send>;

/// Override that sets `field` to `value`, replacing any default.
#[must_use]
pub fn set_field_value(
    field: impl Into<String>,
    value: impl Into<FieldValue>,
) -> RelationValuesOption {
    let field = field.into();
    let value = value.into();
    Box::new(move |values: &mut RelationValues| {
        values.set(field, value);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_field_value_replaces_existing_value() {
        let mut values = RelationValues::from([("id", "u1"), ("name", "Alice")]);
        values.apply(vec![set_field_value("name", "Bob")]);

        assert_eq!(values.get("name"), Some(&FieldValue::from("Bob")));
        assert_eq!(values.get("id"), Some(&FieldValue::from("u1")));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn later_overrides_win() {
        let mut values = RelationValues::from([("id", "u1")]);
        values.apply(vec![
            set_field_value("id", "u2"),
            set_field_value("age", 30),
            set_field_value("id", "u3"),
        ]);

        assert_eq!(values.get("id"), Some(&FieldValue::Text("u3".into())));
        assert_eq!(values.get("age"), Some(&FieldValue::Int(30)));
    }

    #[test]
    fn custom_closures_are_overrides() {
        let mut values = RelationValues::from([("id", "u1")]);
        let clear: RelationValuesOption = Box::new(|values: &mut RelationValues| {
            values.set("deleted_at", None::<String>);
        });
        values.apply(vec![clear]);

        assert_eq!(values.get("deleted_at"), Some(&FieldValue::Null));
    }

    #[test]
    fn comparable_skips_expressions() {
        let values = RelationValues::new()
            .with("id", 7)
            .with("created_at", SqlExpr::current_timestamp())
            .with("note", None::<&str>);

        let comparable: Vec<_> = values.comparable().map(|(field, _)| field).collect();
        assert_eq!(comparable, vec!["id", "note"]);
    }

    #[test]
    fn iteration_is_sorted_by_field() {
        let values = RelationValues::from([("z", 1), ("a", 2), ("m", 3)]);
        let fields: Vec<_> = values.field_names().collect();
        assert_eq!(fields, vec!["a", "m", "z"]);
    }

    #[test]
    fn deserializes_scalars_and_tagged_values() {
        let json = r#"{
            "active": true,
            "age": 42,
            "score": 1.5,
            "name": "Alice",
            "manager": null,
            "created_at": {"expr": "now()"},
            "external_id": {"uuid": "550e8400-e29b-41d4-a716-446655440000"},
            "joined": {"timestamp": "2024-01-02T03:04:05Z"}
        }"#;
        let values: RelationValues = serde_json::from_str(json).expect("Should deserialize");

        assert_eq!(values.get("active"), Some(&FieldValue::Bool(true)));
        assert_eq!(values.get("age"), Some(&FieldValue::Int(42)));
        assert_eq!(values.get("score"), Some(&FieldValue::Float(1.5)));
        assert_eq!(values.get("name"), Some(&FieldValue::Text("Alice".into())));
        assert_eq!(values.get("manager"), Some(&FieldValue::Null));
        assert_eq!(
            values.get("created_at"),
            Some(&FieldValue::Expr(SqlExpr::new("now()")))
        );
        assert!(matches!(values.get("external_id"), Some(FieldValue::Uuid(_))));
        assert!(matches!(values.get("joined"), Some(FieldValue::Timestamp(_))));
    }

    #[test]
    fn deserializes_cast_values() {
        let yaml = "status:\n  cast:\n    value: active\n    type: account_status\n";
        let values: RelationValues = serde_yml::from_str(yaml).expect("Should deserialize");

        assert_eq!(
            values.get("status"),
            Some(&FieldValue::cast("active", "account_status"))
        );
    }

    #[test]
    fn cast_requires_a_type() {
        let json = r#"{"day": {"cast": {"value": "2024-01-02"}}}"#;
        let result = serde_json::from_str::<RelationValues>(json);
        assert!(result.is_err());
    }

    #[test]
    fn integers_past_bigint_are_rejected() {
        let result = serde_json::from_str::<RelationValues>(r#"{"id": 18446744073709551615}"#);
        let err = result.expect_err("Should reject an integer past i64::MAX");
        assert!(
            err.to_string().contains("out of range for BIGINT"),
            "unexpected error: {err}"
        );

        let values: RelationValues =
            serde_json::from_str(r#"{"id": 9223372036854775807}"#).expect("Should deserialize");
        assert_eq!(values.get("id"), Some(&FieldValue::Int(i64::MAX)));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let result = serde_json::from_str::<RelationValues>(r#"{"x": {"blob": "00"}}"#);
        assert!(result.is_err());
    }
}
