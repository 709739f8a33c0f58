//! Statement plans for the existence check and the insert.
//!
//! Plans validate their names and cast types up front and render into a
//! [`sqlx::QueryBuilder`], which numbers placeholders `$1..$n` and binds each
//! literal. Expressions and `NULL` are written into the SQL text directly.
//!
//! Every relation and field name is written as a quoted identifier, so
//! reserved words such as `order` or `user` work as column and table names.
//! Quoting also makes names case-sensitive: `Users` and `users` are different
//! tables. A name already wrapped in double quotes is used as written.

use sqlx::{Postgres, QueryBuilder};

use crate::error::StatementError;
use crate::values::{FieldValue, RelationValues};

/// One condition of an existence check.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field = $n`
    Eq(String, FieldValue),
    /// `field IS NULL`
    IsNull(String),
}

/// `SELECT 1 FROM relation WHERE ... LIMIT 1`
#[derive(Debug, Clone, PartialEq)]
pub struct ExistenceQuery {
    relation: String,
    filters: Vec<Filter>,
}

impl ExistenceQuery {
    /// Filter on every non-expression field of `values`.
    ///
    /// # Errors
    /// [`StatementError`] for an invalid relation, field or cast type name,
    /// or when `values` is empty.
    pub fn new(relation: &str, values: &RelationValues) -> Result<Self, StatementError> {
        validate_relation(relation)?;
        if values.is_empty() {
            return Err(StatementError::EmptyValues(relation.to_owned()));
        }

        let filters = values
            .comparable()
            .map(|(field, value)| {
                validate_identifier(field)?;
                validate_value(value)?;
                Ok(match value {
                    FieldValue::Null => Filter::IsNull(field.to_owned()),
                    other => Filter::Eq(field.to_owned(), other.clone()),
                })
            })
            .collect::<Result<Vec<_>, StatementError>>()?;

        Ok(Self {
            relation: relation.to_owned(),
            filters,
        })
    }

    /// Relation name as given.
    #[must_use]
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// Conditions in field name order.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Evaluate the filter against an in-memory row.
    #[must_use]
    pub fn matches(&self, row: &RelationValues) -> bool {
        self.filters.iter().all(|filter| match filter {
            Filter::Eq(field, value) => row.get(field) == Some(value),
            Filter::IsNull(field) => matches!(row.get(field), None | Some(FieldValue::Null)),
        })
    }

    /// Render into a builder ready to `build()` and run.
    #[must_use]
    pub fn to_query_builder(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("SELECT 1 FROM ");
        builder.push(quote_relation(&self.relation));

        for (index, filter) in self.filters.iter().enumerate() {
            builder.push(if index == 0 { " WHERE " } else { " AND " });
            match filter {
                Filter::Eq(field, value) => {
                    builder.push(quote_identifier(field)).push(" = ");
                    push_value(&mut builder, value);
                }
                Filter::IsNull(field) => {
                    builder.push(quote_identifier(field)).push(" IS NULL");
                }
            }
        }

        builder.push(" LIMIT 1");
        builder
    }
}

/// What to do when an insert hits a unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictAction {
    /// Let the database reject the row.
    #[default]
    Fail,
    /// Append `ON CONFLICT DO NOTHING`.
    DoNothing,
}

/// `INSERT INTO relation (fields) VALUES (...)`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    relation: String,
    values: RelationValues,
    on_conflict: ConflictAction,
}

impl InsertStatement {
    /// Insert every field of `values`, expressions included.
    ///
    /// # Errors
    /// [`StatementError`] for an invalid relation, field or cast type name,
    /// or when `values` is empty.
    pub fn new(relation: &str, values: &RelationValues) -> Result<Self, StatementError> {
        validate_relation(relation)?;
        if values.is_empty() {
            return Err(StatementError::EmptyValues(relation.to_owned()));
        }
        for (field, value) in values.iter() {
            validate_identifier(field)?;
            validate_value(value)?;
        }

        Ok(Self {
            relation: relation.to_owned(),
            values: values.clone(),
            on_conflict: ConflictAction::Fail,
        })
    }

    /// Ignore rows that collide with an existing unique key.
    #[must_use]
    pub fn on_conflict_do_nothing(mut self) -> Self {
        self.on_conflict = ConflictAction::DoNothing;
        self
    }

    /// Relation name as given.
    #[must_use]
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// Row to insert.
    #[must_use]
    pub fn values(&self) -> &RelationValues {
        &self.values
    }

    /// Conflict handling appended to the insert.
    #[must_use]
    pub fn on_conflict(&self) -> ConflictAction {
        self.on_conflict
    }

    /// Render into a builder ready to `build()` and run.
    #[must_use]
    pub fn to_query_builder(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("INSERT INTO ");
        builder.push(quote_relation(&self.relation)).push(" (");

        for (index, field) in self.values.field_names().enumerate() {
            if index > 0 {
                builder.push(", ");
            }
            builder.push(quote_identifier(field));
        }

        builder.push(") VALUES (");
        for (index, (_, value)) in self.values.iter().enumerate() {
            if index > 0 {
                builder.push(", ");
            }
            push_value(&mut builder, value);
        }
        builder.push(")");

        if self.on_conflict == ConflictAction::DoNothing {
            builder.push(" ON CONFLICT DO NOTHING");
        }
        builder
    }
}

fn push_value(builder: &mut QueryBuilder<'static, Postgres>, value: &FieldValue) {
    match value {
        FieldValue::Null => builder.push("NULL"),
        FieldValue::Bool(value) => builder.push_bind(*value),
        FieldValue::Int(value) => builder.push_bind(*value),
        FieldValue::Float(value) => builder.push_bind(*value),
        FieldValue::Text(value) => builder.push_bind(value.clone()),
        FieldValue::Uuid(value) => builder.push_bind(*value),
        FieldValue::Timestamp(value) => builder.push_bind(*value),
        FieldValue::Expr(expr) => builder.push(expr.as_str()),
        FieldValue::Cast { value, pg_type } => {
            builder.push_bind(value.clone()).push("::").push(pg_type)
        }
    };
}

/// `name` as a double-quoted identifier, with embedded quotes doubled.
pub(crate) fn quote_identifier(name: &str) -> String {
    if is_quoted(name) {
        name.to_owned()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

// A well-formed quoted identifier: wrapped in quotes, non-empty, and every
// inner quote doubled.
fn is_quoted(name: &str) -> bool {
    name.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .is_some_and(|inner| !inner.is_empty() && !inner.replace("\"\"", "").contains('"'))
}

fn quote_relation(relation: &str) -> String {
    split_relation(relation)
        .into_iter()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

// Splits on dots outside double quotes, so `"my.schema".users` has two parts.
fn split_relation(relation: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (index, c) in relation.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '.' if !quoted => {
                parts.push(&relation[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&relation[start..]);
    parts
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('\0')
}

fn validate_identifier(name: &str) -> Result<(), StatementError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(StatementError::InvalidIdentifier(name.to_owned()))
    }
}

// Relations may carry a single schema qualifier.
fn validate_relation(relation: &str) -> Result<(), StatementError> {
    let parts = split_relation(relation);
    if parts.len() <= 2 && parts.into_iter().all(is_valid_name) {
        Ok(())
    } else {
        Err(StatementError::InvalidIdentifier(relation.to_owned()))
    }
}

// Type names are written verbatim after `::`: letters, digits, `_`, `$`,
// schema dots, array brackets, spaces (`double precision`) and quotes.
fn is_type_name(pg_type: &str) -> bool {
    pg_type.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '"')
        && pg_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | ' ' | '"' | '[' | ']'))
}

fn validate_value(value: &FieldValue) -> Result<(), StatementError> {
    match value {
        FieldValue::Cast { pg_type, .. } if !is_type_name(pg_type) => {
            Err(StatementError::InvalidType(pg_type.clone()))
        }
        _ => Ok(()),
    }
}
