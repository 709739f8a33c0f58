//! Per-relation default values that every fixture record starts from.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::FixtureError;
use crate::values::{RelationValues, RelationValuesOption};

/// Canonical field values per relation, fixed at construction.
///
/// Reads always hand out a fresh copy so overrides applied in one test can
/// never leak into the next.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct DefaultValueTable {
    relations: HashMap<String, RelationValues>,
}

impl DefaultValueTable {
    /// Build a table from `(relation, values)` pairs.
    #[must_use]
    pub fn new<I, K>(relations: I) -> Self
    where
        I: IntoIterator<Item = (K, RelationValues)>,
        K: Into<String>,
    {
        Self {
            relations: relations
                .into_iter()
                .map(|(relation, values)| (relation.into(), values))
                .collect(),
        }
    }

    /// Whether defaults exist for `relation`.
    #[must_use]
    pub fn contains(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    /// Known relation names, in no particular order.
    pub fn relations(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Copy of the defaults for `relation`.
    ///
    /// # Errors
    /// [`FixtureError::UnknownRelation`] when `relation` has no defaults.
    pub fn get(&self, relation: &str) -> Result<RelationValues, FixtureError> {
        self.relations
            .get(relation)
            .cloned()
            .ok_or_else(|| FixtureError::UnknownRelation(relation.to_owned()))
    }

    /// Copy of the defaults for `relation` with `options` applied in order.
    ///
    /// # Errors
    /// [`FixtureError::UnknownRelation`] when `relation` has no defaults; the
    /// options are not run in that case.
    pub fn resolve(
        &self,
        relation: &str,
        options: impl IntoIterator<Item = RelationValuesOption>,
    ) -> Result<RelationValues, FixtureError> {
        let mut values = self.get(relation)?;
        values.apply(options);
        Ok(values)
    }
}

impl<K: Into<String>> FromIterator<(K, RelationValues)> for DefaultValueTable {
    fn from_iter<I: IntoIterator<Item = (K, RelationValues)>>(iter: I) -> Self {
        Self::new(iter)
    }
}
