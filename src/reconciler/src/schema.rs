use std::collections::{BTreeMap, BTreeSet};

use common::config::SchemaConfig;

/// Desired tables and the column families each one must contain.
///
/// Correctness never depends on iteration order. The ordered containers only
/// keep logs and call batches stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredSchema {
    tables: BTreeMap<String, BTreeSet<String>>,
}

impl DesiredSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, merging families if it is already present.
    pub fn with_table<I, S>(mut self, table: impl Into<String>, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(table, families);
        self
    }

    pub fn insert<I, S>(&mut self, table: impl Into<String>, families: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .entry(table.into())
            .or_default()
            .extend(families.into_iter().map(Into::into));
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn families(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.tables.get(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.tables
            .iter()
            .map(|(table, families)| (table.as_str(), families))
    }
}

impl From<&SchemaConfig> for DesiredSchema {
    fn from(config: &SchemaConfig) -> Self {
        config
            .tables
            .iter()
            .fold(DesiredSchema::new(), |schema, (table, families)| {
                schema.with_table(table.clone(), families.iter().cloned())
            })
    }
}
