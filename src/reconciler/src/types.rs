//! Resource names and schema values exchanged with an admin session.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::AdminError;

/// `projects/{project}/instances/{instance}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InstancePath {
    pub project: String,
    pub instance: String,
}

impl InstancePath {
    pub fn new(project: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            instance: instance.into(),
        }
    }

    /// Path of the table `table_id` inside this instance.
    pub fn table(&self, table_id: impl Into<String>) -> TablePath {
        TablePath {
            project: self.project.clone(),
            instance: self.instance.clone(),
            table: table_id.into(),
        }
    }
}

impl From<&common::config::ClusterConfig> for InstancePath {
    fn from(config: &common::config::ClusterConfig) -> Self {
        Self::new(config.project.clone(), config.instance.clone())
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/instances/{}", self.project, self.instance)
    }
}

/// `projects/{project}/instances/{instance}/tables/{table}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TablePath {
    pub project: String,
    pub instance: String,
    pub table: String,
}

impl TablePath {
    pub fn new(
        project: impl Into<String>,
        instance: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            instance: instance.into(),
            table: table.into(),
        }
    }

    pub fn table_id(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for TablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/instances/{}/tables/{}",
            self.project, self.instance, self.table
        )
    }
}

impl FromStr for TablePath {
    type Err = AdminError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = name.split('/').collect();
        match segments.as_slice() {
            ["projects", project, "instances", instance, "tables", table]
                if !project.is_empty() && !instance.is_empty() && !table.is_empty() =>
            {
                Ok(TablePath::new(*project, *instance, *table))
            }
            _ => Err(AdminError::InvalidResponse(format!(
                "malformed table name '{name}'"
            ))),
        }
    }
}

/// Cell expiration policy attached to a column family.
///
/// Rules of any other kind reported by the service surface as `None` on
/// [`ColumnFamily::gc_rule`] and are never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GcRule {
    /// Cells older than this are eligible for garbage collection.
    MaxAge(#[serde(with = "whole_secs")] Duration),
}

impl GcRule {
    /// Max-age rule truncated to whole seconds.
    pub fn max_age(age: Duration) -> Self {
        GcRule::MaxAge(Duration::from_secs(age.as_secs()))
    }
}

impl fmt::Display for GcRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcRule::MaxAge(age) => write!(f, "max_age={}s", age.as_secs()),
        }
    }
}

mod whole_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(age: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(age.as_secs())
    }
}

/// Observed state of one column family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFamily {
    pub gc_rule: Option<GcRule>,
}

/// Table metadata as returned by `get_table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub path: TablePath,
    pub column_families: BTreeMap<String, ColumnFamily>,
}

impl TableMetadata {
    pub fn new(path: TablePath) -> Self {
        Self {
            path,
            column_families: BTreeMap::new(),
        }
    }

    pub fn has_family(&self, family: &str) -> bool {
        self.column_families.contains_key(family)
    }
}

/// One entry of a batched `modify_column_families` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    /// Create a family with the service's default GC policy.
    Create { family: String },
    /// Replace the GC rule of an existing family.
    UpdateGcRule { family: String, rule: GcRule },
}

impl Modification {
    pub fn create(family: impl Into<String>) -> Self {
        Modification::Create {
            family: family.into(),
        }
    }

    pub fn update_gc_rule(family: impl Into<String>, rule: GcRule) -> Self {
        Modification::UpdateGcRule {
            family: family.into(),
            rule,
        }
    }

    pub fn family(&self) -> &str {
        match self {
            Modification::Create { family } | Modification::UpdateGcRule { family, .. } => family,
        }
    }
}
