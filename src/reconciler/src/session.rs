//! The administrative capability the reconciler drives.
//!
//! A session is acquired from an [`AdminConnector`] at the start of a
//! top-level operation and released by dropping it. Implementations must free
//! their underlying channel in `Drop` so that every exit path, including early
//! `?` returns, releases the session.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::AdminResult;
use crate::types::{InstancePath, Modification, TableMetadata, TablePath};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminSession: Send + Sync {
    /// All tables under `instance`.
    async fn list_tables(&self, instance: &InstancePath) -> AdminResult<BTreeSet<TablePath>>;

    /// Current column families of `table` and their GC rules.
    async fn get_table(&self, table: &TablePath) -> AdminResult<TableMetadata>;

    /// Create an empty table. Fails with `AlreadyExists` if it is present.
    async fn create_table(&self, instance: &InstancePath, table_id: &str)
    -> AdminResult<TablePath>;

    /// Apply a batch of family modifications to one table.
    async fn modify_column_families(
        &self,
        table: &TablePath,
        modifications: Vec<Modification>,
    ) -> AdminResult<()>;

    /// Delete every row of `table` whose key starts with `row_key_prefix`.
    async fn drop_row_range(&self, table: &TablePath, row_key_prefix: Vec<u8>) -> AdminResult<()>;
}

/// Opens admin sessions.
#[async_trait]
pub trait AdminConnector: Send + Sync {
    async fn connect(&self) -> AdminResult<Box<dyn AdminSession>>;
}
