//! In-memory admin backend for tests.
//!
//! Behaves like the service for the calls the reconciler makes: creates are
//! rejected with `AlreadyExists`, updates of absent families with `NotFound`,
//! and family batches are applied all-or-nothing. Every call is recorded so
//! tests can assert on the exact sequence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{AdminError, AdminResult};
use crate::session::{AdminConnector, AdminSession};
use crate::types::{ColumnFamily, GcRule, InstancePath, Modification, TableMetadata, TablePath};

/// A call received by an [`InMemoryAdmin`] session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCall {
    ListTables {
        instance: InstancePath,
    },
    GetTable {
        table: TablePath,
    },
    CreateTable {
        table: TablePath,
    },
    ModifyColumnFamilies {
        table: TablePath,
        modifications: Vec<Modification>,
    },
    DropRowRange {
        table: TablePath,
        prefix: Vec<u8>,
    },
}

impl AdminCall {
    pub fn kind(&self) -> CallKind {
        match self {
            AdminCall::ListTables { .. } => CallKind::ListTables,
            AdminCall::GetTable { .. } => CallKind::GetTable,
            AdminCall::CreateTable { .. } => CallKind::CreateTable,
            AdminCall::ModifyColumnFamilies { .. } => CallKind::ModifyColumnFamilies,
            AdminCall::DropRowRange { .. } => CallKind::DropRowRange,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            AdminCall::ListTables { .. } | AdminCall::GetTable { .. }
        )
    }

    pub fn table(&self) -> Option<&TablePath> {
        match self {
            AdminCall::ListTables { .. } => None,
            AdminCall::GetTable { table }
            | AdminCall::CreateTable { table }
            | AdminCall::ModifyColumnFamilies { table, .. }
            | AdminCall::DropRowRange { table, .. } => Some(table),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Connect,
    ListTables,
    GetTable,
    CreateTable,
    ModifyColumnFamilies,
    DropRowRange,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    kind: CallKind,
    table: Option<String>,
    error: AdminError,
}

#[derive(Debug, Default)]
struct StoredTable {
    families: BTreeMap<String, ColumnFamily>,
    rows: BTreeSet<Vec<u8>>,
}

#[derive(Debug, Default)]
struct ClusterState {
    tables: BTreeMap<TablePath, StoredTable>,
    calls: Vec<AdminCall>,
    failures: Vec<InjectedFailure>,
}

impl ClusterState {
    fn failure_for(&self, kind: CallKind, table: Option<&TablePath>) -> Option<AdminError> {
        self.failures
            .iter()
            .find(|failure| {
                failure.kind == kind
                    && match (&failure.table, table) {
                        (None, _) => true,
                        (Some(wanted), Some(table)) => wanted == table.table_id(),
                        (Some(_), None) => false,
                    }
            })
            .map(|failure| failure.error.clone())
    }

    fn record(&mut self, call: AdminCall) -> AdminResult<()> {
        let kind = call.kind();
        let failure = self.failure_for(kind, call.table());
        self.calls.push(call);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Shared fake cluster. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAdmin {
    state: Arc<Mutex<ClusterState>>,
    open_sessions: Arc<AtomicUsize>,
    sessions_opened: Arc<AtomicUsize>,
}

impl InMemoryAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a table with families, without recording a call.
    pub fn add_table(&self, table: &TablePath, families: &[&str]) {
        let mut state = self.state();
        let stored = state.tables.entry(table.clone()).or_default();
        for family in families {
            stored
                .families
                .entry(family.to_string())
                .or_default();
        }
    }

    /// Seed a GC rule on an existing family.
    pub fn set_family_rule(&self, table: &TablePath, family: &str, rule: Option<GcRule>) {
        if let Some(stored) = self.state().tables.get_mut(table) {
            stored
                .families
                .insert(family.to_string(), ColumnFamily { gc_rule: rule });
        }
    }

    /// Seed a row key.
    pub fn insert_row(&self, table: &TablePath, key: &[u8]) {
        if let Some(stored) = self.state().tables.get_mut(table) {
            stored.rows.insert(key.to_vec());
        }
    }

    pub fn rows(&self, table: &TablePath) -> Vec<Vec<u8>> {
        self.state()
            .tables
            .get(table)
            .map(|stored| stored.rows.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn table_exists(&self, table: &TablePath) -> bool {
        self.state().tables.contains_key(table)
    }

    pub fn families(&self, table: &TablePath) -> Option<BTreeMap<String, ColumnFamily>> {
        self.state()
            .tables
            .get(table)
            .map(|stored| stored.families.clone())
    }

    /// Fail every call of `kind`.
    pub fn fail(&self, kind: CallKind, error: AdminError) {
        self.state().failures.push(InjectedFailure {
            kind,
            table: None,
            error,
        });
    }

    /// Fail calls of `kind` that target `table_id`.
    pub fn fail_for_table(&self, kind: CallKind, table_id: &str, error: AdminError) {
        self.state().failures.push(InjectedFailure {
            kind,
            table: Some(table_id.to_string()),
            error,
        });
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    pub fn calls(&self) -> Vec<AdminCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn mutation_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .count()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.kind() == kind)
            .count()
    }

    /// Sessions currently held by callers.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Sessions handed out since creation.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    /// Open a session directly, outside of any connector.
    pub fn session(&self) -> InMemorySession {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        InMemorySession {
            admin: self.clone(),
        }
    }
}

#[async_trait]
impl AdminConnector for InMemoryAdmin {
    async fn connect(&self) -> AdminResult<Box<dyn AdminSession>> {
        if let Some(error) = self.state().failure_for(CallKind::Connect, None) {
            return Err(error);
        }
        Ok(Box::new(self.session()))
    }
}

/// Session handle. Dropping it releases the session.
#[derive(Debug)]
pub struct InMemorySession {
    admin: InMemoryAdmin,
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.admin.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AdminSession for InMemorySession {
    async fn list_tables(&self, instance: &InstancePath) -> AdminResult<BTreeSet<TablePath>> {
        let mut state = self.admin.state();
        state.record(AdminCall::ListTables {
            instance: instance.clone(),
        })?;

        Ok(state
            .tables
            .keys()
            .filter(|table| table.project == instance.project && table.instance == instance.instance)
            .cloned()
            .collect())
    }

    async fn get_table(&self, table: &TablePath) -> AdminResult<TableMetadata> {
        let mut state = self.admin.state();
        state.record(AdminCall::GetTable {
            table: table.clone(),
        })?;

        let stored = state
            .tables
            .get(table)
            .ok_or_else(|| AdminError::NotFound(format!("table {table}")))?;
        Ok(TableMetadata {
            path: table.clone(),
            column_families: stored.families.clone(),
        })
    }

    async fn create_table(&self, instance: &InstancePath, table_id: &str) -> AdminResult<TablePath> {
        let path = instance.table(table_id);
        let mut state = self.admin.state();
        state.record(AdminCall::CreateTable {
            table: path.clone(),
        })?;

        if state.tables.contains_key(&path) {
            return Err(AdminError::AlreadyExists(format!("table {path}")));
        }
        state.tables.insert(path.clone(), StoredTable::default());
        Ok(path)
    }

    async fn modify_column_families(
        &self,
        table: &TablePath,
        modifications: Vec<Modification>,
    ) -> AdminResult<()> {
        let mut state = self.admin.state();
        state.record(AdminCall::ModifyColumnFamilies {
            table: table.clone(),
            modifications: modifications.clone(),
        })?;

        let stored = state
            .tables
            .get_mut(table)
            .ok_or_else(|| AdminError::NotFound(format!("table {table}")))?;

        for modification in &modifications {
            let family = modification.family();
            match modification {
                Modification::Create { .. } if stored.families.contains_key(family) => {
                    return Err(AdminError::AlreadyExists(format!(
                        "column family {family} in {table}"
                    )));
                }
                Modification::UpdateGcRule { .. } if !stored.families.contains_key(family) => {
                    return Err(AdminError::NotFound(format!(
                        "column family {family} in {table}"
                    )));
                }
                _ => {}
            }
        }

        for modification in modifications {
            match modification {
                Modification::Create { family } => {
                    stored.families.insert(family, ColumnFamily::default());
                }
                Modification::UpdateGcRule { family, rule } => {
                    stored
                        .families
                        .insert(family, ColumnFamily { gc_rule: Some(rule) });
                }
            }
        }
        Ok(())
    }

    async fn drop_row_range(&self, table: &TablePath, row_key_prefix: Vec<u8>) -> AdminResult<()> {
        let mut state = self.admin.state();
        state.record(AdminCall::DropRowRange {
            table: table.clone(),
            prefix: row_key_prefix.clone(),
        })?;

        if row_key_prefix.is_empty() {
            return Err(AdminError::InvalidArgument(
                "row key prefix must not be empty".to_string(),
            ));
        }
        let stored = state
            .tables
            .get_mut(table)
            .ok_or_else(|| AdminError::NotFound(format!("table {table}")))?;
        stored.rows.retain(|key| !key.starts_with(&row_key_prefix));
        Ok(())
    }
}
