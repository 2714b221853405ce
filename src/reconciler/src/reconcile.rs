//! Diff-and-apply reconciliation of desired tables and column families
//! against what the cluster reports.
//!
//! ## Guarantees
//!
//! - Additive: nothing is ever dropped or renamed
//! - Idempotent: a second run against an unchanged cluster issues no mutations
//! - A table is created before any family modification targets it
//! - GC rule updates only touch families that already exist

use std::collections::{BTreeMap, BTreeSet};

use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use tracing::{debug, info, warn};

use common::config::ReconcileConfig;

use crate::error::{AdminError, AdminResult};
use crate::schema::DesiredSchema;
use crate::session::AdminSession;
use crate::types::{GcRule, InstancePath, Modification, TableMetadata, TablePath};

/// Attempts at the batched family create when a concurrent writer races us.
const MAX_FAMILY_CREATE_ATTEMPTS: usize = 2;

const DEFAULT_MAX_CONCURRENT_TABLES: usize = 4;

/// What an `ensure_schema` run created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub tables_created: BTreeSet<String>,
    pub families_created: BTreeMap<String, BTreeSet<String>>,
}

impl ReconcileReport {
    /// True when the run found nothing to create.
    pub fn is_noop(&self) -> bool {
        self.tables_created.is_empty() && self.families_created.is_empty()
    }
}

/// Pending work for one table, computed without mutating anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TablePlan {
    pub create_table: bool,
    pub missing_families: BTreeSet<String>,
}

impl TablePlan {
    pub fn is_noop(&self) -> bool {
        !self.create_table && self.missing_families.is_empty()
    }
}

/// Dry-run result of `plan_schema`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaPlan {
    pub tables: BTreeMap<String, TablePlan>,
}

impl SchemaPlan {
    pub fn is_noop(&self) -> bool {
        self.tables.values().all(TablePlan::is_noop)
    }
}

/// What a `set_gc_rule` run updated and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GcReport {
    pub rule: GcRule,
    pub updated: BTreeMap<String, BTreeSet<String>>,
    pub skipped_tables: BTreeSet<String>,
    pub skipped_families: BTreeMap<String, BTreeSet<String>>,
}

impl GcReport {
    fn new(rule: GcRule) -> Self {
        Self {
            rule,
            updated: BTreeMap::new(),
            skipped_tables: BTreeSet::new(),
            skipped_families: BTreeMap::new(),
        }
    }
}

struct EnsureOutcome {
    table: String,
    created: bool,
    families: BTreeSet<String>,
}

struct GcOutcome {
    table: String,
    table_skipped: bool,
    updated: BTreeSet<String>,
    skipped_families: BTreeSet<String>,
}

impl GcOutcome {
    fn skipped(table: String) -> Self {
        Self {
            table,
            table_skipped: true,
            updated: BTreeSet::new(),
            skipped_families: BTreeSet::new(),
        }
    }
}

/// Desired families absent from `metadata`.
pub fn missing_families(metadata: &TableMetadata, desired: &BTreeSet<String>) -> BTreeSet<String> {
    desired
        .iter()
        .filter(|family| !metadata.has_family(family))
        .cloned()
        .collect()
}

/// Brings a cluster's schema in line with a [`DesiredSchema`].
///
/// Tables are reconciled independently, at most `max_concurrent_tables` at a
/// time. The first error aborts the call and cancels the tables still in
/// flight; work already applied stays applied.
#[derive(Debug, Clone)]
pub struct SchemaReconciler {
    max_concurrent_tables: usize,
}

impl Default for SchemaReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_TABLES)
    }
}

impl From<&ReconcileConfig> for SchemaReconciler {
    fn from(config: &ReconcileConfig) -> Self {
        Self::new(config.max_concurrent_tables)
    }
}

impl SchemaReconciler {
    pub fn new(max_concurrent_tables: usize) -> Self {
        Self {
            max_concurrent_tables: max_concurrent_tables.max(1),
        }
    }

    pub fn max_concurrent_tables(&self) -> usize {
        self.max_concurrent_tables
    }

    /// Create every missing table and column family in `desired`.
    ///
    /// This method:
    /// 1. Lists the instance's tables once
    /// 2. Creates each desired table that is absent (`AlreadyExists` counts as success)
    /// 3. Fetches each desired table and creates its missing families in one batch
    pub async fn ensure_schema(
        &self,
        session: &dyn AdminSession,
        instance: &InstancePath,
        desired: &DesiredSchema,
    ) -> AdminResult<ReconcileReport> {
        let existing = session.list_tables(instance).await?;
        debug!(
            instance = %instance,
            existing_tables = existing.len(),
            desired_tables = desired.len(),
            "Listed existing tables"
        );

        let outcomes: Vec<EnsureOutcome> = stream::iter(desired.tables())
            .map(|(table_id, families)| {
                self.ensure_table(session, instance, &existing, table_id, families)
            })
            .buffer_unordered(self.max_concurrent_tables)
            .try_collect()
            .await?;

        let mut report = ReconcileReport::default();
        for outcome in outcomes {
            if outcome.created {
                report.tables_created.insert(outcome.table.clone());
            }
            if !outcome.families.is_empty() {
                report.families_created.insert(outcome.table, outcome.families);
            }
        }

        info!(
            instance = %instance,
            tables_created = report.tables_created.len(),
            families_created = report.families_created.values().map(BTreeSet::len).sum::<usize>(),
            "Schema ensured"
        );

        Ok(report)
    }

    async fn ensure_table(
        &self,
        session: &dyn AdminSession,
        instance: &InstancePath,
        existing: &BTreeSet<TablePath>,
        table_id: &str,
        families: &BTreeSet<String>,
    ) -> AdminResult<EnsureOutcome> {
        let path = instance.table(table_id);
        let mut created = false;

        if !existing.contains(&path) {
            match session.create_table(instance, table_id).await {
                Ok(_) => {
                    info!(table = %path, "Created table");
                    created = true;
                }
                Err(err) if err.is_already_exists() => {
                    debug!(table = %path, "Table created concurrently, continuing");
                }
                Err(err) => return Err(err),
            }
        }

        let families = self.ensure_families(session, &path, families).await?;

        Ok(EnsureOutcome {
            table: table_id.to_string(),
            created,
            families,
        })
    }

    async fn ensure_families(
        &self,
        session: &dyn AdminSession,
        path: &TablePath,
        desired: &BTreeSet<String>,
    ) -> AdminResult<BTreeSet<String>> {
        let mut attempt = 1;
        loop {
            let metadata = session.get_table(path).await?;
            let missing = missing_families(&metadata, desired);
            if missing.is_empty() {
                debug!(table = %path, "All column families present");
                return Ok(missing);
            }

            let modifications = missing.iter().map(Modification::create).collect();
            match session.modify_column_families(path, modifications).await {
                Ok(()) => {
                    info!(table = %path, families = ?missing, "Created column families");
                    return Ok(missing);
                }
                Err(err) if err.is_already_exists() && attempt < MAX_FAMILY_CREATE_ATTEMPTS => {
                    warn!(
                        table = %path,
                        error = %err,
                        "Column family created concurrently, re-reading table"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Compute what `ensure_schema` would do using read calls only.
    ///
    /// Tables absent from the listing are not fetched.
    pub async fn plan_schema(
        &self,
        session: &dyn AdminSession,
        instance: &InstancePath,
        desired: &DesiredSchema,
    ) -> AdminResult<SchemaPlan> {
        let existing = session.list_tables(instance).await?;

        let plans: Vec<(String, TablePlan)> = stream::iter(desired.tables())
            .map(|(table_id, families)| {
                let path = instance.table(table_id);
                let exists = existing.contains(&path);
                async move {
                    if !exists {
                        return Ok((
                            table_id.to_string(),
                            TablePlan {
                                create_table: true,
                                missing_families: families.clone(),
                            },
                        ));
                    }
                    let plan = match session.get_table(&path).await {
                        Ok(metadata) => TablePlan {
                            create_table: false,
                            missing_families: missing_families(&metadata, families),
                        },
                        Err(err) if err.is_not_found() => TablePlan {
                            create_table: true,
                            missing_families: families.clone(),
                        },
                        Err(err) => return Err(err),
                    };
                    Ok((table_id.to_string(), plan))
                }
            })
            .buffer_unordered(self.max_concurrent_tables)
            .try_collect()
            .await?;

        Ok(SchemaPlan {
            tables: plans.into_iter().collect(),
        })
    }

    /// Set `rule` on every desired family that already exists.
    ///
    /// Missing tables and families are skipped with a warning. The current
    /// rule is not compared, so reapplying the same rule still issues the
    /// update.
    pub async fn set_gc_rule(
        &self,
        session: &dyn AdminSession,
        instance: &InstancePath,
        desired: &DesiredSchema,
        rule: GcRule,
    ) -> AdminResult<GcReport> {
        let existing = session.list_tables(instance).await?;
        let (present, absent): (Vec<_>, Vec<_>) = desired
            .tables()
            .partition(|(table_id, _)| existing.contains(&instance.table(*table_id)));

        let mut report = GcReport::new(rule);
        for (table_id, _) in absent {
            warn!(
                table = %instance.table(table_id),
                "Table does not exist, skipping GC rule update"
            );
            report.skipped_tables.insert(table_id.to_string());
        }

        let outcomes: Vec<GcOutcome> = stream::iter(present)
            .map(|(table_id, families)| {
                self.apply_gc_rule(session, instance.table(table_id), families, rule)
            })
            .buffer_unordered(self.max_concurrent_tables)
            .try_collect()
            .await?;

        for outcome in outcomes {
            if outcome.table_skipped {
                report.skipped_tables.insert(outcome.table);
                continue;
            }
            if !outcome.skipped_families.is_empty() {
                report
                    .skipped_families
                    .insert(outcome.table.clone(), outcome.skipped_families);
            }
            if !outcome.updated.is_empty() {
                report.updated.insert(outcome.table, outcome.updated);
            }
        }

        info!(
            instance = %instance,
            rule = %rule,
            tables_updated = report.updated.len(),
            tables_skipped = report.skipped_tables.len(),
            "GC rule applied"
        );

        Ok(report)
    }

    /// Set a max-age rule built from `ttl`, truncated to whole seconds.
    ///
    /// A `ttl` under one second would truncate to zero and is rejected before
    /// any call is made.
    pub async fn set_cell_expiration(
        &self,
        session: &dyn AdminSession,
        instance: &InstancePath,
        desired: &DesiredSchema,
        ttl: std::time::Duration,
    ) -> AdminResult<GcReport> {
        if ttl.as_secs() == 0 {
            return Err(AdminError::InvalidArgument(format!(
                "cell expiration {ttl:?} truncates to zero seconds"
            )));
        }
        self.set_gc_rule(session, instance, desired, GcRule::max_age(ttl))
            .await
    }

    async fn apply_gc_rule(
        &self,
        session: &dyn AdminSession,
        path: TablePath,
        desired: &BTreeSet<String>,
        rule: GcRule,
    ) -> AdminResult<GcOutcome> {
        let table = path.table_id().to_string();
        let metadata = match session.get_table(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.is_not_found() => {
                warn!(table = %path, "Table disappeared, skipping GC rule update");
                return Ok(GcOutcome::skipped(table));
            }
            Err(err) => return Err(err),
        };

        let (present, mut skipped): (BTreeSet<String>, BTreeSet<String>) = desired
            .iter()
            .cloned()
            .partition(|family| metadata.has_family(family));
        for family in &skipped {
            warn!(
                table = %path,
                family = %family,
                "Column family does not exist, skipping GC rule update"
            );
        }

        if present.is_empty() {
            return Ok(GcOutcome {
                table,
                table_skipped: false,
                updated: BTreeSet::new(),
                skipped_families: skipped,
            });
        }

        let modifications = present
            .iter()
            .map(|family| Modification::update_gc_rule(family, rule))
            .collect();
        let updated = match session.modify_column_families(&path, modifications).await {
            Ok(()) => {
                info!(table = %path, families = ?present, rule = %rule, "Updated GC rule");
                present
            }
            Err(err) if err.is_not_found() => {
                warn!(
                    table = %path,
                    error = %err,
                    "Table or column family disappeared, skipping GC rule update"
                );
                skipped.extend(present);
                BTreeSet::new()
            }
            Err(err) => return Err(err),
        };

        Ok(GcOutcome {
            table,
            table_skipped: false,
            updated,
            skipped_families: skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{AdminCall, CallKind, InMemoryAdmin};
    use crate::session::MockAdminSession;
    use crate::types::ColumnFamily;
    use mockall::Sequence;
    use std::time::Duration;

    fn instance() -> InstancePath {
        InstancePath::new("acme", "main")
    }

    fn events() -> TablePath {
        instance().table("events")
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn metadata(path: TablePath, families: &[&str]) -> TableMetadata {
        let mut metadata = TableMetadata::new(path);
        for family in families {
            metadata
                .column_families
                .insert(family.to_string(), ColumnFamily::default());
        }
        metadata
    }

    #[tokio::test]
    async fn test_events_scenario_against_empty_cluster() {
        let admin = InMemoryAdmin::new();
        let session = admin.session();
        let reconciler = SchemaReconciler::new(1);
        let desired = DesiredSchema::new().with_table("events", ["raw", "agg"]);

        let report = reconciler
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap();

        assert_eq!(
            admin.calls(),
            vec![
                AdminCall::ListTables {
                    instance: instance()
                },
                AdminCall::CreateTable { table: events() },
                AdminCall::GetTable { table: events() },
                AdminCall::ModifyColumnFamilies {
                    table: events(),
                    modifications: vec![Modification::create("agg"), Modification::create("raw")],
                },
            ]
        );
        assert_eq!(report.tables_created, set(&["events"]));
        assert_eq!(report.families_created["events"], set(&["agg", "raw"]));

        admin.clear_calls();
        let report = reconciler
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap();

        assert!(report.is_noop());
        assert_eq!(
            admin.calls(),
            vec![
                AdminCall::ListTables {
                    instance: instance()
                },
                AdminCall::GetTable { table: events() },
            ]
        );
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent_for_many_tables() {
        let admin = InMemoryAdmin::new();
        admin.add_table(&instance().table("users"), &["profile"]);
        let session = admin.session();
        let reconciler = SchemaReconciler::new(4);
        let desired = DesiredSchema::new()
            .with_table("events", ["raw", "agg"])
            .with_table("users", ["profile", "settings"])
            .with_table("audit", Vec::<String>::new())
            .with_table("sessions", ["s"]);

        reconciler
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap();
        assert!(admin.mutation_count() > 0);

        admin.clear_calls();
        let report = reconciler
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap();

        assert!(report.is_noop());
        assert_eq!(admin.mutation_count(), 0);
        assert_eq!(admin.count(CallKind::ListTables), 1);
        assert_eq!(admin.count(CallKind::GetTable), 4);
    }

    #[tokio::test]
    async fn test_existing_structures_are_never_removed() {
        let admin = InMemoryAdmin::new();
        let legacy = instance().table("legacy");
        admin.add_table(&legacy, &["old"]);
        admin.add_table(&events(), &["raw", "extra"]);
        admin.set_family_rule(
            &events(),
            "raw",
            Some(GcRule::max_age(Duration::from_secs(3600))),
        );
        let session = admin.session();

        let desired = DesiredSchema::new().with_table("events", ["raw", "agg"]);
        let report = SchemaReconciler::default()
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap();

        assert!(report.tables_created.is_empty());
        assert_eq!(report.families_created["events"], set(&["agg"]));
        assert!(admin.table_exists(&legacy));
        assert!(admin.families(&legacy).unwrap().contains_key("old"));

        let families = admin.families(&events()).unwrap();
        assert_eq!(families.keys().cloned().collect::<BTreeSet<_>>(), set(&["agg", "extra", "raw"]));
        // existing rules are left alone
        assert_eq!(
            families["raw"].gc_rule,
            Some(GcRule::MaxAge(Duration::from_secs(3600)))
        );
    }

    #[tokio::test]
    async fn test_table_is_created_before_its_families_are_modified() {
        let admin = InMemoryAdmin::new();
        let session = admin.session();
        let desired = DesiredSchema::new()
            .with_table("a", ["cf"])
            .with_table("b", ["cf"])
            .with_table("c", ["cf"]);

        SchemaReconciler::new(3)
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap();

        let calls = admin.calls();
        for table_id in ["a", "b", "c"] {
            let path = instance().table(table_id);
            let position = |kind: CallKind| {
                calls
                    .iter()
                    .position(|call| call.kind() == kind && call.table() == Some(&path))
                    .unwrap()
            };
            assert!(position(CallKind::CreateTable) < position(CallKind::GetTable));
            assert!(position(CallKind::GetTable) < position(CallKind::ModifyColumnFamilies));
        }
    }

    #[tokio::test]
    async fn test_table_without_families_gets_no_modify_call() {
        let admin = InMemoryAdmin::new();
        let session = admin.session();
        let desired = DesiredSchema::new().with_table("events", Vec::<String>::new());

        let report = SchemaReconciler::default()
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap();

        assert_eq!(report.tables_created, set(&["events"]));
        assert!(report.families_created.is_empty());
        assert_eq!(admin.count(CallKind::GetTable), 1);
        assert_eq!(admin.count(CallKind::ModifyColumnFamilies), 0);
    }

    #[tokio::test]
    async fn test_admin_error_aborts_with_partial_progress() {
        let admin = InMemoryAdmin::new();
        admin.fail_for_table(
            CallKind::CreateTable,
            "b",
            AdminError::Status {
                code: tonic::Code::ResourceExhausted,
                message: "quota".to_string(),
            },
        );
        let session = admin.session();
        let desired = DesiredSchema::new().with_table("a", ["cf"]).with_table("b", ["cf"]);

        let err = SchemaReconciler::new(1)
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AdminError::Status {
                code: tonic::Code::ResourceExhausted,
                ..
            }
        ));
        // "a" sorts first and was fully applied before "b" failed
        assert!(admin.families(&instance().table("a")).unwrap().contains_key("cf"));
        assert!(!admin.table_exists(&instance().table("b")));

        admin.clear_failures();
        let report = SchemaReconciler::new(1)
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap();
        assert_eq!(report.tables_created, set(&["b"]));
    }

    #[tokio::test]
    async fn test_list_failure_is_propagated() {
        let admin = InMemoryAdmin::new();
        admin.fail(
            CallKind::ListTables,
            AdminError::Status {
                code: tonic::Code::PermissionDenied,
                message: "denied".to_string(),
            },
        );
        let session = admin.session();
        let desired = DesiredSchema::new().with_table("events", ["raw"]);

        assert!(
            SchemaReconciler::default()
                .ensure_schema(&session, &instance(), &desired)
                .await
                .is_err()
        );
        assert_eq!(admin.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrently_created_table_counts_as_success() {
        let mut session = MockAdminSession::new();
        session
            .expect_list_tables()
            .times(1)
            .returning(|_| Ok(BTreeSet::new()));
        session
            .expect_create_table()
            .times(1)
            .returning(|_, _| Err(AdminError::AlreadyExists("events".to_string())));
        session
            .expect_get_table()
            .times(1)
            .returning(|path| Ok(metadata(path.clone(), &["raw"])));
        session.expect_modify_column_families().never();

        let desired = DesiredSchema::new().with_table("events", ["raw"]);
        let report = SchemaReconciler::default()
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap();

        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn test_concurrently_created_family_is_re_read_once() {
        let mut session = MockAdminSession::new();
        let mut seq = Sequence::new();
        session
            .expect_list_tables()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(BTreeSet::from([TablePath::new("acme", "main", "events")])));
        session
            .expect_get_table()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|path| Ok(metadata(path.clone(), &[])));
        session
            .expect_modify_column_families()
            .withf(|_, modifications| {
                modifications == &vec![Modification::create("agg"), Modification::create("raw")]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(AdminError::AlreadyExists("raw".to_string())));
        session
            .expect_get_table()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|path| Ok(metadata(path.clone(), &["raw"])));
        session
            .expect_modify_column_families()
            .withf(|_, modifications| modifications == &vec![Modification::create("agg")])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let desired = DesiredSchema::new().with_table("events", ["raw", "agg"]);
        let report = SchemaReconciler::default()
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap();

        assert_eq!(report.families_created["events"], set(&["agg"]));
    }

    #[tokio::test]
    async fn test_repeated_family_race_propagates() {
        let mut session = MockAdminSession::new();
        session
            .expect_list_tables()
            .returning(|_| Ok(BTreeSet::from([TablePath::new("acme", "main", "events")])));
        session
            .expect_get_table()
            .times(2)
            .returning(|path| Ok(metadata(path.clone(), &[])));
        session
            .expect_modify_column_families()
            .times(2)
            .returning(|_, _| Err(AdminError::AlreadyExists("raw".to_string())));

        let desired = DesiredSchema::new().with_table("events", ["raw"]);
        let err = SchemaReconciler::default()
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap_err();

        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_plan_uses_read_calls_only() {
        let admin = InMemoryAdmin::new();
        admin.add_table(&events(), &["raw"]);
        let session = admin.session();
        let desired = DesiredSchema::new()
            .with_table("events", ["raw", "agg"])
            .with_table("users", ["profile"]);

        let plan = SchemaReconciler::default()
            .plan_schema(&session, &instance(), &desired)
            .await
            .unwrap();

        assert_eq!(admin.mutation_count(), 0);
        assert_eq!(admin.count(CallKind::GetTable), 1);
        assert_eq!(
            plan.tables["events"],
            TablePlan {
                create_table: false,
                missing_families: set(&["agg"]),
            }
        );
        assert_eq!(
            plan.tables["users"],
            TablePlan {
                create_table: true,
                missing_families: set(&["profile"]),
            }
        );
        assert!(!plan.is_noop());
    }

    #[tokio::test]
    async fn test_plan_after_ensure_is_noop() {
        let admin = InMemoryAdmin::new();
        let session = admin.session();
        let desired = DesiredSchema::new().with_table("events", ["raw"]);
        let reconciler = SchemaReconciler::default();

        reconciler
            .ensure_schema(&session, &instance(), &desired)
            .await
            .unwrap();
        let plan = reconciler
            .plan_schema(&session, &instance(), &desired)
            .await
            .unwrap();

        assert!(plan.is_noop());
    }

    #[tokio::test]
    async fn test_gc_rule_skips_missing_table() {
        let admin = InMemoryAdmin::new();
        let session = admin.session();
        let desired = DesiredSchema::new().with_table("T", ["cf1"]);
        let rule = GcRule::max_age(Duration::from_secs(60));

        let report = SchemaReconciler::default()
            .set_gc_rule(&session, &instance(), &desired, rule)
            .await
            .unwrap();

        assert_eq!(admin.mutation_count(), 0);
        assert_eq!(admin.count(CallKind::GetTable), 0);
        assert!(!admin.table_exists(&instance().table("T")));
        assert_eq!(report.skipped_tables, set(&["T"]));
        assert!(report.updated.is_empty());
    }

    #[tokio::test]
    async fn test_gc_rule_skips_missing_family() {
        let admin = InMemoryAdmin::new();
        let table = instance().table("T");
        admin.add_table(&table, &["cf1"]);
        let session = admin.session();
        let desired = DesiredSchema::new().with_table("T", ["cf1", "cf2"]);
        let rule = GcRule::max_age(Duration::from_secs(60));

        let report = SchemaReconciler::default()
            .set_gc_rule(&session, &instance(), &desired, rule)
            .await
            .unwrap();

        let modifies: Vec<AdminCall> = admin
            .calls()
            .into_iter()
            .filter(|call| call.kind() == CallKind::ModifyColumnFamilies)
            .collect();
        assert_eq!(
            modifies,
            vec![AdminCall::ModifyColumnFamilies {
                table: table.clone(),
                modifications: vec![Modification::update_gc_rule("cf1", rule)],
            }]
        );
        assert!(!admin.families(&table).unwrap().contains_key("cf2"));
        assert_eq!(report.updated["T"], set(&["cf1"]));
        assert_eq!(report.skipped_families["T"], set(&["cf2"]));
    }

    #[tokio::test]
    async fn test_gc_rule_reapplication_still_issues_update() {
        let admin = InMemoryAdmin::new();
        admin.add_table(&events(), &["raw"]);
        let session = admin.session();
        let desired = DesiredSchema::new().with_table("events", ["raw"]);
        let rule = GcRule::max_age(Duration::from_secs(60));
        let reconciler = SchemaReconciler::default();

        for _ in 0..2 {
            reconciler
                .set_gc_rule(&session, &instance(), &desired, rule)
                .await
                .unwrap();
        }

        assert_eq!(admin.count(CallKind::ModifyColumnFamilies), 2);
        assert_eq!(admin.families(&events()).unwrap()["raw"].gc_rule, Some(rule));
    }

    #[tokio::test]
    async fn test_gc_rule_table_without_existing_families_issues_no_call() {
        let admin = InMemoryAdmin::new();
        admin.add_table(&events(), &[]);
        let session = admin.session();
        let desired = DesiredSchema::new().with_table("events", ["raw"]);

        let report = SchemaReconciler::default()
            .set_gc_rule(
                &session,
                &instance(),
                &desired,
                GcRule::max_age(Duration::from_secs(1)),
            )
            .await
            .unwrap();

        assert_eq!(admin.mutation_count(), 0);
        assert!(admin.families(&events()).unwrap().is_empty());
        assert_eq!(report.skipped_families["events"], set(&["raw"]));
    }

    #[tokio::test]
    async fn test_cell_expiration_truncates_to_seconds() {
        let admin = InMemoryAdmin::new();
        admin.add_table(&events(), &["raw"]);
        let session = admin.session();
        let desired = DesiredSchema::new().with_table("events", ["raw"]);

        let report = SchemaReconciler::default()
            .set_cell_expiration(&session, &instance(), &desired, Duration::from_millis(7_250))
            .await
            .unwrap();

        let expected = GcRule::MaxAge(Duration::from_secs(7));
        assert_eq!(report.rule, expected);
        assert_eq!(admin.families(&events()).unwrap()["raw"].gc_rule, Some(expected));
    }

    #[tokio::test]
    async fn test_sub_second_cell_expiration_is_rejected_before_dispatch() {
        let admin = InMemoryAdmin::new();
        admin.add_table(&events(), &["raw"]);
        let session = admin.session();
        let desired = DesiredSchema::new().with_table("events", ["raw"]);

        let err = SchemaReconciler::default()
            .set_cell_expiration(&session, &instance(), &desired, Duration::from_millis(500))
            .await
            .unwrap_err();

        assert!(matches!(err, AdminError::InvalidArgument(_)));
        assert!(admin.calls().is_empty());
        assert_eq!(admin.families(&events()).unwrap()["raw"].gc_rule, None);
    }

    #[tokio::test]
    async fn test_plan_treats_vanished_table_as_to_be_created() {
        let mut session = MockAdminSession::new();
        session
            .expect_list_tables()
            .times(1)
            .returning(|_| Ok(BTreeSet::from([TablePath::new("acme", "main", "events")])));
        session
            .expect_get_table()
            .times(1)
            .returning(|_| Err(AdminError::NotFound("events".to_string())));
        session.expect_create_table().never();
        session.expect_modify_column_families().never();

        let desired = DesiredSchema::new().with_table("events", ["raw", "agg"]);
        let plan = SchemaReconciler::default()
            .plan_schema(&session, &instance(), &desired)
            .await
            .unwrap();

        assert_eq!(
            plan.tables["events"],
            TablePlan {
                create_table: true,
                missing_families: set(&["agg", "raw"]),
            }
        );
    }

    #[tokio::test]
    async fn test_gc_rule_skips_table_that_disappears() {
        let mut session = MockAdminSession::new();
        session
            .expect_list_tables()
            .returning(|_| Ok(BTreeSet::from([TablePath::new("acme", "main", "events")])));
        session
            .expect_get_table()
            .times(1)
            .returning(|_| Err(AdminError::NotFound("events".to_string())));
        session.expect_modify_column_families().never();

        let desired = DesiredSchema::new().with_table("events", ["raw"]);
        let report = SchemaReconciler::default()
            .set_gc_rule(
                &session,
                &instance(),
                &desired,
                GcRule::max_age(Duration::from_secs(1)),
            )
            .await
            .unwrap();

        assert_eq!(report.skipped_tables, set(&["events"]));
    }

    #[tokio::test]
    async fn test_gc_rule_admin_error_is_propagated() {
        let admin = InMemoryAdmin::new();
        admin.add_table(&events(), &["raw"]);
        admin.fail(
            CallKind::ModifyColumnFamilies,
            AdminError::Status {
                code: tonic::Code::Unavailable,
                message: "down".to_string(),
            },
        );
        let session = admin.session();
        let desired = DesiredSchema::new().with_table("events", ["raw"]);

        let err = SchemaReconciler::default()
            .set_gc_rule(
                &session,
                &instance(),
                &desired,
                GcRule::max_age(Duration::from_secs(1)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AdminError::Status { .. }));
    }

    #[test]
    fn test_missing_families() {
        let metadata = metadata(events(), &["raw", "extra"]);
        assert_eq!(
            missing_families(&metadata, &set(&["raw", "agg"])),
            set(&["agg"])
        );
        assert!(missing_families(&metadata, &set(&["raw"])).is_empty());
    }

    #[test]
    fn test_concurrency_is_at_least_one() {
        assert_eq!(SchemaReconciler::new(0).max_concurrent_tables(), 1);
        let config = ReconcileConfig {
            max_concurrent_tables: 8,
            dry_run: false,
        };
        assert_eq!(SchemaReconciler::from(&config).max_concurrent_tables(), 8);
    }
}
