use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::erase;
use crate::error::AdminResult;
use crate::reconcile::{GcReport, ReconcileReport, SchemaPlan, SchemaReconciler};
use crate::schema::DesiredSchema;
use crate::session::{AdminConnector, AdminSession};
use crate::types::{GcRule, InstancePath, TablePath};

/// Entry point for top-level operations.
///
/// Every method opens exactly one session, runs one operation against it, and
/// drops the session on return whether the operation succeeded or not.
#[derive(Clone)]
pub struct SchemaAdmin {
    connector: Arc<dyn AdminConnector>,
    reconciler: SchemaReconciler,
}

impl SchemaAdmin {
    pub fn new(connector: Arc<dyn AdminConnector>, reconciler: SchemaReconciler) -> Self {
        Self {
            connector,
            reconciler,
        }
    }

    async fn open(&self) -> AdminResult<Box<dyn AdminSession>> {
        let session = self.connector.connect().await?;
        debug!("Opened admin session");
        Ok(session)
    }

    #[tracing::instrument(skip_all, fields(instance = %instance))]
    pub async fn ensure_schema(
        &self,
        instance: &InstancePath,
        desired: &DesiredSchema,
    ) -> AdminResult<ReconcileReport> {
        let session = self.open().await?;
        self.reconciler
            .ensure_schema(session.as_ref(), instance, desired)
            .await
    }

    #[tracing::instrument(skip_all, fields(instance = %instance))]
    pub async fn plan_schema(
        &self,
        instance: &InstancePath,
        desired: &DesiredSchema,
    ) -> AdminResult<SchemaPlan> {
        let session = self.open().await?;
        self.reconciler
            .plan_schema(session.as_ref(), instance, desired)
            .await
    }

    #[tracing::instrument(skip_all, fields(instance = %instance, rule = %rule))]
    pub async fn set_gc_rule(
        &self,
        instance: &InstancePath,
        desired: &DesiredSchema,
        rule: GcRule,
    ) -> AdminResult<GcReport> {
        let session = self.open().await?;
        self.reconciler
            .set_gc_rule(session.as_ref(), instance, desired, rule)
            .await
    }

    #[tracing::instrument(skip_all, fields(instance = %instance, ttl = ?ttl))]
    pub async fn set_cell_expiration(
        &self,
        instance: &InstancePath,
        desired: &DesiredSchema,
        ttl: Duration,
    ) -> AdminResult<GcReport> {
        let session = self.open().await?;
        self.reconciler
            .set_cell_expiration(session.as_ref(), instance, desired, ttl)
            .await
    }

    #[tracing::instrument(skip_all, fields(table = %table))]
    pub async fn drop_row_range(&self, table: &TablePath, row_key_prefix: &str) -> AdminResult<()> {
        let session = self.open().await?;
        erase::drop_row_range(session.as_ref(), table, row_key_prefix).await
    }
}
