//! Idempotent schema reconciliation for wide-column tables.
//!
//! [`SchemaReconciler`] creates missing tables and column families and sets
//! GC rules on existing families. [`erase::drop_row_range`] deletes rows by
//! key prefix. Both drive an [`AdminSession`], which [`SchemaAdmin`] opens per
//! call from an [`AdminConnector`].

pub mod client;
pub mod erase;
pub mod error;
pub mod grpc;
pub mod reconcile;
pub mod schema;
pub mod session;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use client::SchemaAdmin;
pub use error::{AdminError, AdminResult};
pub use grpc::GrpcConnector;
pub use reconcile::{GcReport, ReconcileReport, SchemaPlan, SchemaReconciler, TablePlan};
pub use schema::DesiredSchema;
pub use session::{AdminConnector, AdminSession};
pub use types::{ColumnFamily, GcRule, InstancePath, Modification, TableMetadata, TablePath};
