//! Prefix-scoped bulk deletion.
//!
//! A drop is irreversible and is issued exactly once. Callers must not retry
//! it blindly after an ambiguous failure.

use tracing::{info, warn};

use crate::error::{AdminError, AdminResult};
use crate::session::AdminSession;
use crate::types::TablePath;

/// Row-key prefix as sent on the wire: the UTF-8 bytes of `prefix`.
pub fn encode_row_key_prefix(prefix: &str) -> Vec<u8> {
    prefix.as_bytes().to_vec()
}

/// Delete every row of `table` whose key starts with `row_key_prefix`.
///
/// An empty prefix is rejected before dispatch since it would match every row.
pub async fn drop_row_range(
    session: &dyn AdminSession,
    table: &TablePath,
    row_key_prefix: &str,
) -> AdminResult<()> {
    if row_key_prefix.is_empty() {
        return Err(AdminError::InvalidArgument(format!(
            "empty row key prefix would drop every row of {table}"
        )));
    }

    let prefix = encode_row_key_prefix(row_key_prefix);
    warn!(
        table = %table,
        prefix = %row_key_prefix,
        prefix_bytes = prefix.len(),
        "Dropping row range"
    );

    session.drop_row_range(table, prefix).await?;

    info!(table = %table, prefix = %row_key_prefix, "Row range dropped");
    Ok(())
}
