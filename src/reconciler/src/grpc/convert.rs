//! Conversions between domain types and the admin protocol messages.

use std::time::Duration;

use admin_api::v2;
use admin_api::v2::gc_rule::Rule;
use admin_api::v2::modify_column_families_request::modification::Mod;

use crate::types::{ColumnFamily, GcRule, Modification, TableMetadata, TablePath};

pub fn gc_rule_to_proto(rule: &GcRule) -> v2::GcRule {
    match rule {
        GcRule::MaxAge(age) => v2::GcRule {
            rule: Some(Rule::MaxAge(prost_types::Duration {
                seconds: i64::try_from(age.as_secs()).unwrap_or(i64::MAX),
                nanos: 0,
            })),
        },
    }
}

/// Only plain max-age rules are understood. Anything else is opaque.
pub fn gc_rule_from_proto(rule: &v2::GcRule) -> Option<GcRule> {
    match &rule.rule {
        Some(Rule::MaxAge(age)) => u64::try_from(age.seconds)
            .ok()
            .map(|seconds| GcRule::MaxAge(Duration::from_secs(seconds))),
        _ => None,
    }
}

pub fn modification_to_proto(
    modification: Modification,
) -> v2::modify_column_families_request::Modification {
    match modification {
        Modification::Create { family } => v2::modify_column_families_request::Modification {
            id: family,
            r#mod: Some(Mod::Create(v2::ColumnFamily { gc_rule: None })),
        },
        Modification::UpdateGcRule { family, rule } => {
            v2::modify_column_families_request::Modification {
                id: family,
                r#mod: Some(Mod::Update(v2::ColumnFamily {
                    gc_rule: Some(gc_rule_to_proto(&rule)),
                })),
            }
        }
    }
}

pub fn table_metadata(path: TablePath, table: v2::Table) -> TableMetadata {
    let column_families = table
        .column_families
        .into_iter()
        .map(|(family, column_family)| {
            let gc_rule = column_family.gc_rule.as_ref().and_then(gc_rule_from_proto);
            (family, ColumnFamily { gc_rule })
        })
        .collect();

    TableMetadata {
        path,
        column_families,
    }
}
