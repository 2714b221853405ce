//! Protobuf and tonic bindings for the table administration protocol.
//!
//! Only the schema-management subset of `google.bigtable.admin.v2` is compiled:
//! table listing, table metadata, table creation, column family modification
//! and row range deletion.

#[allow(clippy::all)]
pub mod google {
    pub mod bigtable {
        pub mod admin {
            pub mod v2 {
                tonic::include_proto!("google.bigtable.admin.v2");
            }
        }
    }
}

pub use google::bigtable::admin::v2;
