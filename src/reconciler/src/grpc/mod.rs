//! gRPC admin sessions over tonic.

pub mod convert;

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::Interceptor;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};
use tracing::debug;

use admin_api::v2;
use admin_api::v2::bigtable_table_admin_client::BigtableTableAdminClient;
use admin_api::v2::drop_row_range_request::Target;
use common::config::ClusterConfig;

use crate::error::{AdminError, AdminResult};
use crate::session::{AdminConnector, AdminSession};
use crate::types::{InstancePath, Modification, TableMetadata, TablePath};

type AdminClient = BigtableTableAdminClient<InterceptedService<Channel, AuthInterceptor>>;

/// Attaches `authorization: Bearer <token>` to every request when a token is configured.
#[derive(Clone, Default)]
pub struct AuthInterceptor {
    header: Option<MetadataValue<Ascii>>,
}

impl AuthInterceptor {
    pub fn new(access_token: Option<&str>) -> AdminResult<Self> {
        let header = access_token
            .map(|token| {
                format!("Bearer {token}").parse::<MetadataValue<Ascii>>().map_err(|_| {
                    AdminError::InvalidArgument(
                        "access token is not a valid ASCII header value".to_string(),
                    )
                })
            })
            .transpose()?;
        Ok(Self { header })
    }
}

impl Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(header) = &self.header {
            request
                .metadata_mut()
                .insert("authorization", header.clone());
        }
        Ok(request)
    }
}

/// Opens one channel per session against the configured admin endpoint.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    endpoint: String,
    access_token: Option<String>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl GrpcConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let defaults = ClusterConfig::default();
        Self {
            endpoint: endpoint.into(),
            access_token: None,
            connect_timeout: defaults.connect_timeout,
            request_timeout: defaults.request_timeout,
        }
    }

    /// Connector for `config`, honouring the emulator override.
    pub fn from_config(config: &ClusterConfig) -> Self {
        Self {
            endpoint: config.resolved_endpoint(),
            access_token: config.access_token.clone(),
            connect_timeout: config.connect_timeout,
            request_timeout: config.request_timeout,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_endpoint(&self) -> AdminResult<Endpoint> {
        let endpoint = Endpoint::from_shared(self.endpoint.clone())
            .map_err(|e| AdminError::Connect(format!("invalid endpoint {}: {e}", self.endpoint)))?
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout);

        if self.endpoint.starts_with("https://") {
            Ok(endpoint.tls_config(ClientTlsConfig::new().with_native_roots())?)
        } else {
            Ok(endpoint)
        }
    }
}

#[async_trait]
impl AdminConnector for GrpcConnector {
    async fn connect(&self) -> AdminResult<Box<dyn AdminSession>> {
        let interceptor = AuthInterceptor::new(self.access_token.as_deref())?;
        let channel = self.build_endpoint()?.connect().await?;
        debug!(endpoint = %self.endpoint, "Connected to admin endpoint");

        Ok(Box::new(GrpcSession {
            client: BigtableTableAdminClient::with_interceptor(channel, interceptor),
            endpoint: self.endpoint.clone(),
        }))
    }
}

/// Session owning one channel. The channel closes when the session is dropped.
pub struct GrpcSession {
    client: AdminClient,
    endpoint: String,
}

impl Drop for GrpcSession {
    fn drop(&mut self) {
        debug!(endpoint = %self.endpoint, "Closed admin session");
    }
}

#[async_trait]
impl AdminSession for GrpcSession {
    async fn list_tables(&self, instance: &InstancePath) -> AdminResult<BTreeSet<TablePath>> {
        let mut client = self.client.clone();
        let mut tables = BTreeSet::new();
        let mut page_token = String::new();

        loop {
            let response = client
                .list_tables(v2::ListTablesRequest {
                    parent: instance.to_string(),
                    view: v2::table::View::NameOnly as i32,
                    page_size: 0,
                    page_token: std::mem::take(&mut page_token),
                })
                .await?
                .into_inner();

            for table in response.tables {
                tables.insert(table.name.parse::<TablePath>()?);
            }

            if response.next_page_token.is_empty() {
                break;
            }
            page_token = response.next_page_token;
        }

        Ok(tables)
    }

    async fn get_table(&self, table: &TablePath) -> AdminResult<TableMetadata> {
        let response = self
            .client
            .clone()
            .get_table(v2::GetTableRequest {
                name: table.to_string(),
                view: v2::table::View::SchemaView as i32,
            })
            .await?
            .into_inner();

        Ok(convert::table_metadata(table.clone(), response))
    }

    async fn create_table(&self, instance: &InstancePath, table_id: &str) -> AdminResult<TablePath> {
        let response = self
            .client
            .clone()
            .create_table(v2::CreateTableRequest {
                parent: instance.to_string(),
                table_id: table_id.to_string(),
                table: Some(v2::Table::default()),
            })
            .await?
            .into_inner();

        if response.name.is_empty() {
            Ok(instance.table(table_id))
        } else {
            response.name.parse()
        }
    }

    async fn modify_column_families(
        &self,
        table: &TablePath,
        modifications: Vec<Modification>,
    ) -> AdminResult<()> {
        self.client
            .clone()
            .modify_column_families(v2::ModifyColumnFamiliesRequest {
                name: table.to_string(),
                modifications: modifications
                    .into_iter()
                    .map(convert::modification_to_proto)
                    .collect(),
            })
            .await?;
        Ok(())
    }

    async fn drop_row_range(&self, table: &TablePath, row_key_prefix: Vec<u8>) -> AdminResult<()> {
        self.client
            .clone()
            .drop_row_range(v2::DropRowRangeRequest {
                name: table.to_string(),
                target: Some(Target::RowKeyPrefix(row_key_prefix)),
            })
            .await?;
        Ok(())
    }
}
