use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Environment variable used by the service's official clients to point at a
/// local emulator. When set, it takes precedence over `cluster.endpoint`.
pub const EMULATOR_HOST_ENV: &str = "BIGTABLE_EMULATOR_HOST";

/// Production endpoint of the table admin service.
pub const DEFAULT_ADMIN_ENDPOINT: &str = "https://bigtableadmin.googleapis.com";

const DEFAULT_CONFIG_FILE: &str = "tablekeeper.toml";
const ENV_PREFIX: &str = "TABLEKEEPER__";

/// Coordinates and connection settings for the target cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Project that owns the instance
    ///
    /// Env: TABLEKEEPER__CLUSTER__PROJECT
    pub project: String,
    /// Instance holding the tables
    ///
    /// Env: TABLEKEEPER__CLUSTER__INSTANCE
    pub instance: String,
    /// Admin API endpoint (`https://` uses TLS with native roots)
    pub endpoint: String,
    /// Bearer token attached to every admin request. Never serialized.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            instance: String::new(),
            endpoint: DEFAULT_ADMIN_ENDPOINT.to_string(),
            access_token: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClusterConfig {
    /// Endpoint to dial, honouring `BIGTABLE_EMULATOR_HOST` when it is set.
    pub fn resolved_endpoint(&self) -> String {
        match std::env::var(EMULATOR_HOST_ENV) {
            Ok(host) if !host.trim().is_empty() => format!("http://{}", host.trim()),
            _ => self.endpoint.clone(),
        }
    }

    /// Whether requests go to a local emulator instead of the configured endpoint.
    pub fn uses_emulator(&self) -> bool {
        std::env::var(EMULATOR_HOST_ENV).is_ok_and(|host| !host.trim().is_empty())
    }
}

/// Reconciliation behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Upper bound on tables reconciled concurrently within one call
    ///
    /// Env: TABLEKEEPER__RECONCILE__MAX_CONCURRENT_TABLES
    pub max_concurrent_tables: usize,
    /// Compute and print the plan without mutating anything
    ///
    /// Env: TABLEKEEPER__RECONCILE__DRY_RUN
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tables: 4,
            dry_run: false,
        }
    }
}

/// Desired tables and their column families.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SchemaConfig {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<String>>,
}

/// Garbage-collection policy applied by `set-gc-rule`.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct GcConfig {
    /// Maximum cell age. Truncated to whole seconds when applied.
    ///
    /// Env: TABLEKEEPER__GC__MAX_AGE
    #[serde(
        with = "humantime_serde",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_age: Option<Duration>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// Target cluster coordinates
    pub cluster: ClusterConfig,
    /// Reconciliation tuning
    pub reconcile: ReconcileConfig,
    /// Desired schema
    pub schema: SchemaConfig,
    /// Garbage-collection policy
    pub gc: GcConfig,
}

/// Errors reported by [`Configuration::validate`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("Table names must not be empty")]
    EmptyTableName,

    #[error("Column family names of table '{table}' must not be empty")]
    EmptyFamilyName { table: String },

    #[error("reconcile.max_concurrent_tables must be at least 1")]
    InvalidConcurrency,

    #[error("Invalid gc.max_age: {0:?} truncates to zero seconds")]
    GcMaxAgeTooShort(Duration),
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(DEFAULT_CONFIG_FILE))
            .extract()
            .map_err(Box::new)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(path)).extract().map_err(Box::new)
    }

    fn figment(file: figment::providers::Data<Toml>) -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate the configuration.
    ///
    /// Checks:
    /// - Project and instance are set
    /// - Table and column family names are non-empty
    /// - Concurrency is positive
    /// - The GC max-age survives truncation to seconds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.project.trim().is_empty() {
            return Err(ConfigError::EmptyField("cluster.project"));
        }
        if self.cluster.instance.trim().is_empty() {
            return Err(ConfigError::EmptyField("cluster.instance"));
        }
        if self.cluster.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyField("cluster.endpoint"));
        }

        for (table, families) in &self.schema.tables {
            if table.trim().is_empty() {
                return Err(ConfigError::EmptyTableName);
            }
            if families.iter().any(|family| family.trim().is_empty()) {
                return Err(ConfigError::EmptyFamilyName {
                    table: table.clone(),
                });
            }
        }

        if self.reconcile.max_concurrent_tables == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }

        if let Some(max_age) = self.gc.max_age {
            if max_age.as_secs() == 0 {
                return Err(ConfigError::GcMaxAgeTooShort(max_age));
            }
        }

        Ok(())
    }
}
