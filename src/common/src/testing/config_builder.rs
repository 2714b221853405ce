//! Test configuration builder for creating test setups quickly.

use std::time::Duration;

use crate::config::Configuration;

/// Builder for creating test configurations.
///
/// Starts from a configuration pointing at a local plaintext endpoint with a
/// single-table concurrency limit, so test call logs come out in a stable order.
#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: Configuration,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = Configuration::default();
        config.cluster.project = "test-project".to_string();
        config.cluster.instance = "test-instance".to_string();
        config.cluster.endpoint = "http://127.0.0.1:8086".to_string();
        config.reconcile.max_concurrent_tables = 1;
        Self { config }
    }

    /// Set the project and instance coordinates.
    pub fn with_cluster(mut self, project: &str, instance: &str) -> Self {
        self.config.cluster.project = project.to_string();
        self.config.cluster.instance = instance.to_string();
        self
    }

    /// Set the admin endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.config.cluster.endpoint = endpoint.to_string();
        self
    }

    /// Add a desired table with the given column families.
    pub fn with_table(mut self, table: &str, families: &[&str]) -> Self {
        self.config.schema.tables.insert(
            table.to_string(),
            families.iter().map(|family| family.to_string()).collect(),
        );
        self
    }

    /// Set the GC max-age policy.
    pub fn with_gc_max_age(mut self, max_age: Duration) -> Self {
        self.config.gc.max_age = Some(max_age);
        self
    }

    /// Set the per-call table concurrency.
    pub fn with_max_concurrent_tables(mut self, limit: usize) -> Self {
        self.config.reconcile.max_concurrent_tables = limit;
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self) -> Self {
        self.config.reconcile.dry_run = true;
        self
    }

    pub fn build(self) -> Configuration {
        self.config
    }
}
