//! Test utilities for tablekeeper.
//!
//! This module is only available when the `testing` feature is enabled or during tests:
//!
//! ```toml
//! [dependencies]
//! common = { path = "../common", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use common::testing::TestConfigBuilder;
//!
//! let config = TestConfigBuilder::new()
//!     .with_cluster("acme", "main")
//!     .with_table("events", &["raw", "agg"])
//!     .build();
//! ```

mod config_builder;

pub use config_builder::TestConfigBuilder;
