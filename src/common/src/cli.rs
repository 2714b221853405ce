use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments shared by every tablekeeper command
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Subcommands that only inspect configuration
#[derive(Subcommand, Debug, Clone)]
pub enum CommonCommands {
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Log level implied by the verbosity flags.
    pub fn log_level(args: &CommonArgs) -> &'static str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Initialize logging based on CLI arguments. `RUST_LOG` wins when set.
    pub fn init_logging(args: &CommonArgs) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args)));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("Tablekeeper Configuration:");
            println!("==========================");
            println!("Project: {}", config.cluster.project);
            println!("Instance: {}", config.cluster.instance);
            println!("Endpoint: {}", config.cluster.resolved_endpoint());
            if config.cluster.uses_emulator() {
                println!("  (emulator override active)");
            }
            println!(
                "Access token: {}",
                if config.cluster.access_token.is_some() {
                    "set"
                } else {
                    "not set"
                }
            );
            println!("Connect timeout: {:?}", config.cluster.connect_timeout);
            println!("Request timeout: {:?}", config.cluster.request_timeout);
            println!(
                "Max concurrent tables: {}",
                config.reconcile.max_concurrent_tables
            );
            println!("Dry run: {}", config.reconcile.dry_run);

            println!("Tables:");
            for (table, families) in &config.schema.tables {
                println!("  {table}: [{}]", families.join(", "));
            }

            match config.gc.max_age {
                Some(max_age) => println!("GC max age: {max_age:?}"),
                None => println!("GC max age: not configured"),
            }
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        config.validate().context("Invalid configuration")?;

        if config.schema.tables.is_empty() {
            log::warn!("No tables configured under [schema.tables]; ensure will be a no-op");
        }

        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle a configuration-only command
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<()> {
        match command {
            CommonCommands::Config { json } => display_config(config, *json),
            CommonCommands::Validate => validate_config(config),
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(())
            }
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
