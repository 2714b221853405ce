use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use common::config::Configuration;
use humantime_serde::re::humantime;
use reconciler::{DesiredSchema, GrpcConnector, InstancePath, SchemaAdmin, SchemaReconciler};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "tablekeeper")]
#[command(about = "Declarative schema reconciliation for wide-column tables")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Operation(Operation),
    #[command(flatten)]
    Common(CommonCommands),
}

/// Commands that talk to the cluster
#[derive(Subcommand)]
enum Operation {
    /// Create every missing table and column family
    Ensure {
        #[arg(long, help = "Only report what would be created")]
        dry_run: bool,

        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
    /// Set a max-age GC rule on every configured family that exists
    SetGcRule {
        #[arg(long, value_parser = humantime::parse_duration, help = "Maximum cell age, e.g. 7d or 12h")]
        max_age: Option<Duration>,

        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
    /// Irreversibly delete every row of a table whose key starts with a prefix
    DropRows {
        #[arg(long, help = "Table id")]
        table: String,

        #[arg(long, help = "Row key prefix")]
        prefix: String,

        #[arg(long, help = "Confirm the deletion")]
        yes: bool,
    },
}

fn print_report<T: Serialize + std::fmt::Debug>(report: &T, json: bool) -> Result<()> {
    if json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{json}");
    } else {
        println!("{report:#?}");
    }
    Ok(())
}

fn schema_admin(config: &Configuration) -> SchemaAdmin {
    let connector = GrpcConnector::from_config(&config.cluster);
    log::info!("Using admin endpoint {}", connector.endpoint());
    SchemaAdmin::new(
        Arc::new(connector),
        SchemaReconciler::from(&config.reconcile),
    )
}

async fn run(operation: Operation, config: &Configuration) -> Result<()> {
    let instance = InstancePath::from(&config.cluster);
    let desired = DesiredSchema::from(&config.schema);
    let admin = schema_admin(config);

    match operation {
        Operation::Ensure { dry_run, json } => {
            if dry_run || config.reconcile.dry_run {
                let plan = admin
                    .plan_schema(&instance, &desired)
                    .await
                    .context("Failed to plan schema")?;
                if plan.is_noop() {
                    log::info!("Schema is up to date");
                }
                print_report(&plan, json)
            } else {
                let report = admin
                    .ensure_schema(&instance, &desired)
                    .await
                    .context("Failed to ensure schema")?;
                print_report(&report, json)
            }
        }
        Operation::SetGcRule { max_age, json } => {
            if desired.is_empty() {
                log::warn!("No tables configured under [schema.tables]; no GC rule will be set");
            }
            let Some(max_age) = max_age.or(config.gc.max_age) else {
                bail!("No max age given: pass --max-age or set gc.max_age");
            };
            let report = admin
                .set_cell_expiration(&instance, &desired, max_age)
                .await
                .context("Failed to set GC rule")?;
            print_report(&report, json)
        }
        Operation::DropRows { table, prefix, yes } => {
            if !yes {
                bail!("Refusing to drop rows of '{table}' with prefix '{prefix}' without --yes");
            }
            admin
                .drop_row_range(&instance.table(table.as_str()), &prefix)
                .await
                .context("Failed to drop row range")?;
            println!("Dropped rows of '{table}' with prefix '{prefix}'");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::init_logging(&cli.common);

    let config = utils::load_config(cli.common.config.as_ref())?;

    match cli.command {
        Command::Common(common_cmd) => utils::handle_common_command(&common_cmd, &config),
        Command::Operation(operation) => {
            config.validate().context("Invalid configuration")?;
            run(operation, &config).await
        }
    }
}
