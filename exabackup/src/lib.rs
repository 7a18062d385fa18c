//! Command-line interface for exabackup.
//!
//! Argument parsing and config assembly live here so they can be tested
//! without spawning the binary; `main.rs` only wires logging, signals and
//! exit codes around [`run_backup_command`].

pub mod output;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use exabackup_core::{
    BackupConfig, BackupReport, BackupRunner, CatalogSnapshot, MemorySource, ObjectKind,
    parse_kind_list, registry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Top-level command line.
#[derive(Parser)]
#[command(name = "exabackup")]
#[command(about = "Back up an Exasol catalog into a directory tree of SQL files")]
#[command(version)]
#[command(long_about = "
exabackup - Exasol catalog backup

Extracts the catalog (parameters, schemas, tables, views, functions, scripts,
users, roles, connections, priority groups and privileges) and writes one
SQL file per object that recreates it, optionally with CSV snapshots of table
and view contents.

GUARANTEES:
- Catalog access is read-only
- Passwords and other secret literals are masked before reaching disk
- Identical catalog state produces byte-identical files
- With --drop-extras, files of objects that no longer exist are removed

EXAMPLES:
  exabackup backup --catalog-snapshot catalog.json --destination backup/
  exabackup backup --catalog-snapshot catalog.json --destination backup/ \\
      --objects tables,views --max-table-rows 1000 --drop-extras
  exabackup kinds
")]
pub struct Cli {
    /// Options shared by every subcommand
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Back up a catalog into a destination tree
    Backup(BackupArgs),
    /// List object kinds, their layout and catalog queries
    Kinds,
}

/// Logging options.
#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(
        short,
        long,
        global = true,
        help = "Suppress all output except errors"
    )]
    pub quiet: bool,

    /// Explicit log filter
    #[arg(
        long,
        global = true,
        env = "EXABACKUP_LOG",
        help = "Log filter directive, e.g. 'warn' or 'exabackup_core=debug' (overrides -v/-q)"
    )]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, help = "Emit logs as one JSON object per line")]
    pub json_logs: bool,
}

/// Options of `exabackup backup`.
#[derive(Args)]
pub struct BackupArgs {
    /// Catalog snapshot to back up
    #[arg(
        long,
        env = "EXABACKUP_CATALOG_SNAPSHOT",
        value_name = "FILE",
        help = "JSON catalog snapshot answering the catalog queries"
    )]
    pub catalog_snapshot: PathBuf,

    /// Fail on catalog queries missing from the snapshot
    #[arg(
        long,
        help = "Treat catalog queries missing from the snapshot as failures"
    )]
    pub strict_snapshot: bool,

    /// Destination directory
    #[arg(
        short,
        long,
        env = "EXABACKUP_DESTINATION",
        default_value = ".",
        value_name = "DIR",
        help = "Root directory of the backup tree"
    )]
    pub destination: PathBuf,

    /// Object kinds to back up
    #[arg(
        long,
        env = "EXABACKUP_OBJECTS",
        default_value = "all",
        help = "Comma-separated kinds (parameters, schemas, tables, views, functions, scripts, users, roles, connections, priority_groups, privileges) or 'all'"
    )]
    pub objects: String,

    /// Rows exported per table
    #[arg(
        long,
        env = "EXABACKUP_MAX_TABLE_ROWS",
        default_value = "0",
        help = "Maximum rows exported per table as CSV (0 disables)"
    )]
    pub max_table_rows: u64,

    /// Rows exported per view
    #[arg(
        long,
        env = "EXABACKUP_MAX_VIEW_ROWS",
        default_value = "0",
        help = "Maximum rows exported per view as CSV (0 disables)"
    )]
    pub max_view_rows: u64,

    /// Remove files of objects that no longer exist
    #[arg(
        long,
        env = "EXABACKUP_DROP_EXTRAS",
        help = "Remove files of dropped objects from the requested kinds"
    )]
    pub drop_extras: bool,

    /// Concurrency bound
    #[arg(
        long,
        env = "EXABACKUP_MAX_CONCURRENCY",
        default_value = "4",
        help = "Maximum concurrent catalog queries and writes (1-32)"
    )]
    pub max_concurrency: usize,

    /// JSON report output
    #[arg(
        long,
        value_name = "FILE",
        help = "Write the run report as JSON to this file"
    )]
    pub report: Option<PathBuf>,
}

impl BackupArgs {
    /// Assembles and validates the backup configuration.
    ///
    /// # Errors
    /// Returns an error for unknown kinds or out-of-range values.
    pub fn to_config(&self) -> anyhow::Result<BackupConfig> {
        let kinds = parse_kind_list(&self.objects).context("invalid --objects")?;
        let config = BackupConfig::new(&self.destination)
            .with_kinds(kinds)
            .with_max_table_rows(self.max_table_rows)
            .with_max_view_rows(self.max_view_rows)
            .with_drop_extras(self.drop_extras)
            .with_max_concurrency(self.max_concurrency);
        config.validate().context("invalid backup configuration")?;
        Ok(config)
    }
}

/// Loads the snapshot and runs the backup until done or `cancel` fires.
///
/// # Errors
/// Returns an error if the configuration is invalid, the snapshot cannot be
/// loaded or the report cannot be written. Object-level failures are in the
/// returned report.
pub async fn run_backup_command(
    args: &BackupArgs,
    cancel: CancellationToken,
) -> anyhow::Result<BackupReport> {
    let config = args.to_config()?;

    info!("Loading catalog snapshot {}", args.catalog_snapshot.display());
    let snapshot = CatalogSnapshot::load(&args.catalog_snapshot)
        .await
        .with_context(|| {
            format!(
                "failed to load catalog snapshot {}",
                args.catalog_snapshot.display()
            )
        })?;
    let mut source = MemorySource::from_snapshot(snapshot);
    if args.strict_snapshot {
        source = source.strict();
    }

    let runner = BackupRunner::new(Arc::new(source), config)?.with_cancellation(cancel);
    let report = runner.run().await;

    if let Some(path) = &args.report {
        output::save_report(&report, path)
            .await
            .with_context(|| format!("failed to write report {}", path.display()))?;
        info!("Report saved to {}", path.display());
    }
    Ok(report)
}

/// Table of kinds, their layout and the catalog queries they issue.
pub fn render_kinds() -> String {
    let mut out = String::from("Object kinds (in processing order):\n");
    for kind in ObjectKind::ALL {
        let spec = registry::spec(kind);
        out.push('\n');
        out.push_str(&format!("{} ({})\n", kind, spec.label));
        out.push_str(&format!("  Output:  {}\n", spec.layout));
        if spec.exports_data {
            out.push_str("  Data:    <NAME>.csv next to the SQL file\n");
        }
        for query in spec.queries {
            out.push_str(&format!("  Query:   {}\n", query));
        }
    }
    out
}
