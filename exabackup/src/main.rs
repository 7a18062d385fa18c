//! Exasol catalog backup tool.
//!
//! Reads the catalog, writes one SQL file per object into the destination
//! tree and, with `--drop-extras`, removes files of objects that no longer
//! exist.
//!
//! # Guarantees
//! - Read-only catalog access
//! - Secret literals masked before reaching disk
//! - Deterministic output across runs

use clap::Parser;
use exabackup::{Cli, Command, output, render_kinds, run_backup_command};
use exabackup_core::logging::init_logging;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(
        cli.global.verbose,
        cli.global.quiet,
        cli.global.log_level.as_deref(),
        cli.global.json_logs,
    )?;

    match &cli.command {
        Command::Kinds => {
            print!("{}", render_kinds());
            Ok(ExitCode::SUCCESS)
        }
        Command::Backup(args) => {
            let cancel = CancellationToken::new();
            spawn_interrupt_handler(cancel.clone());

            let report = run_backup_command(args, cancel)
                .await
                .inspect_err(|e| error!("Backup failed: {:#}", e))?;

            if !cli.global.quiet {
                print!("{}", output::render_summary(&report));
            }
            if report.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Cancels `token` on Ctrl-C; in-flight writes still complete.
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight writes");
            token.cancel();
        }
    });
}
