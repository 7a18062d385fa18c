//! Report output for backup runs.

use exabackup_core::{BackupError, BackupReport, Result};
use std::fmt::Write as _;
use std::path::Path;

/// Saves the report as pretty-printed JSON.
///
/// # Errors
/// Returns [`BackupError::Io`] if the file cannot be written.
pub async fn save_report(report: &BackupReport, path: &Path) -> Result<()> {
    let json = report.to_json()?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| BackupError::Io {
            context: format!("Failed to write to {}", path.display()),
            source: e,
        })
}

/// Human-readable end-of-run summary.
pub fn render_summary(report: &BackupReport) -> String {
    let mut out = String::new();
    let status = if report.cancelled {
        "cancelled"
    } else if report.failures.is_empty() {
        "completed successfully"
    } else {
        "completed with failures"
    };
    let _ = writeln!(out, "Backup {}", status);
    let _ = writeln!(
        out,
        "Duration: {:.2}s",
        std::time::Duration::from_millis(report.duration_ms).as_secs_f64()
    );
    for kind in &report.kinds {
        let _ = writeln!(
            out,
            "  {:<16} {:>6} objects{}",
            kind.kind.to_string(),
            kind.records,
            if kind.failures > 0 {
                format!(", {} failed", kind.failures)
            } else {
                String::new()
            }
        );
    }
    let _ = writeln!(out, "Files written: {}", report.files_written);
    if !report.removed.is_empty() {
        let _ = writeln!(out, "Stale entries removed: {}", report.removed.len());
    }
    if !report.failures.is_empty() {
        let _ = writeln!(out, "Failures ({}):", report.failures.len());
        for failure in &report.failures {
            let _ = writeln!(out, "  {}", failure);
        }
    }
    out
}
