//! Shared logging setup for the exabackup binary.

use crate::Result;
use tracing_subscriber::EnvFilter;

/// Maps `-v`/`-q` flags onto a level.
///
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only ERROR level logs
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Initializes structured logging.
///
/// An explicit `filter` (`--log-level`, an [`EnvFilter`] directive such as
/// `warn` or `exabackup_core=debug`) takes precedence over the flags.
/// With `json` set, events are emitted as one JSON object per line.
///
/// # Errors
/// Returns a configuration error if the filter does not parse or a global
/// subscriber is already installed.
///
/// # Example
/// ```rust,no_run
/// use exabackup_core::logging::init_logging;
///
/// // DEBUG level, human-readable
/// init_logging(1, false, None, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool, filter: Option<&str>, json: bool) -> Result<()> {
    let filter = build_filter(verbose, quiet, filter)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    let initialized = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    initialized.map_err(|e| {
        crate::error::BackupError::configuration(format!("Failed to initialize logging: {}", e))
    })
}

fn build_filter(verbose: u8, quiet: bool, filter: Option<&str>) -> Result<EnvFilter> {
    match filter {
        Some(directive) => EnvFilter::try_new(directive).map_err(|e| {
            crate::error::BackupError::configuration(format!(
                "invalid log level '{}': {}",
                directive, e
            ))
        }),
        None => Ok(EnvFilter::new(level_for(verbose, quiet).to_string())),
    }
}
