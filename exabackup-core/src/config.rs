//! Backup run configuration.
//!
//! # Security
//! The config never carries connection credentials. The catalog source is
//! handed to the runner separately and owns its own authentication.

use crate::{error::BackupError, models::ObjectKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound for [`BackupConfig::max_concurrency`].
pub const MAX_CONCURRENCY: usize = 32;

/// Configuration for one backup run. Immutable once the run starts.
///
/// # Example
/// ```rust
/// use exabackup_core::{BackupConfig, ObjectKind};
///
/// let config = BackupConfig::new("/var/backups/exa")
///     .with_kinds([ObjectKind::Tables, ObjectKind::Views])
///     .with_max_table_rows(100)
///     .with_drop_extras(true);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Root of the destination tree
    pub destination: PathBuf,
    /// Kinds to back up, in processing order, without duplicates
    pub kinds: Vec<ObjectKind>,
    /// Row cap for table data export (0 disables export)
    pub max_table_rows: u64,
    /// Row cap for view data export (0 disables export)
    pub max_view_rows: u64,
    /// Delete stale entries owned by the requested kinds
    pub drop_extras: bool,
    /// Bound on concurrent kinds, schemas and objects (1-32)
    pub max_concurrency: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("."),
            kinds: ObjectKind::ALL.to_vec(),
            max_table_rows: 0,
            max_view_rows: 0,
            drop_extras: false,
            max_concurrency: 4,
        }
    }
}

impl BackupConfig {
    /// Creates a config backing up every kind into `destination`.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            ..Self::default()
        }
    }

    /// Builder method to set the requested kinds. Duplicates are dropped.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = ObjectKind>) -> Self {
        self.kinds.clear();
        for kind in kinds {
            if !self.kinds.contains(&kind) {
                self.kinds.push(kind);
            }
        }
        self
    }

    /// Builder method to set the table row cap.
    pub fn with_max_table_rows(mut self, rows: u64) -> Self {
        self.max_table_rows = rows;
        self
    }

    /// Builder method to set the view row cap.
    pub fn with_max_view_rows(mut self, rows: u64) -> Self {
        self.max_view_rows = rows;
        self
    }

    /// Builder method to enable stale entry removal.
    pub fn with_drop_extras(mut self, drop_extras: bool) -> Self {
        self.drop_extras = drop_extras;
        self
    }

    /// Builder method to set the concurrency bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Row cap applying to `kind`; 0 for kinds without data export.
    pub fn row_cap(&self, kind: ObjectKind) -> u64 {
        match kind {
            ObjectKind::Tables => self.max_table_rows,
            ObjectKind::Views => self.max_view_rows,
            _ => 0,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns a configuration error for an empty destination, an empty kind
    /// list or a concurrency bound outside 1-32.
    pub fn validate(&self) -> crate::Result<()> {
        if self.destination.as_os_str().is_empty() {
            return Err(BackupError::configuration("destination cannot be empty"));
        }

        if self.kinds.is_empty() {
            return Err(BackupError::configuration(
                "at least one object kind must be requested",
            ));
        }

        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY {
            return Err(BackupError::configuration(format!(
                "max_concurrency must be between 1 and {}",
                MAX_CONCURRENCY
            )));
        }

        Ok(())
    }
}
