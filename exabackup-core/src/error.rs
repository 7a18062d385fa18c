//! Error types for the backup engine.
//!
//! Every failure is attributable to one kind, schema or object. The runner
//! collects them into the [`BackupReport`](crate::backup::BackupReport)
//! instead of aborting, so a single broken object never drops its siblings
//! from the backup. Contexts name catalog views and objects, never row values,
//! so secret literals cannot leak through error messages.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for exabackup operations.
#[derive(Debug, Error)]
pub enum BackupError {
    /// A catalog query failed (connectivity, permissions, timeout)
    #[error("Catalog extraction failed: {context}")]
    Extraction {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A catalog row did not have the expected shape
    #[error("Malformed catalog row: {context}")]
    MalformedRow { context: String },

    /// A record could not be turned into text (programming defect)
    #[error("Serialization failed: {context}")]
    Serialization { context: String },

    /// Writing a backup file failed
    #[error("Failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Listing or deleting stale entries failed
    #[error("Failed to reconcile {}", path.display())]
    Reconcile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A catalog snapshot could not be parsed or rendered
    #[error("Catalog snapshot error: {context}")]
    Snapshot {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// I/O outside the destination tree (snapshot files, reports)
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results with BackupError
pub type Result<T> = std::result::Result<T, BackupError>;

/// Failure taxonomy used in the end-of-run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Catalog query or row-shape failure
    Extraction,
    /// Record could not be rendered
    Serialization,
    /// Filesystem write failure
    Write,
    /// Stale-entry listing or deletion failure
    Reconcile,
    /// Anything else (configuration, cancellation)
    Other,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Extraction => "extraction",
            Self::Serialization => "serialization",
            Self::Write => "write",
            Self::Reconcile => "reconcile",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

impl BackupError {
    /// Creates an extraction error for a failed catalog query.
    pub fn extraction<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Extraction {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an error for a catalog row missing a column or carrying the
    /// wrong value type.
    pub fn malformed_row(column: &str, query_context: Option<&str>) -> Self {
        let context = match query_context {
            Some(query) => format!("column '{}' missing or mistyped in {}", column, query),
            None => format!("column '{}' missing or mistyped", column),
        };
        Self::MalformedRow { context }
    }

    /// Creates a serialization error
    pub fn serialization(context: impl Into<String>) -> Self {
        Self::Serialization {
            context: context.into(),
        }
    }

    /// Creates a write error for `path`
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Creates a reconcile error for `path`
    pub fn reconcile(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Reconcile {
            path: path.into(),
            source,
        }
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Maps the error onto the failure taxonomy.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Extraction { .. } | Self::MalformedRow { .. } => FailureClass::Extraction,
            Self::Serialization { .. } => FailureClass::Serialization,
            Self::Write { .. } => FailureClass::Write,
            Self::Reconcile { .. } => FailureClass::Reconcile,
            Self::Configuration { .. } | Self::Snapshot { .. } | Self::Io { .. } => {
                FailureClass::Other
            }
        }
    }
}

/// Error reported by a [`CatalogSource`](crate::source::CatalogSource)
/// implementation. Wrapped into [`BackupError::Extraction`] by the extractor.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SourceError {
    message: String,
}

impl SourceError {
    /// Creates a source error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
