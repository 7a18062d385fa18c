//! Catalog source abstraction.
//!
//! The engine never talks to a database directly. Everything it needs goes
//! through [`CatalogSource::execute`], which returns a [`ResultSet`] of named
//! columns. Authentication, retries and timeouts belong to the
//! implementation.
//!
//! # Module Structure
//! - `value`: result set, row and value types plus typed row access
//! - `memory`: in-memory source answering registered queries, loadable from
//!   a JSON catalog snapshot

mod memory;
mod value;

pub use memory::{CatalogSnapshot, MemorySource};
pub use value::{ResultSet, Row, Value};

use crate::{Result, error::BackupError};
use async_trait::async_trait;

/// Connection to the target engine's catalog.
///
/// # Object Safety
/// This trait is object-safe; the runner holds it as
/// `Arc<dyn CatalogSource>` and shares it across concurrent extractions.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Executes one SQL statement and returns its rows.
    ///
    /// # Errors
    /// Returns an error when the statement fails for any reason
    /// (connectivity, permissions, timeout). The extractor wraps it into
    /// [`BackupError::Extraction`].
    async fn execute(&self, sql: &str) -> Result<ResultSet>;

    /// Short human-readable description for logs (no credentials).
    fn describe(&self) -> String;
}

/// Runs `sql` and attaches `context` to any failure.
///
/// Source errors that are not already extraction errors are wrapped so the
/// failure class stays [`FailureClass::Extraction`](crate::error::FailureClass).
pub(crate) async fn query(
    source: &dyn CatalogSource,
    sql: &str,
    context: &str,
) -> Result<ResultSet> {
    tracing::trace!("Catalog query ({}): {}", context, sql);
    source.execute(sql).await.map_err(|e| match e {
        BackupError::Extraction { source, .. } => BackupError::Extraction {
            context: context.to_string(),
            source,
        },
        e @ BackupError::MalformedRow { .. } => e,
        other => BackupError::extraction(context.to_string(), other),
    })
}
