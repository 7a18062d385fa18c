//! Stale entry removal.
//!
//! After a kind's writes for a directory are complete, every entry the kind
//! owns there that this run neither wrote nor claimed is a leftover of a
//! dropped or renamed object. Ownership keeps requested kinds from touching
//! the files of other kinds sharing the directory.

use crate::{Result, error::BackupError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Entries of a directory a kind is responsible for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owned {
    /// Every entry of the directory
    All,
    /// Only entries with these names
    Names(BTreeSet<String>),
}

impl Owned {
    /// Ownership of a single name.
    pub fn name(name: impl Into<String>) -> Self {
        Self::Names(BTreeSet::from([name.into()]))
    }

    fn contains(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Names(names) => names.contains(name),
        }
    }
}

/// Deletes owned entries of `dir` that are not in `written`.
///
/// Directories are removed recursively. A missing `dir` is not an error.
/// Returns the removed paths in name order.
///
/// # Errors
/// Returns [`BackupError::Reconcile`] if the directory cannot be listed or
/// an entry cannot be removed. Entries removed before the failure stay
/// removed.
pub async fn reconcile(
    dir: &Path,
    owned: &Owned,
    written: &BTreeSet<String>,
) -> Result<Vec<PathBuf>> {
    let mut stale = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stale),
        Err(e) => return Err(BackupError::reconcile(dir, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BackupError::reconcile(dir, e))?
    {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if owned.contains(&name) && !written.contains(&name) {
            stale.push(entry.path());
        }
    }
    stale.sort();

    for path in &stale {
        let is_dir = tokio::fs::symlink_metadata(path)
            .await
            .map(|meta| meta.is_dir())
            .map_err(|e| BackupError::reconcile(path, e))?;
        let removed = if is_dir {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };
        removed.map_err(|e| BackupError::reconcile(path, e))?;
        info!("Removed stale entry {}", path.display());
    }

    debug!("Reconciled {}: {} removed", dir.display(), stale.len());
    Ok(stale)
}

/// Removes `dir` if it exists and is empty. Returns whether it was removed.
///
/// # Errors
/// Returns [`BackupError::Reconcile`] if the directory cannot be listed or
/// removed.
pub async fn prune_if_empty(dir: &Path) -> Result<bool> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(BackupError::reconcile(dir, e)),
    };
    if entries
        .next_entry()
        .await
        .map_err(|e| BackupError::reconcile(dir, e))?
        .is_some()
    {
        return Ok(false);
    }
    tokio::fs::remove_dir(dir)
        .await
        .map_err(|e| BackupError::reconcile(dir, e))?;
    info!("Removed empty directory {}", dir.display());
    Ok(true)
}

/// Names of the subdirectories of `dir`, sorted; empty if `dir` is missing.
///
/// # Errors
/// Returns [`BackupError::Reconcile`] if the directory cannot be listed.
pub async fn list_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(BackupError::reconcile(dir, e)),
    };
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BackupError::reconcile(dir, e))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map_err(|e| BackupError::reconcile(entry.path(), e))?
            .is_dir();
        if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
