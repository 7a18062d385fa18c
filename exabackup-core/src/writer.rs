//! Destination tree writer.
//!
//! Files are written to a hidden sibling (`.<name>.partial`) and renamed
//! over the target, so a reader or a crash never observes a partially
//! written file under its final name. Every written or claimed name is
//! recorded in its directory's written-set, which the reconciler uses to
//! tell current entries from stale ones.

use crate::{Result, error::BackupError};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::trace;

/// Atomic file writer tracking per-directory written-sets.
#[derive(Debug)]
pub struct TreeWriter {
    root: PathBuf,
    written: Mutex<HashMap<PathBuf, BTreeSet<String>>>,
    files_written: AtomicUsize,
}

impl TreeWriter {
    /// Creates a writer for the tree under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: Mutex::new(HashMap::new()),
            files_written: AtomicUsize::new(0),
        }
    }

    /// Destination root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` to `path` atomically and records it as written.
    ///
    /// # Errors
    /// Returns [`BackupError::Write`] if a parent directory cannot be
    /// created or the file cannot be written or renamed. The target is left
    /// untouched in that case.
    pub async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let (dir, name) = split(path)?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| BackupError::write(dir, e))?;

        let partial = dir.join(format!(".{}.partial", name));
        if let Err(e) = tokio::fs::write(&partial, bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(BackupError::write(path, e));
        }
        if let Err(e) = tokio::fs::rename(&partial, path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(BackupError::write(path, e));
        }

        trace!("Wrote {} ({} bytes)", path.display(), bytes.len());
        self.files_written.fetch_add(1, Ordering::Relaxed);
        self.register(dir, name);
        Ok(())
    }

    /// Records `path` as current without writing it.
    ///
    /// # Errors
    /// Returns [`BackupError::Write`] if `path` has no file name.
    pub fn claim(&self, path: &Path) -> Result<()> {
        let (dir, name) = split(path)?;
        self.register(dir, name);
        Ok(())
    }

    /// Names written or claimed in `dir` during this run.
    pub fn written(&self, dir: &Path) -> BTreeSet<String> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dir)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of files written (claims excluded).
    pub fn files_written(&self) -> usize {
        self.files_written.load(Ordering::Relaxed)
    }

    fn register(&self, dir: &Path, name: &str) {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(dir.to_path_buf())
            .or_default()
            .insert(name.to_string());
    }
}

fn split(path: &Path) -> Result<(&Path, &str)> {
    let invalid = || {
        BackupError::write(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    };
    let dir = path.parent().ok_or_else(invalid)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;
    Ok((dir, name))
}
