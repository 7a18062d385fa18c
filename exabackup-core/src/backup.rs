//! Backup orchestration.
//!
//! The runner drives extraction, serialization, data export, writing and
//! reconciliation for every requested kind:
//!
//! 1. Kinds run concurrently, bounded by `max_concurrency`
//! 2. Each kind extracts its records, then persists them with the same bound
//! 3. Once every write of a kind completed, its directories are reconciled
//!    (only with `drop_extras`)
//!
//! Failures are attributed to a kind and object and collected into the
//! [`BackupReport`]; everything that succeeded stays on disk. A directory
//! whose extraction or any write failed is never reconciled, so a partial
//! run cannot delete the last good copy of an object.
//!
//! # Cancellation
//! Cancelling the runner's [`CancellationToken`] stops new work from
//! starting. Writes already in flight complete atomically, and no
//! reconciliation runs afterwards.

use crate::{
    Result,
    config::BackupConfig,
    error::{BackupError, FailureClass},
    export, extract,
    models::{ObjectKind, ObjectRecord},
    reconcile::{self, Owned},
    registry::{self, Layout},
    serialize::serialize,
    source::CatalogSource,
    writer::TreeWriter,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One failure, attributed to a kind and (when known) an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFailure {
    /// Kind being backed up
    pub kind: ObjectKind,
    /// Object, schema or path the failure concerns
    pub object: Option<String>,
    /// Failure taxonomy
    pub class: FailureClass,
    /// Error message including its causes
    pub message: String,
}

impl BackupFailure {
    fn new(kind: ObjectKind, object: Option<String>, error: &BackupError) -> Self {
        let mut message = error.to_string();
        let mut cause = std::error::Error::source(error);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = inner.source();
        }
        Self {
            kind,
            object,
            class: error.class(),
            message,
        }
    }
}

impl std::fmt::Display for BackupFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.object {
            Some(object) => write!(f, "[{}] {} {}: {}", self.class, self.kind, object, self.message),
            None => write!(f, "[{}] {}: {}", self.class, self.kind, self.message),
        }
    }
}

/// Per-kind counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSummary {
    /// Kind
    pub kind: ObjectKind,
    /// Records extracted
    pub records: usize,
    /// Failures attributed to the kind
    pub failures: usize,
}

/// Outcome of a backup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupReport {
    /// When the run started
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Wall-clock duration (in milliseconds)
    pub duration_ms: u64,
    /// Per-kind counts, in requested order
    pub kinds: Vec<KindSummary>,
    /// Files written (claims excluded)
    pub files_written: usize,
    /// Stale entries removed
    pub removed: Vec<PathBuf>,
    /// Every failure, grouped by kind in requested order
    pub failures: Vec<BackupFailure>,
    /// Whether the run was cancelled before finishing
    pub cancelled: bool,
}

impl BackupReport {
    /// Whether the run finished without failures.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Renders the report as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`BackupError::Snapshot`] if rendering fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|source| BackupError::Snapshot {
            context: "failed to render backup report".to_string(),
            source,
        })
    }
}

/// Everything one kind produced.
#[derive(Debug)]
struct KindOutcome {
    kind: ObjectKind,
    records: usize,
    failures: Vec<BackupFailure>,
    removed: Vec<PathBuf>,
    /// Live schemas, set when the schema kind extracted successfully
    live_schemas: Option<Vec<String>>,
}

impl KindOutcome {
    fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            records: 0,
            failures: Vec::new(),
            removed: Vec::new(),
            live_schemas: None,
        }
    }

    fn fail(&mut self, object: Option<String>, error: &BackupError) {
        warn!(
            "{} failed{}: {}",
            self.kind,
            object.as_deref().map(|o| format!(" for {}", o)).unwrap_or_default(),
            error
        );
        self.failures.push(BackupFailure::new(self.kind, object, error));
    }
}

/// A persistence failure and the directory it leaves unreconcilable.
///
/// `dir` is `None` when the output path itself could not be derived; the
/// kind is then not reconciled at all.
struct PersistFailure {
    dir: Option<PathBuf>,
    object: String,
    error: BackupError,
}

/// Runs backups of one catalog into one destination tree.
///
/// # Example
/// ```rust,no_run
/// use exabackup_core::{BackupConfig, BackupRunner, MemorySource, ObjectKind};
/// use std::sync::Arc;
///
/// # async fn example() -> exabackup_core::Result<()> {
/// let config = BackupConfig::new("/var/backups/exa").with_kinds([ObjectKind::Views]);
/// let runner = BackupRunner::new(Arc::new(MemorySource::new()), config)?;
/// let report = runner.run().await;
/// assert!(report.is_success());
/// # Ok(())
/// # }
/// ```
pub struct BackupRunner {
    source: Arc<dyn CatalogSource>,
    config: BackupConfig,
    cancel: CancellationToken,
}

impl BackupRunner {
    /// Creates a runner after validating `config`.
    ///
    /// # Errors
    /// Returns a configuration error if `config` is invalid.
    pub fn new(source: Arc<dyn CatalogSource>, config: BackupConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Replaces the cancellation token, e.g. with a child of a process-wide
    /// shutdown token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this runner.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Configuration of this runner.
    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Runs the backup to completion or cancellation.
    pub async fn run(&self) -> BackupReport {
        let start_time = Instant::now();
        let started_at = chrono::Utc::now();
        let writer = TreeWriter::new(&self.config.destination);

        info!(
            "Starting backup of {} kinds from {} into {} (max_concurrency: {}, drop_extras: {})",
            self.config.kinds.len(),
            self.source.describe(),
            self.config.destination.display(),
            self.config.max_concurrency,
            self.config.drop_extras
        );

        let mut outcomes: Vec<KindOutcome> = stream::iter(self.config.kinds.iter().copied())
            .map(|kind| self.backup_kind(&writer, kind))
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|outcome| {
            self.config
                .kinds
                .iter()
                .position(|kind| *kind == outcome.kind)
        });

        let mut removed = Vec::new();
        let mut failures = Vec::new();
        let mut kinds = Vec::new();
        let mut live_schemas = None;
        for outcome in outcomes {
            kinds.push(KindSummary {
                kind: outcome.kind,
                records: outcome.records,
                failures: outcome.failures.len(),
            });
            removed.extend(outcome.removed);
            failures.extend(outcome.failures);
            if outcome.live_schemas.is_some() {
                live_schemas = outcome.live_schemas;
            }
        }

        if let Some(live) = live_schemas
            && self.reconciliation_allowed()
            && let Err(error) = prune_stale_schema_dirs(writer.root(), &live, &mut removed).await
        {
            let failure = BackupFailure::new(ObjectKind::Schemas, None, &error);
            warn!("{}", failure);
            failures.push(failure);
        }

        let cancelled = self.cancel.is_cancelled();
        let total_duration = start_time.elapsed();
        let report = BackupReport {
            started_at,
            duration_ms: u64::try_from(total_duration.as_millis()).unwrap_or(u64::MAX),
            kinds,
            files_written: writer.files_written(),
            removed,
            failures,
            cancelled,
        };

        info!(
            "Backup {} in {:.2}s: {} files written, {} stale entries removed, {} failures",
            if cancelled { "cancelled" } else { "completed" },
            total_duration.as_secs_f64(),
            report.files_written,
            report.removed.len(),
            report.failures.len()
        );
        report
    }

    fn reconciliation_allowed(&self) -> bool {
        self.config.drop_extras && !self.cancel.is_cancelled()
    }

    async fn backup_kind(&self, writer: &TreeWriter, kind: ObjectKind) -> KindOutcome {
        let mut outcome = KindOutcome::new(kind);
        if self.cancel.is_cancelled() {
            return outcome;
        }

        info!("Backing up {}", registry::spec(kind).label);
        let extracted = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return outcome,
            result = extract::extract(self.source.as_ref(), kind, &self.config) => result,
        };
        let extracted = match extracted {
            Ok(extracted) => extracted,
            Err(error) => {
                outcome.fail(None, &error);
                return outcome;
            }
        };

        outcome.records = extracted.records.len();
        for failure in &extracted.failures {
            outcome.fail(Some(failure.schema.clone()), &failure.error);
        }
        if kind == ObjectKind::Schemas {
            outcome.live_schemas = Some(extracted.live_schemas.clone());
        }

        let persisted: Vec<Vec<PersistFailure>> = stream::iter(extracted.records)
            .map(|record| self.persist(writer, record))
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;

        let mut dirty = BTreeSet::new();
        let mut kind_wide_failure = false;
        for failure in persisted.into_iter().flatten() {
            match failure.dir {
                Some(dir) => {
                    dirty.insert(dir);
                }
                None => kind_wide_failure = true,
            }
            outcome.fail(Some(failure.object), &failure.error);
        }

        if !self.reconciliation_allowed() {
            return outcome;
        }
        if kind_wide_failure {
            debug!("Skipping reconciliation of {}: output paths failed", kind);
            return outcome;
        }

        let scopes = match reconcile_scopes(
            writer.root(),
            kind,
            &extracted.live_schemas,
            &extracted.failed_schemas,
        )
        .await
        {
            Ok(scopes) => scopes,
            Err(error) => {
                outcome.fail(None, &error);
                return outcome;
            }
        };

        for (dir, owned) in scopes {
            if dirty.contains(&dir) {
                debug!("Skipping reconciliation of {}: writes failed", dir.display());
                continue;
            }
            if self.cancel.is_cancelled() {
                break;
            }
            match reconcile::reconcile(&dir, &owned, &writer.written(&dir)).await {
                Ok(mut removed) => outcome.removed.append(&mut removed),
                Err(error) => outcome.fail(Some(dir.display().to_string()), &error),
            }
        }
        outcome
    }

    /// Serializes and writes one record plus its data file.
    async fn persist(&self, writer: &TreeWriter, record: ObjectRecord) -> Vec<PersistFailure> {
        let mut failures = Vec::new();
        if self.cancel.is_cancelled() {
            return failures;
        }
        let object = record.display_name();
        let root = writer.root();

        let (path, data_path) = match registry::output_path(root, &record)
            .and_then(|path| Ok((path, registry::data_path(root, &record)?)))
        {
            Ok(paths) => paths,
            Err(error) => {
                failures.push(PersistFailure {
                    dir: None,
                    object,
                    error,
                });
                return failures;
            }
        };
        let dir = path.parent().map(Path::to_path_buf);

        let written = match serialize(&record) {
            Ok(text) => writer.write(&path, text.as_bytes()).await,
            Err(error) => Err(error),
        };
        if let Err(error) = written {
            failures.push(PersistFailure {
                dir: dir.clone(),
                object: object.clone(),
                error,
            });
        } else {
            debug!("Saved {} {}", record.kind, object);
        }

        if let (Some(data_path), Some(schema)) = (data_path, record.schema.as_deref()) {
            let row_cap = self.config.row_cap(record.kind);
            let exported = if row_cap == 0 {
                writer.claim(&data_path)
            } else {
                match export::export_rows(self.source.as_ref(), schema, &record.name, row_cap).await {
                    Ok(bytes) => writer.write(&data_path, &bytes).await,
                    Err(error) => Err(error),
                }
            };
            if let Err(error) = exported {
                // keep the previous snapshot
                let _ = writer.claim(&data_path);
                failures.push(PersistFailure { dir, object, error });
            }
        }
        failures
    }
}

/// Directories a kind reconciles and the entries it owns in each.
async fn reconcile_scopes(
    root: &Path,
    kind: ObjectKind,
    live_schemas: &[String],
    failed_schemas: &[String],
) -> Result<Vec<(PathBuf, Owned)>> {
    let schemas_root = root.join(registry::SCHEMAS_DIR);
    Ok(match registry::spec(kind).layout {
        Layout::Flat { file } => vec![(root.to_path_buf(), Owned::name(file))],
        Layout::PerObject { dir } => vec![(root.join(dir), Owned::All)],
        Layout::SchemaFile { file } => reconcile::list_dirs(&schemas_root)
            .await?
            .into_iter()
            .map(|name| (schemas_root.join(name), Owned::name(file)))
            .collect(),
        Layout::SchemaScoped { dir } => {
            let live: BTreeSet<String> = live_schemas
                .iter()
                .map(|s| registry::file_stem(s))
                .collect();
            let mut scopes: Vec<(PathBuf, Owned)> = live_schemas
                .iter()
                .filter(|schema| !failed_schemas.contains(schema))
                .map(|schema| (registry::schema_dir(root, schema).join(dir), Owned::All))
                .collect();
            for name in reconcile::list_dirs(&schemas_root).await? {
                if !live.contains(&name) {
                    scopes.push((schemas_root.join(name), Owned::name(dir)));
                }
            }
            scopes
        }
    })
}

/// Removes the directories of dropped schemas once nothing is left in them.
async fn prune_stale_schema_dirs(
    root: &Path,
    live_schemas: &[String],
    removed: &mut Vec<PathBuf>,
) -> Result<()> {
    let schemas_root = root.join(registry::SCHEMAS_DIR);
    let live: BTreeSet<String> = live_schemas
        .iter()
        .map(|s| registry::file_stem(s))
        .collect();
    for name in reconcile::list_dirs(&schemas_root).await? {
        if live.contains(&name) {
            continue;
        }
        let dir = schemas_root.join(&name);
        if reconcile::prune_if_empty(&dir).await? {
            removed.push(dir);
        }
    }
    Ok(())
}

/// Validates `config` and runs one backup.
///
/// # Errors
/// Returns a configuration error if `config` is invalid. Failures during the
/// run are reported in the [`BackupReport`] instead.
pub async fn run_backup(
    source: Arc<dyn CatalogSource>,
    config: BackupConfig,
) -> Result<BackupReport> {
    Ok(BackupRunner::new(source, config)?.run().await)
}
