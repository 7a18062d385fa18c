//! In-memory catalog source and JSON catalog snapshots.

use super::{CatalogSource, ResultSet};
use crate::{
    Result,
    error::{BackupError, SourceError},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Serialized form of a catalog: query text to result set.
///
/// ```json
/// {"queries": {"SELECT ...": {"columns": ["A"], "rows": [[1]]}}}
/// ```
///
/// `failures` maps query text to an error message the source reports
/// instead of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Answers keyed by query text
    #[serde(default)]
    pub queries: BTreeMap<String, ResultSet>,
    /// Queries that fail, with the reported message
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<String, String>,
}

impl CatalogSnapshot {
    /// Parses a snapshot from JSON text.
    ///
    /// # Errors
    /// Returns [`BackupError::Snapshot`] if the text is not a valid snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| BackupError::Snapshot {
            context: "invalid catalog snapshot".to_string(),
            source,
        })
    }

    /// Renders the snapshot as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`BackupError::Snapshot`] if rendering fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|source| BackupError::Snapshot {
            context: "failed to render catalog snapshot".to_string(),
            source,
        })
    }

    /// Loads a snapshot file.
    ///
    /// # Errors
    /// Returns [`BackupError::Io`] if the file cannot be read and
    /// [`BackupError::Snapshot`] if it does not parse.
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| BackupError::Io {
                context: format!("failed to read catalog snapshot {}", path.display()),
                source,
            })?;
        Self::from_json(&json)
    }

    /// Saves the snapshot to `path`.
    ///
    /// # Errors
    /// Returns [`BackupError::Io`] if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| BackupError::Io {
                context: format!("failed to write catalog snapshot {}", path.display()),
                source,
            })
    }
}

/// Catalog source answering from registered query texts.
///
/// Query texts are matched after collapsing whitespace runs, so formatting
/// differences in the registered SQL do not matter. Unregistered queries
/// return an empty result set unless the source is [`strict`](Self::strict),
/// which makes a snapshot only need to list the catalog views that have rows.
#[derive(Debug, Default)]
pub struct MemorySource {
    answers: BTreeMap<String, std::result::Result<ResultSet, String>>,
    strict: bool,
    executed: Mutex<Vec<String>>,
}

impl MemorySource {
    /// Creates an empty, lenient source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a source from a snapshot.
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let mut source = Self::new();
        for (sql, rows) in snapshot.queries {
            source = source.with_result(&sql, rows);
        }
        for (sql, message) in snapshot.failures {
            source = source.with_failure(&sql, message);
        }
        source
    }

    /// Registers rows for `sql`.
    pub fn with_result(mut self, sql: &str, rows: ResultSet) -> Self {
        self.answers.insert(normalize(sql), Ok(rows));
        self
    }

    /// Registers a failure for `sql`.
    pub fn with_failure(mut self, sql: &str, message: impl Into<String>) -> Self {
        self.answers.insert(normalize(sql), Err(message.into()));
        self
    }

    /// Makes unregistered queries fail instead of returning no rows.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Exports the registered answers as a snapshot.
    pub fn snapshot(&self) -> CatalogSnapshot {
        let mut snapshot = CatalogSnapshot::default();
        for (sql, answer) in &self.answers {
            match answer {
                Ok(rows) => {
                    snapshot.queries.insert(sql.clone(), rows.clone());
                }
                Err(message) => {
                    snapshot.failures.insert(sql.clone(), message.clone());
                }
            }
        }
        snapshot
    }

    /// Queries executed so far, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogSource for MemorySource {
    async fn execute(&self, sql: &str) -> Result<ResultSet> {
        let key = normalize(sql);
        if let Ok(mut log) = self.executed.lock() {
            log.push(key.clone());
        }
        match self.answers.get(&key) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(message)) => Err(BackupError::extraction(
                "catalog query",
                SourceError::new(message.clone()),
            )),
            None if self.strict => Err(BackupError::extraction(
                "catalog query",
                SourceError::new("no result registered for query"),
            )),
            None => Ok(ResultSet::default()),
        }
    }

    fn describe(&self) -> String {
        format!("in-memory catalog ({} queries)", self.answers.len())
    }
}

fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Value;

    #[tokio::test]
    async fn test_registered_and_unknown_queries() {
        let source = MemorySource::new()
            .with_result(
                "SELECT ROLE_NAME\n  FROM EXA_DBA_ROLES",
                ResultSet::new(["ROLE_NAME"]).with_row(["DBA"]),
            )
            .with_failure("SELECT * FROM BROKEN", "insufficient privileges");

        let rows = source
            .execute("SELECT ROLE_NAME FROM EXA_DBA_ROLES")
            .await
            .unwrap();
        assert_eq!(rows.rows, vec![vec![Value::from("DBA")]]);

        let err = source.execute("SELECT * FROM BROKEN").await.unwrap_err();
        assert!(matches!(err, BackupError::Extraction { .. }));

        let rows = source.execute("SELECT 1").await.unwrap();
        assert!(rows.is_empty());

        assert_eq!(source.executed().len(), 3);
    }

    #[tokio::test]
    async fn test_strict_source_rejects_unknown_queries() {
        let source = MemorySource::new().strict();
        assert!(source.execute("SELECT 1").await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let source = MemorySource::new()
            .with_result(
                "SELECT USER_NAME FROM EXA_DBA_USERS",
                ResultSet::new(["USER_NAME"]).with_row(["JOE"]),
            )
            .with_failure("SELECT X FROM Y", "boom");
        source.snapshot().save(&path).await.unwrap();

        let loaded = CatalogSnapshot::load(&path).await.unwrap();
        assert_eq!(loaded, source.snapshot());
        let reloaded = MemorySource::from_snapshot(loaded);
        let rows = reloaded
            .execute("SELECT USER_NAME FROM EXA_DBA_USERS")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_invalid_snapshot_json() {
        let err = CatalogSnapshot::from_json("{\"queries\": 3}").unwrap_err();
        assert!(matches!(err, BackupError::Snapshot { .. }));
        assert!(CatalogSnapshot::from_json("{}").unwrap().queries.is_empty());
    }
}
