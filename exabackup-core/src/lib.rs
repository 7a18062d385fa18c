//! Catalog backup engine for Exasol databases.
//!
//! This crate turns the live catalog of a database into a directory tree of
//! SQL files that recreate it (plus optional CSV snapshots of table and view
//! contents), and keeps that tree in sync with the catalog across runs.
//!
//! # Guarantees
//! - Catalog access is read-only; the only writes go to the destination tree
//! - Secret literals (`IDENTIFIED BY ...`) are masked before reaching disk
//! - Identical catalog state produces byte-identical files
//! - Every file is replaced atomically; readers never see a partial file
//!
//! # Architecture
//! - [`source::CatalogSource`] abstracts query execution; the engine never
//!   talks to a driver directly
//! - [`extract`] builds [`ObjectRecord`]s per kind, [`serialize`] renders
//!   them, [`writer::TreeWriter`] persists them
//! - [`reconcile`] removes entries whose object no longer exists
//! - [`backup::BackupRunner`] drives all of the above concurrently and
//!   collects failures into a [`BackupReport`]

pub mod backup;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod logging;
pub mod models;
pub mod quote;
pub mod reconcile;
pub mod registry;
pub mod security;
pub mod serialize;
pub mod source;
pub mod writer;

// Re-export commonly used types
pub use backup::{BackupFailure, BackupReport, BackupRunner, KindSummary, run_backup};
pub use config::BackupConfig;
pub use error::{BackupError, FailureClass, Result, SourceError};
pub use models::{Fragment, ObjectKind, ObjectRecord, parse_kind_list};
pub use security::redact_secrets;
pub use serialize::serialize;
pub use source::{CatalogSnapshot, CatalogSource, MemorySource, ResultSet, Value};
