//! Catalog extraction.
//!
//! Turns catalog rows into [`ObjectRecord`]s carrying every fragment needed
//! to recreate an object: definition, comments, ownership, limits, password
//! policy and grants.
//!
//! Schema-scoped kinds enumerate schemas first and extract each schema
//! independently. A failing schema is reported in
//! [`KindExtract::failures`] and listed in [`KindExtract::failed_schemas`];
//! its siblings are unaffected. For every other kind a failing query fails
//! the whole kind.
//!
//! # Module Structure
//! - `parameters`: system parameters
//! - `schemas`: regular and virtual schemas
//! - `tables`: table DDL from columns and constraints
//! - `routines`: views, functions and scripts
//! - `principals`: users and roles
//! - `connections`: connections and priority groups
//! - `privileges`: grants in category order

mod connections;
mod parameters;
mod principals;
mod privileges;
mod routines;
mod schemas;
mod tables;

use crate::{
    Result,
    config::BackupConfig,
    error::BackupError,
    models::{Fragment, ObjectKind, ObjectRecord},
    quote, registry,
    source::{self, CatalogSource, ResultSet},
};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

/// A failure confined to one schema of a schema-scoped kind.
#[derive(Debug)]
pub struct ExtractFailure {
    /// Schema whose extraction failed
    pub schema: String,
    /// What went wrong
    pub error: BackupError,
}

/// Everything extracted for one kind.
#[derive(Debug)]
pub struct KindExtract {
    /// Kind extracted
    pub kind: ObjectKind,
    /// Records in deterministic order
    pub records: Vec<ObjectRecord>,
    /// Schemas that exist in the catalog (schema kinds only)
    pub live_schemas: Vec<String>,
    /// Live schemas whose extraction failed
    pub failed_schemas: Vec<String>,
    /// Per-schema failures
    pub failures: Vec<ExtractFailure>,
}

impl KindExtract {
    fn new(kind: ObjectKind, records: Vec<ObjectRecord>) -> Self {
        Self {
            kind,
            records,
            live_schemas: Vec::new(),
            failed_schemas: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Extracts every object of `kind`.
///
/// # Errors
/// Returns an extraction error when a query that the whole kind depends on
/// fails, or when a row lacks an expected column.
pub async fn extract(
    source: &dyn CatalogSource,
    kind: ObjectKind,
    config: &BackupConfig,
) -> Result<KindExtract> {
    debug!("Extracting {} from {}", registry::spec(kind).label, source.describe());
    match kind {
        ObjectKind::Parameters => Ok(KindExtract::new(kind, vec![
            parameters::extract(source).await?,
        ])),
        ObjectKind::Schemas => {
            let records = schemas::extract(source).await?;
            let mut extract = KindExtract::new(kind, Vec::new());
            extract.live_schemas = records
                .iter()
                .filter_map(|r| r.schema.clone())
                .collect();
            extract.records = records;
            Ok(extract)
        }
        ObjectKind::Tables | ObjectKind::Views | ObjectKind::Functions | ObjectKind::Scripts => {
            extract_scoped(source, kind, config.max_concurrency).await
        }
        ObjectKind::Users => Ok(KindExtract::new(kind, principals::extract_users(source).await?)),
        ObjectKind::Roles => Ok(KindExtract::new(kind, principals::extract_roles(source).await?)),
        ObjectKind::Connections => Ok(KindExtract::new(kind, vec![
            connections::extract_connections(source).await?,
        ])),
        ObjectKind::PriorityGroups => Ok(KindExtract::new(kind, vec![
            connections::extract_priority_groups(source).await?,
        ])),
        ObjectKind::Privileges => Ok(KindExtract::new(kind, vec![
            privileges::extract(source).await?,
        ])),
    }
}

async fn extract_scoped(
    source: &dyn CatalogSource,
    kind: ObjectKind,
    max_concurrency: usize,
) -> Result<KindExtract> {
    let rows = fetch(source, registry::sql::SCHEMA_LIST, None).await?;
    let live_schemas = rows
        .iter("EXA_SCHEMAS")
        .map(|row| row.text("SCHEMA_NAME"))
        .collect::<Result<Vec<_>>>()?;

    // `buffered` keeps results in schema order
    let results: Vec<(String, Result<Vec<ObjectRecord>>)> = stream::iter(live_schemas.clone())
        .map(|schema| async move {
            let result = extract_schema(source, kind, &schema).await;
            (schema, result)
        })
        .buffered(max_concurrency.max(1))
        .collect()
        .await;

    let mut extract = KindExtract::new(kind, Vec::new());
    extract.live_schemas = live_schemas;
    for (schema, result) in results {
        match result {
            Ok(mut records) => extract.records.append(&mut records),
            Err(error) => {
                warn!("Failed to extract {} of schema {}: {}", kind, schema, error);
                extract.failed_schemas.push(schema.clone());
                extract.failures.push(ExtractFailure { schema, error });
            }
        }
    }
    Ok(extract)
}

async fn extract_schema(
    source: &dyn CatalogSource,
    kind: ObjectKind,
    schema: &str,
) -> Result<Vec<ObjectRecord>> {
    let records = match kind {
        ObjectKind::Tables => tables::extract(source, schema).await?,
        ObjectKind::Views => routines::extract_views(source, schema).await?,
        ObjectKind::Functions => routines::extract_functions(source, schema).await?,
        ObjectKind::Scripts => routines::extract_scripts(source, schema).await?,
        other => {
            return Err(BackupError::configuration(format!(
                "{} is not a schema-scoped kind",
                other
            )));
        }
    };
    debug!("Extracted {} {} of schema {}", records.len(), kind, schema);
    Ok(records)
}

/// Runs a query template, substituting `schema` when given.
async fn fetch(source: &dyn CatalogSource, template: &str, schema: Option<&str>) -> Result<ResultSet> {
    let view = catalog_view(template);
    match schema {
        Some(schema) => {
            let context = format!("{} of schema {}", view, schema);
            source::query(source, &registry::render(template, schema), &context).await
        }
        None => source::query(source, template, view).await,
    }
}

/// First catalog view named in a query, for error contexts.
fn catalog_view(template: &str) -> &str {
    template
        .split_whitespace()
        .find(|word| word.starts_with("EXA_"))
        .unwrap_or("catalog")
}

/// `COMMENT ON <object_type> <target> IS '<comment>'`.
fn comment_on(object_type: &str, target: &str, comment: &str) -> Fragment {
    Fragment::statement(format!(
        "COMMENT ON {} {} IS {}",
        object_type,
        target,
        quote::literal(comment)
    ))
}
