//! Schema definitions, regular and virtual.

use super::{comment_on, fetch};
use crate::{
    Result,
    error::BackupError,
    models::{Fragment, ObjectKind, ObjectRecord},
    quote, registry,
    source::CatalogSource,
};
use std::collections::BTreeMap;

struct Adapter {
    schema: String,
    name: String,
}

pub(super) async fn extract(source: &dyn CatalogSource) -> Result<Vec<ObjectRecord>> {
    let rows = fetch(source, registry::sql::SCHEMAS, None).await?;
    let adapters = fetch(source, registry::sql::VIRTUAL_SCHEMAS, None).await?;
    let properties = fetch(source, registry::sql::VIRTUAL_SCHEMA_PROPERTIES, None).await?;

    let mut adapter_of = BTreeMap::new();
    for row in adapters.iter("EXA_ALL_VIRTUAL_SCHEMAS") {
        adapter_of.insert(row.text("SCHEMA_NAME")?, Adapter {
            schema: row.text("ADAPTER_SCRIPT_SCHEMA")?,
            name: row.text("ADAPTER_SCRIPT_NAME")?,
        });
    }

    let mut properties_of: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for row in properties.iter("EXA_ALL_VIRTUAL_SCHEMA_PROPERTIES") {
        properties_of
            .entry(row.text("SCHEMA_NAME")?)
            .or_default()
            .push((
                row.text("PROPERTY_NAME")?,
                row.value("PROPERTY_VALUE")?.to_text().unwrap_or_default(),
            ));
    }

    let mut records = Vec::new();
    for row in rows.iter("EXA_SCHEMAS") {
        let name = row.text("SCHEMA_NAME")?;
        let target = quote::bracketed(&name);
        let mut record = ObjectRecord::in_schema(ObjectKind::Schemas, name.clone(), name.clone());

        if row.flag("SCHEMA_IS_VIRTUAL")? {
            let adapter = adapter_of.get(&name).ok_or_else(|| {
                BackupError::malformed_row(
                    "ADAPTER_SCRIPT_NAME",
                    Some(&format!("virtual schema {}", name)),
                )
            })?;
            let mut sql = format!(
                "CREATE VIRTUAL SCHEMA IF NOT EXISTS {}\nUSING {}",
                target,
                quote::bracket_qualified(&adapter.schema, &adapter.name)
            );
            if let Some(props) = properties_of.get(&name) {
                sql.push_str("\nWITH");
                for (key, value) in props {
                    sql.push_str(&format!("\n  {} = {}", key, quote::literal(value)));
                }
            }
            record.push(Fragment::statement(sql));
        } else {
            record.push(Fragment::statement(format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                target
            )));
        }

        if let Some(comment) = row.opt_text("SCHEMA_COMMENT")? {
            record.push(comment_on("SCHEMA", &target, &comment));
        }
        if let Some(limit) = row.opt_text("RAW_OBJECT_SIZE_LIMIT")? {
            record.push(Fragment::statement(format!(
                "ALTER SCHEMA {} SET RAW_SIZE_LIMIT = {}",
                target, limit
            )));
        }
        records.push(record);
    }
    Ok(records)
}
