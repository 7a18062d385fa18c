//! Connections and priority groups, one flat record each.

use super::{comment_on, fetch};
use crate::{
    Result,
    models::{Fragment, ObjectKind, ObjectRecord},
    quote, registry,
    source::CatalogSource,
};

/// The priority group every database has; it can only be altered.
const BUILTIN_GROUP: &str = "MEDIUM";

pub(super) async fn extract_connections(source: &dyn CatalogSource) -> Result<ObjectRecord> {
    let rows = fetch(source, registry::sql::CONNECTIONS, None).await?;
    let mut record = ObjectRecord::new(ObjectKind::Connections, "connections");
    for row in rows.iter("EXA_DBA_CONNECTIONS") {
        let name = quote::identifier(&row.text("CONNECTION_NAME")?);
        let mut sql = format!(
            "CREATE OR REPLACE CONNECTION {} TO {}",
            name,
            quote::literal(&row.value("CONNECTION_STRING")?.to_text().unwrap_or_default())
        );
        // the catalog never reveals the password; the placeholder is masked
        if let Some(user) = row.opt_text("USER_NAME")? {
            sql.push_str(&format!(" USER {} IDENTIFIED BY ''", quote::literal(&user)));
        }
        record.push(Fragment::statement(sql));
        if let Some(comment) = row.opt_text("CONNECTION_COMMENT")? {
            record.push(comment_on("CONNECTION", &name, &comment));
        }
    }
    Ok(record)
}

pub(super) async fn extract_priority_groups(source: &dyn CatalogSource) -> Result<ObjectRecord> {
    let rows = fetch(source, registry::sql::PRIORITY_GROUPS, None).await?;
    let mut record = ObjectRecord::new(ObjectKind::PriorityGroups, "priority_groups");
    for row in rows.iter("EXA_PRIORITY_GROUPS") {
        let name = row.text("PRIORITY_GROUP_NAME")?;
        let group = quote::bracketed(&name);
        let weight = row.text("PRIORITY_GROUP_WEIGHT")?;
        if name == BUILTIN_GROUP {
            record.push(Fragment::statement(format!(
                "ALTER PRIORITY GROUP {} SET WEIGHT = {}",
                group, weight
            )));
        } else {
            record.push(Fragment::statement(format!("DROP PRIORITY GROUP {}", group)));
            record.push(Fragment::statement(format!(
                "CREATE PRIORITY GROUP {} WITH WEIGHT = {}",
                group, weight
            )));
        }
        if let Some(comment) = row.opt_text("PRIORITY_GROUP_COMMENT")? {
            record.push(comment_on("PRIORITY GROUP", &group, &comment));
        }
    }
    Ok(record)
}
