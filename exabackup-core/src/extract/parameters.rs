//! System parameters.

use super::fetch;
use crate::{
    Result,
    models::{Fragment, ObjectKind, ObjectRecord},
    quote, registry,
};

/// Parameters that only exist per session and cannot be set system-wide.
const SESSION_ONLY: &[&str] = &["NICE"];

/// Parameters whose value is a bare number.
const NUMERIC: &[&str] = &["NLS_FIRST_DAY_OF_WEEK"];

pub(super) async fn extract(source: &dyn crate::source::CatalogSource) -> Result<ObjectRecord> {
    let rows = fetch(source, registry::sql::PARAMETERS, None).await?;

    let mut settings = Vec::new();
    for row in rows.iter("EXA_PARAMETERS") {
        let name = row.text("PARAMETER_NAME")?;
        if SESSION_ONLY.contains(&name.as_str()) {
            continue;
        }
        let value = row.value("SYSTEM_VALUE")?.to_text().unwrap_or_default();
        settings.push((name, value));
    }
    settings.sort();

    let mut record = ObjectRecord::new(ObjectKind::Parameters, "parameters");
    for (name, value) in settings {
        let value = if NUMERIC.contains(&name.as_str()) && !value.is_empty() {
            value
        } else {
            quote::literal(&value)
        };
        record.push(Fragment::statement(format!(
            "ALTER SYSTEM SET {}={}",
            name, value
        )));
    }
    Ok(record)
}
