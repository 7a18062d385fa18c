//! Row data export.
//!
//! Tables and views can carry a CSV snapshot of their first rows next to
//! their DDL. The row cap goes into the query as `LIMIT`, so the engine
//! never ships more rows than are written.

use crate::{
    Result,
    error::BackupError,
    quote,
    source::{self, CatalogSource, ResultSet},
};
use tracing::debug;

/// Query fetching at most `row_cap` rows of `schema.name`.
pub fn export_query(schema: &str, name: &str, row_cap: u64) -> String {
    format!(
        "SELECT * FROM {} LIMIT {}",
        quote::bracket_qualified(schema, name),
        row_cap
    )
}

/// Fetches up to `row_cap` rows of `schema.name` and renders them as CSV.
///
/// A cap of 0 means no export and yields no bytes without querying.
///
/// # Errors
/// Returns an extraction error if the query fails.
pub async fn export_rows(
    source: &dyn CatalogSource,
    schema: &str,
    name: &str,
    row_cap: u64,
) -> Result<Vec<u8>> {
    if row_cap == 0 {
        return Ok(Vec::new());
    }
    let context = format!("rows of {}.{}", schema, name);
    let rows = source::query(source, &export_query(schema, name, row_cap), &context).await?;
    debug!("Exported {} rows of {}.{}", rows.len(), schema, name);
    render_csv(&rows)
}

/// Renders rows as CSV without a header.
///
/// `,` separates fields, `\n` ends records, and a field is quoted only when
/// it contains the delimiter, a quote or a line break. NULL is an empty
/// field.
///
/// # Errors
/// Returns a serialization error if the CSV writer fails.
pub fn render_csv(rows: &ResultSet) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .has_headers(false)
        .from_writer(Vec::new());

    for row in &rows.rows {
        let fields = row.iter().map(|value| value.to_text().unwrap_or_default());
        writer
            .write_record(fields)
            .map_err(|e| BackupError::serialization(format!("CSV record: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| BackupError::serialization(format!("CSV flush: {}", e.error())))
}
