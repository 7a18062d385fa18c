//! Record serialization.
//!
//! Turns an [`ObjectRecord`] into the exact text written to disk. Each
//! fragment gets its terminator, procedural bodies are wrapped in `--/` …
//! `/` so their inner `;` do not end the statement, and secrets are masked
//! last. The output depends on nothing but the record.

use crate::{
    Result,
    error::BackupError,
    models::{Fragment, ObjectRecord},
    quote, security,
};

/// Renders `record` as a re-applicable script.
///
/// A record without fragments renders as empty text. The file is still
/// written, so a kind that has no objects left (no connections, only
/// built-in roles) replaces the previous content instead of leaving it to
/// be re-applied.
///
/// # Errors
/// Returns [`BackupError::Serialization`] for empty statements, empty
/// schema names, or block bodies containing a line that is exactly `/`.
pub fn serialize(record: &ObjectRecord) -> Result<String> {
    let mut out = String::new();
    for fragment in &record.fragments {
        render_fragment(record, fragment, &mut out)?;
    }
    Ok(security::redact_secrets(&out).into_owned())
}

fn render_fragment(record: &ObjectRecord, fragment: &Fragment, out: &mut String) -> Result<()> {
    match fragment {
        Fragment::OpenSchema(schema) => {
            if schema.is_empty() {
                return Err(BackupError::serialization(format!(
                    "empty schema in OPEN SCHEMA of {}",
                    record.display_name()
                )));
            }
            out.push_str("OPEN SCHEMA ");
            out.push_str(&quote::bracketed(schema));
            out.push_str(";\n");
        }
        Fragment::Statement(sql) => {
            let sql = normalize_statement(sql);
            if sql.is_empty() {
                return Err(BackupError::serialization(format!(
                    "empty statement in {}",
                    record.display_name()
                )));
            }
            out.push_str(sql);
            out.push_str(";\n");
        }
        Fragment::Block(body) => {
            let body = body.trim();
            if body.is_empty() {
                return Err(BackupError::serialization(format!(
                    "empty block in {}",
                    record.display_name()
                )));
            }
            if body.lines().any(|line| line.trim_end() == "/") {
                return Err(BackupError::serialization(format!(
                    "block body of {} contains a terminator line",
                    record.display_name()
                )));
            }
            out.push_str("--/\n");
            out.push_str(body);
            out.push_str("\n/\n");
        }
    }
    Ok(())
}

/// Strips surrounding whitespace and trailing `;` terminators.
fn normalize_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}
