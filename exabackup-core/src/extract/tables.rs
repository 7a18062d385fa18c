//! Table DDL reconstruction.
//!
//! The engine has no "show create table", so the statement is rebuilt from
//! the column and constraint views:
//!
//! ```text
//! CREATE OR REPLACE TABLE "s"."t" (
//!     "A" DECIMAL(18,0) IDENTITY 321 NOT NULL COMMENT IS '...',
//!     "C" DECIMAL(18,0) DEFAULT 123 CONSTRAINT "cnst" NOT NULL DISABLE,
//!     FOREIGN KEY ("B","C") REFERENCES "s"."T1" ("A","B") DISABLE,
//!     CONSTRAINT "mypk" PRIMARY KEY ("A","C"),
//!     DISTRIBUTE BY "A","B",
//!     PARTITION BY "B","C"
//! ) COMMENT IS '...'
//! ```
//!
//! `NOT NULL` constraints fold into their column. Constraint names the
//! engine generated (`SYS_…`) are left out so re-applying generates fresh
//! ones.

use super::fetch;
use crate::{
    Result,
    error::BackupError,
    models::{Fragment, ObjectKind, ObjectRecord},
    quote, registry,
    source::{CatalogSource, Row, Value},
};
use std::collections::BTreeMap;

const INDENT: &str = "    ";
const NOT_NULL: &str = "NOT NULL";

#[derive(Debug, Default)]
struct Column {
    name: String,
    data_type: String,
    identity: Option<String>,
    default: Option<String>,
    comment: Option<String>,
    distribution_key: bool,
    partition_position: Option<i64>,
}

#[derive(Debug)]
struct Constraint {
    kind: String,
    name: String,
    enabled: bool,
    columns: Vec<String>,
    referenced_table: Option<(String, String)>,
    referenced_columns: Vec<String>,
}

impl Constraint {
    fn user_name(&self) -> Option<&str> {
        (!self.name.starts_with("SYS_")).then_some(self.name.as_str())
    }

    fn render(&self) -> String {
        let mut sql = String::new();
        if let Some(name) = self.user_name() {
            sql.push_str("CONSTRAINT ");
            sql.push_str(&quote::quoted(name));
            sql.push(' ');
        }
        sql.push_str(&self.kind);
        sql.push_str(" (");
        sql.push_str(&column_list(&self.columns));
        sql.push(')');
        if let Some((schema, table)) = &self.referenced_table {
            sql.push_str(" REFERENCES ");
            sql.push_str(&quote::qualified(schema, table));
            sql.push_str(" (");
            sql.push_str(&column_list(&self.referenced_columns));
            sql.push(')');
        }
        if !self.enabled {
            sql.push_str(" DISABLE");
        }
        sql
    }

    /// Column-level form of a `NOT NULL` constraint.
    fn render_inline(&self) -> String {
        let mut sql = String::new();
        if let Some(name) = self.user_name() {
            sql.push_str("CONSTRAINT ");
            sql.push_str(&quote::quoted(name));
            sql.push(' ');
        }
        sql.push_str(NOT_NULL);
        if !self.enabled {
            sql.push_str(" DISABLE");
        }
        sql
    }
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote::quoted(c))
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_position(row: &Row<'_>, column: &str) -> Result<Option<i64>> {
    match row.value(column)? {
        Value::Null => Ok(None),
        Value::Integer(i) => Ok(Some(*i)),
        Value::Text(s) if s.is_empty() => Ok(None),
        Value::Text(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| BackupError::malformed_row(column, Some("EXA_ALL_COLUMNS"))),
        _ => Err(BackupError::malformed_row(column, Some("EXA_ALL_COLUMNS"))),
    }
}

pub(super) async fn extract(source: &dyn CatalogSource, schema: &str) -> Result<Vec<ObjectRecord>> {
    let tables = fetch(source, registry::sql::TABLES, Some(schema)).await?;
    let column_rows = fetch(source, registry::sql::TABLE_COLUMNS, Some(schema)).await?;
    let constraint_rows = fetch(source, registry::sql::TABLE_CONSTRAINTS, Some(schema)).await?;

    let mut columns_of: BTreeMap<String, Vec<Column>> = BTreeMap::new();
    for row in column_rows.iter("EXA_ALL_COLUMNS") {
        columns_of
            .entry(row.text("COLUMN_TABLE")?)
            .or_default()
            .push(Column {
                name: row.text("COLUMN_NAME")?,
                data_type: row.text("COLUMN_TYPE")?,
                identity: row.opt_text("COLUMN_IDENTITY")?,
                default: row.opt_text("COLUMN_DEFAULT")?,
                comment: row.opt_text("COLUMN_COMMENT")?,
                distribution_key: row.flag("COLUMN_IS_DISTRIBUTION_KEY")?,
                partition_position: parse_position(&row, "COLUMN_PARTITION_KEY_ORDINAL_POSITION")?,
            });
    }

    // (table) -> (type, name) -> constraint; the map order is the output order
    let mut constraints_of: BTreeMap<String, BTreeMap<(String, String), Constraint>> =
        BTreeMap::new();
    for row in constraint_rows.iter("EXA_ALL_CONSTRAINTS") {
        let kind = row.text("CONSTRAINT_TYPE")?;
        let name = row.text("CONSTRAINT_NAME")?;
        let referenced_table = match row.opt_text("REFERENCED_TABLE")? {
            Some(table) => Some((
                row.opt_text("REFERENCED_SCHEMA")?
                    .unwrap_or_else(|| schema.to_string()),
                table,
            )),
            None => None,
        };
        let constraint = constraints_of
            .entry(row.text("CONSTRAINT_TABLE")?)
            .or_default()
            .entry((kind.clone(), name.clone()))
            .or_insert_with(|| Constraint {
                kind,
                name,
                enabled: true,
                columns: Vec::new(),
                referenced_table,
                referenced_columns: Vec::new(),
            });
        constraint.enabled = row.flag("CONSTRAINT_ENABLED")?;
        constraint.columns.push(row.text("COLUMN_NAME")?);
        if let Some(referenced) = row.opt_text("REFERENCED_COLUMN")? {
            constraint.referenced_columns.push(referenced);
        }
    }

    let mut records = Vec::new();
    for row in tables.iter("EXA_ALL_TABLES") {
        let name = row.text("TABLE_NAME")?;
        let columns = columns_of.remove(&name).unwrap_or_default();
        if columns.is_empty() {
            return Err(BackupError::malformed_row(
                "COLUMN_NAME",
                Some(&format!("columns of {}.{}", schema, name)),
            ));
        }
        let constraints = constraints_of.remove(&name).unwrap_or_default();
        let sql = render_table(
            schema,
            &name,
            &columns,
            constraints.values(),
            row.opt_text("TABLE_COMMENT")?.as_deref(),
        );
        records.push(
            ObjectRecord::in_schema(ObjectKind::Tables, schema, name)
                .with(Fragment::statement(sql)),
        );
    }
    Ok(records)
}

fn render_table<'a>(
    schema: &str,
    name: &str,
    columns: &[Column],
    constraints: impl Iterator<Item = &'a Constraint>,
    comment: Option<&str>,
) -> String {
    let mut not_null: BTreeMap<&str, &Constraint> = BTreeMap::new();
    let mut table_constraints = Vec::new();
    for constraint in constraints {
        match (constraint.kind.as_str(), constraint.columns.as_slice()) {
            (NOT_NULL, [column]) => {
                not_null.insert(column.as_str(), constraint);
            }
            _ => table_constraints.push(constraint),
        }
    }

    let mut elements = Vec::new();
    for column in columns {
        let mut line = format!("{} {}", quote::quoted(&column.name), column.data_type);
        if let Some(identity) = &column.identity {
            line.push_str(" IDENTITY ");
            line.push_str(identity);
        }
        if let Some(default) = &column.default {
            line.push_str(" DEFAULT ");
            line.push_str(default);
        }
        if let Some(constraint) = not_null.get(column.name.as_str()) {
            line.push(' ');
            line.push_str(&constraint.render_inline());
        }
        if let Some(comment) = &column.comment {
            line.push_str(" COMMENT IS ");
            line.push_str(&quote::literal(comment));
        }
        elements.push(line);
    }

    elements.extend(table_constraints.iter().map(|c| c.render()));

    let distribution: Vec<String> = columns
        .iter()
        .filter(|c| c.distribution_key)
        .map(|c| c.name.clone())
        .collect();
    if !distribution.is_empty() {
        elements.push(format!("DISTRIBUTE BY {}", column_list(&distribution)));
    }

    let mut partition: Vec<(i64, String)> = columns
        .iter()
        .filter_map(|c| c.partition_position.map(|p| (p, c.name.clone())))
        .collect();
    partition.sort();
    if !partition.is_empty() {
        let names: Vec<String> = partition.into_iter().map(|(_, n)| n).collect();
        elements.push(format!("PARTITION BY {}", column_list(&names)));
    }

    let mut sql = format!(
        "CREATE OR REPLACE TABLE {} (\n{}{}\n)",
        quote::qualified(schema, name),
        INDENT,
        elements.join(&format!(",\n{}", INDENT))
    );
    if let Some(comment) = comment {
        sql.push_str(" COMMENT IS ");
        sql.push_str(&quote::literal(comment));
    }
    sql
}
