//! Views, functions and scripts.
//!
//! The catalog keeps their source text verbatim. Records open the owning
//! schema first because the stored text may reference objects unqualified.

use super::{comment_on, fetch};
use crate::{
    Result,
    models::{Fragment, ObjectKind, ObjectRecord},
    quote, registry,
    source::CatalogSource,
};

pub(super) async fn extract_views(
    source: &dyn CatalogSource,
    schema: &str,
) -> Result<Vec<ObjectRecord>> {
    let rows = fetch(source, registry::sql::VIEWS, Some(schema)).await?;
    rows.iter("EXA_ALL_VIEWS")
        .map(|row| {
            Ok(
                ObjectRecord::in_schema(ObjectKind::Views, schema, row.text("VIEW_NAME")?)
                    .with(Fragment::open_schema(schema))
                    .with(Fragment::statement(row.text("VIEW_TEXT")?)),
            )
        })
        .collect()
}

pub(super) async fn extract_functions(
    source: &dyn CatalogSource,
    schema: &str,
) -> Result<Vec<ObjectRecord>> {
    let rows = fetch(source, registry::sql::FUNCTIONS, Some(schema)).await?;
    let mut records = Vec::new();
    for row in rows.iter("EXA_ALL_FUNCTIONS") {
        records.push(procedural(
            ObjectKind::Functions,
            schema,
            row.text("FUNCTION_NAME")?,
            row.text("FUNCTION_TEXT")?,
            row.opt_text("FUNCTION_COMMENT")?,
        ));
    }
    Ok(records)
}

pub(super) async fn extract_scripts(
    source: &dyn CatalogSource,
    schema: &str,
) -> Result<Vec<ObjectRecord>> {
    let rows = fetch(source, registry::sql::SCRIPTS, Some(schema)).await?;
    let mut records = Vec::new();
    for row in rows.iter("EXA_ALL_SCRIPTS") {
        records.push(procedural(
            ObjectKind::Scripts,
            schema,
            row.text("SCRIPT_NAME")?,
            row.text("SCRIPT_TEXT")?,
            row.opt_text("SCRIPT_COMMENT")?,
        ));
    }
    Ok(records)
}

fn procedural(
    kind: ObjectKind,
    schema: &str,
    name: String,
    text: String,
    comment: Option<String>,
) -> ObjectRecord {
    let object_type = if kind == ObjectKind::Functions {
        "FUNCTION"
    } else {
        "SCRIPT"
    };
    let target = quote::bracket_qualified(schema, &name);
    let mut record = ObjectRecord::in_schema(kind, schema, name)
        .with(Fragment::open_schema(schema))
        .with(Fragment::block(text));
    if let Some(comment) = comment {
        record.push(comment_on(object_type, &target, &comment));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::serialize;
    use crate::source::{MemorySource, ResultSet, Value};

    #[tokio::test]
    async fn test_views_open_schema() {
        let view = "CREATE OR REPLACE FORCE VIEW \"test\".\"V1\" (c COMMENT IS 'column comment') AS\n\
                    SELECT 'Hi Mom!!' AS col COMMENT IS 'view comment'";
        let source = MemorySource::new().with_result(
            &registry::render(registry::sql::VIEWS, "test"),
            ResultSet::new(["VIEW_NAME", "VIEW_TEXT"]).with_row(["V1", view]),
        );
        let records = extract_views(&source, "test").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            serialize(&records[0]).unwrap(),
            format!("OPEN SCHEMA [test];\n{};\n", view)
        );
    }

    #[tokio::test]
    async fn test_function_block_and_comment() {
        let text = "CREATE OR REPLACE FUNCTION \"test\".\"F1\" ()\n\
                    RETURN DECIMAL res DECIMAL; BEGIN RETURN 1; END;";
        let source = MemorySource::new().with_result(
            &registry::render(registry::sql::FUNCTIONS, "test"),
            ResultSet::new(["FUNCTION_NAME", "FUNCTION_TEXT", "FUNCTION_COMMENT"])
                .with_row([Value::from("F1"), Value::from(text), Value::from("func comment")])
                .with_row([Value::from("F2"), Value::from(text), Value::Null]),
        );
        let records = extract_functions(&source, "test").await.unwrap();
        assert_eq!(
            serialize(&records[0]).unwrap(),
            format!(
                "OPEN SCHEMA [test];\n--/\n{}\n/\nCOMMENT ON FUNCTION [test].[F1] IS 'func comment';\n",
                text
            )
        );
        assert_eq!(
            serialize(&records[1]).unwrap(),
            format!("OPEN SCHEMA [test];\n--/\n{}\n/\n", text)
        );
    }

    #[tokio::test]
    async fn test_script_comment() {
        let text = "CREATE OR REPLACE LUA SCRIPT \"SCRIPTING_SCRIPT\" () RETURNS ROWCOUNT AS\n\
                    function hi()\n output('hello')\nend";
        let source = MemorySource::new().with_result(
            &registry::render(registry::sql::SCRIPTS, "test"),
            ResultSet::new(["SCRIPT_NAME", "SCRIPT_TEXT", "SCRIPT_COMMENT"]).with_row([
                "SCRIPTING_SCRIPT",
                text,
                "script comment",
            ]),
        );
        let records = extract_scripts(&source, "test").await.unwrap();
        let sql = serialize(&records[0]).unwrap();
        assert!(sql.ends_with(
            "\n/\nCOMMENT ON SCRIPT [test].[SCRIPTING_SCRIPT] IS 'script comment';\n"
        ));
        assert!(sql.starts_with("OPEN SCHEMA [test];\n--/\n"));
    }
}
