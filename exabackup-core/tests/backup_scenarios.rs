//! End-to-end backup scenarios against an in-memory catalog.
//!
//! Each test runs the full pipeline (extract, serialize, export, write,
//! reconcile) into a temporary directory and compares the resulting tree
//! with exact text.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::uninlined_format_args)]

use exabackup_core::{
    BackupConfig, BackupRunner, FailureClass, MemorySource, ObjectKind, ResultSet, Value,
    export::export_query,
    registry::{self, sql},
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const T1_SQL: &str = "CREATE OR REPLACE TABLE \"test\".\"T1\" (\n\
                      \x20   \"A\" DECIMAL(18,0),\n\
                      \x20   \"B\" DECIMAL(18,0),\n\
                      \x20   PRIMARY KEY (\"A\",\"B\")\n\
                      );\n";

const T2_SQL: &str = "CREATE OR REPLACE TABLE \"test\".\"T2\" (\n\
                      \x20   \"A\" DECIMAL(18,0),\n\
                      \x20   \"B\" DECIMAL(18,0),\n\
                      \x20   \"C\" DECIMAL(18,0),\n\
                      \x20   FOREIGN KEY (\"B\",\"C\") REFERENCES \"test\".\"T1\" (\"A\",\"B\")\n\
                      );\n";

const V1_TEXT: &str = "CREATE OR REPLACE VIEW \"test\".\"V1\" AS SELECT 'Hi Mom!!' AS C";

/// Every file under `root` (relative path with `/` separators) and its text.
fn read_tree(root: &Path) -> BTreeMap<String, String> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, String>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .unwrap()
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.insert(relative, std::fs::read_to_string(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

fn touch(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn schema_list(names: &[&str]) -> ResultSet {
    names
        .iter()
        .fold(ResultSet::new(["SCHEMA_NAME"]), |rs, name| rs.with_row([*name]))
}

fn table_catalog() -> MemorySource {
    let null = || Value::Null;
    let column = |table: &str, name: &str| {
        [
            Value::from(table),
            Value::from(name),
            Value::from("DECIMAL(18,0)"),
            null(),
            null(),
            null(),
            Value::from(false),
            null(),
        ]
    };
    let columns = ResultSet::new([
        "COLUMN_TABLE",
        "COLUMN_NAME",
        "COLUMN_TYPE",
        "COLUMN_IDENTITY",
        "COLUMN_DEFAULT",
        "COLUMN_COMMENT",
        "COLUMN_IS_DISTRIBUTION_KEY",
        "COLUMN_PARTITION_KEY_ORDINAL_POSITION",
    ])
    .with_row(column("T1", "A"))
    .with_row(column("T1", "B"))
    .with_row(column("T2", "A"))
    .with_row(column("T2", "B"))
    .with_row(column("T2", "C"));

    let constraint = |table: &str, kind: &str, name: &str, col: &str, refs: Option<&str>| {
        [
            Value::from(table),
            Value::from(kind),
            Value::from(name),
            Value::from(true),
            Value::from(col),
            Value::from(refs.map(|_| "test")),
            Value::from(refs.map(|_| "T1")),
            Value::from(refs),
        ]
    };
    let constraints = ResultSet::new([
        "CONSTRAINT_TABLE",
        "CONSTRAINT_TYPE",
        "CONSTRAINT_NAME",
        "CONSTRAINT_ENABLED",
        "COLUMN_NAME",
        "REFERENCED_SCHEMA",
        "REFERENCED_TABLE",
        "REFERENCED_COLUMN",
    ])
    .with_row(constraint("T1", "PRIMARY KEY", "SYS_PK_1", "A", None))
    .with_row(constraint("T1", "PRIMARY KEY", "SYS_PK_1", "B", None))
    .with_row(constraint("T2", "FOREIGN KEY", "SYS_FK_2", "B", Some("A")))
    .with_row(constraint("T2", "FOREIGN KEY", "SYS_FK_2", "C", Some("B")));

    MemorySource::new()
        .with_result(sql::SCHEMA_LIST, schema_list(&["test"]))
        .with_result(
            &registry::render(sql::TABLES, "test"),
            ResultSet::new(["TABLE_NAME", "TABLE_COMMENT"])
                .with_row([Value::from("T1"), Value::Null])
                .with_row([Value::from("T2"), Value::Null]),
        )
        .with_result(&registry::render(sql::TABLE_COLUMNS, "test"), columns)
        .with_result(&registry::render(sql::TABLE_CONSTRAINTS, "test"), constraints)
}

/// Registers T1 (3 rows) and T2 (1 row) for the export query with `row_cap`,
/// returning no more rows than the `LIMIT` allows.
fn with_table_rows(source: MemorySource, row_cap: u64) -> MemorySource {
    let cap = usize::try_from(row_cap).unwrap();
    let t1 = [[1_i64, 2], [3, 4], [5, 6]]
        .into_iter()
        .take(cap)
        .fold(ResultSet::new(["A", "B"]), ResultSet::with_row);
    let t2 = [[7_i64, 3, 4]]
        .into_iter()
        .take(cap)
        .fold(ResultSet::new(["A", "B", "C"]), ResultSet::with_row);
    source
        .with_result(&export_query("test", "T1", row_cap), t1)
        .with_result(&export_query("test", "T2", row_cap), t2)
}

fn view_catalog(names: &[&str]) -> MemorySource {
    let views = names.iter().fold(
        ResultSet::new(["VIEW_NAME", "VIEW_TEXT"]),
        |rs, name| rs.with_row([*name, V1_TEXT]),
    );
    MemorySource::new()
        .with_result(sql::SCHEMA_LIST, schema_list(&["test"]))
        .with_result(&registry::render(sql::VIEWS, "test"), views)
}

fn user_catalog() -> MemorySource {
    MemorySource::new().with_result(
        sql::USERS,
        ResultSet::new([
            "USER_NAME",
            "PASSWORD",
            "KERBEROS_PRINCIPAL",
            "DISTINGUISHED_NAME",
            "USER_COMMENT",
            "PASSWORD_EXPIRY_POLICY",
            "PASSWORD_STATE",
        ])
        .with_row([
            Value::from("JOE"),
            Value::from("12345678"),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
        ]),
    )
}

/// A catalog covering every kind.
fn full_catalog() -> MemorySource {
    let mut snapshot = table_catalog().snapshot();
    for part in [view_catalog(&["V1"]).snapshot(), user_catalog().snapshot()] {
        snapshot.queries.extend(part.queries);
    }
    MemorySource::from_snapshot(snapshot)
        .with_result(
            sql::PARAMETERS,
            ResultSet::new(["PARAMETER_NAME", "SYSTEM_VALUE"])
                .with_row(["NLS_DATE_FORMAT", "YYYY-MM-DD"])
                .with_row(["NICE", "OFF"]),
        )
        .with_result(
            sql::SCHEMAS,
            ResultSet::new([
                "SCHEMA_NAME",
                "SCHEMA_COMMENT",
                "SCHEMA_IS_VIRTUAL",
                "RAW_OBJECT_SIZE_LIMIT",
            ])
            .with_row([
                Value::from("test"),
                Value::from("test schema"),
                Value::from(false),
                Value::Null,
            ]),
        )
        .with_result(
            &registry::render(sql::FUNCTIONS, "test"),
            ResultSet::new(["FUNCTION_NAME", "FUNCTION_TEXT", "FUNCTION_COMMENT"]).with_row([
                Value::from("F1"),
                Value::from(
                    "CREATE OR REPLACE FUNCTION \"test\".\"F1\" () RETURN DECIMAL IS BEGIN RETURN 1; END;",
                ),
                Value::Null,
            ]),
        )
        .with_result(
            &registry::render(sql::SCRIPTS, "test"),
            ResultSet::new(["SCRIPT_NAME", "SCRIPT_TEXT", "SCRIPT_COMMENT"]).with_row([
                Value::from("S1"),
                Value::from("CREATE OR REPLACE LUA SCRIPT \"test\".\"S1\" () AS\noutput('hi')"),
                Value::Null,
            ]),
        )
        .with_result(
            sql::ROLES,
            ResultSet::new(["ROLE_NAME", "ROLE_COMMENT"])
                .with_row([Value::from("READERS"), Value::Null]),
        )
        .with_result(
            sql::CONNECTIONS,
            ResultSet::new([
                "CONNECTION_NAME",
                "CONNECTION_STRING",
                "USER_NAME",
                "CONNECTION_COMMENT",
            ])
            .with_row([
                Value::from("FTP_CONN"),
                Value::from("ftp://host"),
                Value::from("joe"),
                Value::Null,
            ]),
        )
        .with_result(
            sql::PRIORITY_GROUPS,
            ResultSet::new([
                "PRIORITY_GROUP_ID",
                "PRIORITY_GROUP_NAME",
                "PRIORITY_GROUP_WEIGHT",
                "PRIORITY_GROUP_COMMENT",
            ])
            .with_row([
                Value::from(1_i64),
                Value::from("MEDIUM"),
                Value::from(300_i64),
                Value::Null,
            ]),
        )
        .with_result(
            sql::SYSTEM_PRIVS,
            ResultSet::new(["GRANTEE", "PRIVILEGE", "ADMIN_OPTION"]).with_row([
                Value::from("JOE"),
                Value::from("CREATE SESSION"),
                Value::from(false),
            ]),
        )
}

fn runner(source: MemorySource, config: BackupConfig) -> BackupRunner {
    BackupRunner::new(Arc::new(source), config).unwrap()
}

#[tokio::test]
async fn test_scenario_tables_without_row_cap() {
    let dir = tempfile::tempdir().unwrap();
    let source = table_catalog();
    let config = BackupConfig::new(dir.path()).with_kinds([ObjectKind::Tables]);

    let report = runner(source, config).run().await;

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.files_written, 2);
    let tree = read_tree(dir.path());
    assert_eq!(
        tree.keys().collect::<Vec<_>>(),
        vec!["schemas/test/tables/T1.sql", "schemas/test/tables/T2.sql"]
    );
    assert_eq!(tree["schemas/test/tables/T1.sql"], T1_SQL);
    assert_eq!(tree["schemas/test/tables/T2.sql"], T2_SQL);
}

#[tokio::test]
async fn test_scenario_tables_with_row_cap() {
    let dir = tempfile::tempdir().unwrap();
    let source = with_table_rows(table_catalog(), 100);
    let config = BackupConfig::new(dir.path())
        .with_kinds([ObjectKind::Tables])
        .with_max_table_rows(100);

    let report = runner(source, config).run().await;

    assert!(report.is_success(), "{:?}", report.failures);
    let tree = read_tree(dir.path());
    assert_eq!(tree.len(), 4);
    assert_eq!(tree["schemas/test/tables/T1.sql"], T1_SQL);
    assert_eq!(tree["schemas/test/tables/T1.csv"], "1,2\n3,4\n5,6\n");
    assert_eq!(tree["schemas/test/tables/T2.csv"], "7,3,4\n");
}

#[tokio::test]
async fn test_row_cap_bounds_export_query() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(with_table_rows(table_catalog(), 2));
    let config = BackupConfig::new(dir.path())
        .with_kinds([ObjectKind::Tables])
        .with_max_table_rows(2);

    let report = BackupRunner::new(source.clone(), config).unwrap().run().await;

    assert!(report.is_success());
    let executed = source.executed();
    assert!(executed.contains(&"SELECT * FROM [test].[T1] LIMIT 2".to_string()));
    assert!(executed.contains(&"SELECT * FROM [test].[T2] LIMIT 2".to_string()));
    assert!(!executed.iter().any(|q| q.contains("EXA_ALL_VIEWS")));

    // min(cap, rows): T1 has more rows than the cap, T2 fewer
    let tree = read_tree(dir.path());
    assert_eq!(tree["schemas/test/tables/T1.csv"], "1,2\n3,4\n");
    assert_eq!(tree["schemas/test/tables/T1.csv"].lines().count(), 2);
    assert_eq!(tree["schemas/test/tables/T2.csv"], "7,3,4\n");
    assert_eq!(tree["schemas/test/tables/T2.csv"].lines().count(), 1);
}

#[tokio::test]
async fn test_scenario_empty_tables_with_row_cap() {
    let dir = tempfile::tempdir().unwrap();
    let source = table_catalog()
        .with_result(&export_query("test", "T1", 5), ResultSet::new(["A", "B"]))
        .with_result(&export_query("test", "T2", 5), ResultSet::new(["A", "B", "C"]));
    let config = BackupConfig::new(dir.path())
        .with_kinds([ObjectKind::Tables])
        .with_max_table_rows(5);

    let report = runner(source, config).run().await;

    assert!(report.is_success(), "{:?}", report.failures);
    let tree = read_tree(dir.path());
    assert_eq!(
        tree.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            "schemas/test/tables/T1.csv",
            "schemas/test/tables/T1.sql",
            "schemas/test/tables/T2.csv",
            "schemas/test/tables/T2.sql",
        ]
    );
    assert_eq!(tree["schemas/test/tables/T1.csv"], "");
    assert_eq!(tree["schemas/test/tables/T2.csv"], "");
}

#[tokio::test]
async fn test_scenario_user_password_redacted() {
    let dir = tempfile::tempdir().unwrap();
    let config = BackupConfig::new(dir.path()).with_kinds([ObjectKind::Users]);

    let report = runner(user_catalog(), config).run().await;

    assert!(report.is_success());
    let joe = std::fs::read_to_string(dir.path().join("users/JOE.sql")).unwrap();
    assert_eq!(joe, "CREATE USER JOE IDENTIFIED BY ********;\n");
    assert!(!joe.contains("12345678"));
}

#[tokio::test]
async fn test_scenario_full_backup_layout() {
    let dir = tempfile::tempdir().unwrap();
    let config = BackupConfig::new(dir.path()).with_max_view_rows(10);
    let source = full_catalog().with_result(
        &export_query("test", "V1", 10),
        ResultSet::new(["C"]).with_row(["Hi Mom!!"]),
    );

    let report = runner(source, config).run().await;

    assert!(report.is_success(), "{:?}", report.failures);
    let tree = read_tree(dir.path());
    assert_eq!(
        tree.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            "connections.sql",
            "parameters.sql",
            "priority_groups.sql",
            "privileges.sql",
            "roles/READERS.sql",
            "schemas/test/functions/F1.sql",
            "schemas/test/schema.sql",
            "schemas/test/scripts/S1.sql",
            "schemas/test/tables/T1.sql",
            "schemas/test/tables/T2.sql",
            "schemas/test/views/V1.csv",
            "schemas/test/views/V1.sql",
            "users/JOE.sql",
        ]
    );
    assert_eq!(
        tree["parameters.sql"],
        "ALTER SYSTEM SET NLS_DATE_FORMAT='YYYY-MM-DD';\n"
    );
    assert_eq!(
        tree["schemas/test/schema.sql"],
        "CREATE SCHEMA IF NOT EXISTS [test];\nCOMMENT ON SCHEMA [test] IS 'test schema';\n"
    );
    assert_eq!(
        tree["schemas/test/views/V1.sql"],
        format!("OPEN SCHEMA [test];\n{};\n", V1_TEXT)
    );
    assert_eq!(tree["schemas/test/views/V1.csv"], "Hi Mom!!\n");
    assert_eq!(
        tree["priority_groups.sql"],
        "ALTER PRIORITY GROUP [MEDIUM] SET WEIGHT = 300;\n"
    );
    assert_eq!(tree["privileges.sql"], "GRANT CREATE SESSION TO JOE;\n");
    assert_eq!(
        tree["users/JOE.sql"],
        "CREATE USER JOE IDENTIFIED BY ********;\nGRANT CREATE SESSION TO JOE;\n"
    );
    assert!(tree["connections.sql"].contains("IDENTIFIED BY ********"));
    assert!(tree["schemas/test/functions/F1.sql"].starts_with("OPEN SCHEMA [test];\n--/\n"));

    for (path, text) in &tree {
        assert!(!text.contains("12345678"), "secret leaked into {}", path);
        assert!(text.ends_with('\n'), "{} is not newline-terminated", path);
    }
}

#[tokio::test]
async fn test_scenario_output_is_deterministic() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    for (dir, max_concurrency) in [(&first, 1), (&second, 8)] {
        let config = BackupConfig::new(dir.path()).with_max_concurrency(max_concurrency);
        let report = runner(full_catalog(), config).run().await;
        assert!(report.is_success());
    }
    assert_eq!(read_tree(first.path()), read_tree(second.path()));
}

#[tokio::test]
async fn test_scenario_view_rename_with_drop_extras() {
    let dir = tempfile::tempdir().unwrap();
    let config = BackupConfig::new(dir.path())
        .with_kinds([ObjectKind::Views])
        .with_drop_extras(true);

    let report = runner(view_catalog(&["V1"]), config.clone()).run().await;
    assert!(report.is_success());
    assert!(dir.path().join("schemas/test/views/V1.sql").exists());

    // V1 renamed to V3
    let report = runner(view_catalog(&["V3"]), config).run().await;

    assert!(report.is_success());
    let tree = read_tree(dir.path());
    assert_eq!(
        tree.keys().collect::<Vec<_>>(),
        vec!["schemas/test/views/V3.sql"]
    );
    assert_eq!(
        report.removed,
        vec![dir.path().join("schemas/test/views/V1.sql")]
    );
}

#[tokio::test]
async fn test_scenario_without_drop_extras_keeps_stale_files() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "schemas/test/views/OLD.sql", "old\n");
    let config = BackupConfig::new(dir.path()).with_kinds([ObjectKind::Views]);

    let report = runner(view_catalog(&["V1"]), config).run().await;

    assert!(report.is_success());
    assert!(report.removed.is_empty());
    assert!(dir.path().join("schemas/test/views/OLD.sql").exists());
}

#[tokio::test]
async fn test_scenario_partial_run_leaves_unrequested_kinds() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "users/GONE.sql", "gone\n");
    touch(dir.path(), "schemas/test/tables/GONE.sql", "gone\n");
    touch(dir.path(), "schemas/test/schema.sql", "kept\n");
    touch(dir.path(), "privileges.sql", "kept\n");
    touch(dir.path(), "schemas/test/views/GONE.sql", "gone\n");
    let config = BackupConfig::new(dir.path())
        .with_kinds([ObjectKind::Views])
        .with_drop_extras(true);

    let report = runner(view_catalog(&["V1"]), config).run().await;

    assert!(report.is_success());
    let tree = read_tree(dir.path());
    assert!(tree.contains_key("users/GONE.sql"));
    assert!(tree.contains_key("schemas/test/tables/GONE.sql"));
    assert!(tree.contains_key("schemas/test/schema.sql"));
    assert!(tree.contains_key("privileges.sql"));
    assert!(!tree.contains_key("schemas/test/views/GONE.sql"));
    assert!(tree.contains_key("schemas/test/views/V1.sql"));
}

#[tokio::test]
async fn test_scenario_tables_run_leaves_views() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "schemas/test/views/OLD.sql", "old view\n");
    touch(dir.path(), "schemas/test/tables/OLD.sql", "old table\n");
    let config = BackupConfig::new(dir.path())
        .with_kinds([ObjectKind::Tables])
        .with_drop_extras(true);

    let report = runner(table_catalog(), config).run().await;

    assert!(report.is_success(), "{:?}", report.failures);
    let tree = read_tree(dir.path());
    assert_eq!(
        tree.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            "schemas/test/tables/T1.sql",
            "schemas/test/tables/T2.sql",
            "schemas/test/views/OLD.sql",
        ]
    );
    assert_eq!(tree["schemas/test/views/OLD.sql"], "old view\n");
    assert_eq!(
        report.removed,
        vec![dir.path().join("schemas/test/tables/OLD.sql")]
    );
}

#[tokio::test]
async fn test_scenario_kind_without_objects_empties_its_file() {
    let dir = tempfile::tempdir().unwrap();
    touch(
        dir.path(),
        "connections.sql",
        "CREATE OR REPLACE CONNECTION OLD TO 'ftp://gone';\n",
    );
    let source = MemorySource::new().with_result(
        sql::CONNECTIONS,
        ResultSet::new([
            "CONNECTION_NAME",
            "CONNECTION_STRING",
            "USER_NAME",
            "CONNECTION_COMMENT",
        ]),
    );
    let config = BackupConfig::new(dir.path()).with_kinds([ObjectKind::Connections]);

    let report = runner(source, config).run().await;

    assert!(report.is_success());
    assert_eq!(report.files_written, 1);
    assert_eq!(read_tree(dir.path())["connections.sql"], "");
}

#[tokio::test]
async fn test_scenario_dropped_schema_is_pruned() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "schemas/gone/schema.sql", "CREATE SCHEMA [gone];\n");
    touch(dir.path(), "schemas/gone/views/X.sql", "x\n");
    touch(dir.path(), "schemas/gone/tables/Y.sql", "y\n");
    touch(dir.path(), "schemas/gone/tables/Y.csv", "1\n");
    let config = BackupConfig::new(dir.path()).with_drop_extras(true);

    let report = runner(full_catalog(), config).run().await;

    assert!(report.is_success(), "{:?}", report.failures);
    assert!(!dir.path().join("schemas/gone").exists());
    assert!(report.removed.contains(&dir.path().join("schemas/gone")));
    assert!(dir.path().join("schemas/test/schema.sql").exists());
}

#[tokio::test]
async fn test_scenario_stale_schema_dir_kept_when_schemas_not_requested() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "schemas/gone/schema.sql", "CREATE SCHEMA [gone];\n");
    touch(dir.path(), "schemas/gone/views/X.sql", "x\n");
    let config = BackupConfig::new(dir.path())
        .with_kinds([ObjectKind::Views])
        .with_drop_extras(true);

    let report = runner(view_catalog(&["V1"]), config).run().await;

    assert!(report.is_success());
    assert!(!dir.path().join("schemas/gone/views").exists());
    assert!(dir.path().join("schemas/gone/schema.sql").exists());
}

#[tokio::test]
async fn test_scenario_failures_are_aggregated() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "schemas/test/views/OLD.sql", "old\n");
    let source = full_catalog().with_failure(
        &registry::render(sql::VIEWS, "test"),
        "insufficient privileges",
    );
    let config = BackupConfig::new(dir.path())
        .with_kinds([ObjectKind::Views, ObjectKind::Tables])
        .with_drop_extras(true);

    let report = runner(source, config).run().await;

    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.kind, ObjectKind::Views);
    assert_eq!(failure.object.as_deref(), Some("test"));
    assert_eq!(failure.class, FailureClass::Extraction);
    assert!(failure.message.contains("insufficient privileges"));

    // successful kinds are on disk, the failed schema is not reconciled
    assert!(dir.path().join("schemas/test/tables/T1.sql").exists());
    assert!(dir.path().join("schemas/test/views/OLD.sql").exists());
    assert_eq!(report.kinds[0].kind, ObjectKind::Views);
    assert_eq!(report.kinds[1].records, 2);
}

#[tokio::test]
async fn test_scenario_export_failure_keeps_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "schemas/test/tables/T1.csv", "old,rows\n");
    let source = with_table_rows(table_catalog(), 5)
        .with_failure(&export_query("test", "T1", 5), "timeout");
    let config = BackupConfig::new(dir.path())
        .with_kinds([ObjectKind::Tables])
        .with_max_table_rows(5)
        .with_drop_extras(true);

    let report = runner(source, config).run().await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].object.as_deref(), Some("test.T1"));
    assert_eq!(report.failures[0].class, FailureClass::Extraction);
    let tree = read_tree(dir.path());
    assert_eq!(tree["schemas/test/tables/T1.sql"], T1_SQL);
    assert_eq!(tree["schemas/test/tables/T1.csv"], "old,rows\n");
    assert_eq!(tree["schemas/test/tables/T2.csv"], "7,3,4\n");
}

#[tokio::test]
async fn test_scenario_zero_row_cap_keeps_existing_data_file() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "schemas/test/tables/T1.csv", "1,2\n");
    touch(dir.path(), "schemas/test/tables/DROPPED.csv", "9,9\n");
    let config = BackupConfig::new(dir.path())
        .with_kinds([ObjectKind::Tables])
        .with_drop_extras(true);

    let report = runner(table_catalog(), config).run().await;

    assert!(report.is_success());
    let tree = read_tree(dir.path());
    assert_eq!(tree["schemas/test/tables/T1.csv"], "1,2\n");
    assert!(!tree.contains_key("schemas/test/tables/T2.csv"));
    assert!(!tree.contains_key("schemas/test/tables/DROPPED.csv"));
}

#[tokio::test]
async fn test_scenario_cancelled_run_writes_and_removes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "users/GONE.sql", "gone\n");
    let config = BackupConfig::new(dir.path()).with_drop_extras(true);
    let runner = runner(full_catalog(), config);
    runner.cancellation_token().cancel();

    let report = runner.run().await;

    assert!(report.cancelled);
    assert!(!report.is_success());
    assert_eq!(report.files_written, 0);
    assert!(report.removed.is_empty());
    assert_eq!(
        read_tree(dir.path()).keys().collect::<Vec<_>>(),
        vec!["users/GONE.sql"]
    );
}

#[tokio::test]
async fn test_scenario_report_serializes() {
    let dir = tempfile::tempdir().unwrap();
    let config = BackupConfig::new(dir.path()).with_kinds([ObjectKind::Users]);
    let report = runner(user_catalog(), config).run().await;

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["files_written"], 1);
    assert_eq!(json["kinds"][0]["kind"], "USERS");
    assert_eq!(json["kinds"][0]["records"], 1);
    assert_eq!(json["cancelled"], false);
    assert!(json["started_at"].is_string());
}
