//! Object kind registry.
//!
//! A static table maps every [`ObjectKind`] to its catalog queries, its
//! output layout and its flags. The runner, writer and reconciler only ever
//! consult this table, so adding a kind is a table entry plus an extractor
//! arm.
//!
//! # Output tree
//! ```text
//! parameters.sql
//! connections.sql
//! priority_groups.sql
//! privileges.sql
//! roles/<ROLE>.sql
//! users/<USER>.sql
//! schemas/<s>/schema.sql
//! schemas/<s>/tables/<T>.sql   (+ <T>.csv)
//! schemas/<s>/views/<V>.sql    (+ <V>.csv)
//! schemas/<s>/functions/<F>.sql
//! schemas/<s>/scripts/<S>.sql
//! ```

use crate::{
    Result,
    error::BackupError,
    models::{ObjectKind, ObjectRecord},
    quote,
};
use std::path::{Path, PathBuf};

/// Directory under the root that holds one directory per schema.
pub const SCHEMAS_DIR: &str = "schemas";

/// Placeholder replaced by the schema name as an escaped string literal.
pub const SCHEMA_PLACEHOLDER: &str = "{schema}";

/// Catalog query templates.
///
/// Queries order their rows so extraction output is deterministic.
pub mod sql {
    /// Schema enumeration for schema-scoped kinds
    pub const SCHEMA_LIST: &str = "SELECT SCHEMA_NAME FROM EXA_SCHEMAS ORDER BY SCHEMA_NAME";

    /// System parameters
    pub const PARAMETERS: &str =
        "SELECT PARAMETER_NAME, SYSTEM_VALUE FROM EXA_PARAMETERS ORDER BY PARAMETER_NAME";

    /// Schema definitions
    pub const SCHEMAS: &str = "SELECT SCHEMA_NAME, SCHEMA_COMMENT, SCHEMA_IS_VIRTUAL, \
         RAW_OBJECT_SIZE_LIMIT FROM EXA_SCHEMAS ORDER BY SCHEMA_NAME";
    /// Adapter script of each virtual schema
    pub const VIRTUAL_SCHEMAS: &str = "SELECT SCHEMA_NAME, ADAPTER_SCRIPT_SCHEMA, \
         ADAPTER_SCRIPT_NAME FROM EXA_ALL_VIRTUAL_SCHEMAS ORDER BY SCHEMA_NAME";
    /// Properties of each virtual schema
    pub const VIRTUAL_SCHEMA_PROPERTIES: &str = "SELECT SCHEMA_NAME, PROPERTY_NAME, \
         PROPERTY_VALUE FROM EXA_ALL_VIRTUAL_SCHEMA_PROPERTIES \
         ORDER BY SCHEMA_NAME, PROPERTY_NAME";

    /// Tables of one schema
    pub const TABLES: &str = "SELECT TABLE_NAME, TABLE_COMMENT FROM EXA_ALL_TABLES \
         WHERE TABLE_SCHEMA = {schema} ORDER BY TABLE_NAME";
    /// Table columns of one schema
    pub const TABLE_COLUMNS: &str = "SELECT COLUMN_TABLE, COLUMN_NAME, COLUMN_TYPE, \
         COLUMN_IDENTITY, COLUMN_DEFAULT, COLUMN_COMMENT, COLUMN_IS_DISTRIBUTION_KEY, \
         COLUMN_PARTITION_KEY_ORDINAL_POSITION FROM EXA_ALL_COLUMNS \
         WHERE COLUMN_SCHEMA = {schema} AND COLUMN_OBJECT_TYPE = 'TABLE' \
         ORDER BY COLUMN_TABLE, COLUMN_ORDINAL_POSITION";
    /// Table constraints of one schema, one row per constrained column
    pub const TABLE_CONSTRAINTS: &str = "SELECT C.CONSTRAINT_TABLE, C.CONSTRAINT_TYPE, \
         C.CONSTRAINT_NAME, C.CONSTRAINT_ENABLED, K.COLUMN_NAME, K.REFERENCED_SCHEMA, \
         K.REFERENCED_TABLE, K.REFERENCED_COLUMN FROM EXA_ALL_CONSTRAINTS C \
         JOIN EXA_ALL_CONSTRAINT_COLUMNS K ON K.CONSTRAINT_SCHEMA = C.CONSTRAINT_SCHEMA \
         AND K.CONSTRAINT_TABLE = C.CONSTRAINT_TABLE AND K.CONSTRAINT_NAME = C.CONSTRAINT_NAME \
         WHERE C.CONSTRAINT_SCHEMA = {schema} \
         ORDER BY C.CONSTRAINT_TABLE, C.CONSTRAINT_TYPE, C.CONSTRAINT_NAME, K.ORDINAL_POSITION";

    /// Views of one schema
    pub const VIEWS: &str = "SELECT VIEW_NAME, VIEW_TEXT FROM EXA_ALL_VIEWS \
         WHERE VIEW_SCHEMA = {schema} ORDER BY VIEW_NAME";

    /// Functions of one schema
    pub const FUNCTIONS: &str = "SELECT FUNCTION_NAME, FUNCTION_TEXT, FUNCTION_COMMENT \
         FROM EXA_ALL_FUNCTIONS WHERE FUNCTION_SCHEMA = {schema} ORDER BY FUNCTION_NAME";

    /// Scripts of one schema
    pub const SCRIPTS: &str = "SELECT SCRIPT_NAME, SCRIPT_TEXT, SCRIPT_COMMENT \
         FROM EXA_ALL_SCRIPTS WHERE SCRIPT_SCHEMA = {schema} ORDER BY SCRIPT_NAME";

    /// Users and their authentication
    pub const USERS: &str = "SELECT USER_NAME, PASSWORD, KERBEROS_PRINCIPAL, \
         DISTINGUISHED_NAME, USER_COMMENT, PASSWORD_EXPIRY_POLICY, PASSWORD_STATE \
         FROM EXA_DBA_USERS ORDER BY USER_NAME";

    /// Roles
    pub const ROLES: &str =
        "SELECT ROLE_NAME, ROLE_COMMENT FROM EXA_DBA_ROLES ORDER BY ROLE_NAME";

    /// Connections
    pub const CONNECTIONS: &str = "SELECT CONNECTION_NAME, CONNECTION_STRING, USER_NAME, \
         CONNECTION_COMMENT FROM EXA_DBA_CONNECTIONS ORDER BY CONNECTION_NAME";

    /// Priority groups
    pub const PRIORITY_GROUPS: &str = "SELECT PRIORITY_GROUP_ID, PRIORITY_GROUP_NAME, \
         PRIORITY_GROUP_WEIGHT, PRIORITY_GROUP_COMMENT FROM EXA_PRIORITY_GROUPS \
         ORDER BY PRIORITY_GROUP_ID";

    /// Priority group assigned to each principal
    pub const PRIORITY_GROUP_PRIVS: &str = "SELECT USER_NAME AS GRANTEE, \
         USER_PRIORITY_GROUP AS PRIORITY_GROUP FROM EXA_DBA_USERS \
         UNION ALL SELECT ROLE_NAME, ROLE_PRIORITY_GROUP FROM EXA_DBA_ROLES";
    /// Connection grants
    pub const CONNECTION_PRIVS: &str =
        "SELECT GRANTEE, GRANTED_CONNECTION, ADMIN_OPTION FROM EXA_DBA_CONNECTION_PRIVS";
    /// Object grants
    pub const OBJECT_PRIVS: &str = "SELECT GRANTEE, PRIVILEGE, OBJECT_TYPE, OBJECT_SCHEMA, \
         OBJECT_NAME FROM EXA_DBA_OBJ_PRIVS";
    /// Connection access restricted to a schema or script
    pub const RESTRICTED_PRIVS: &str = "SELECT GRANTEE, PRIVILEGE, OBJECT_NAME, \
         FOR_OBJECT_TYPE, FOR_OBJECT_SCHEMA, FOR_OBJECT_NAME FROM EXA_DBA_RESTRICTED_OBJ_PRIVS";
    /// Role grants
    pub const ROLE_PRIVS: &str =
        "SELECT GRANTEE, GRANTED_ROLE, ADMIN_OPTION FROM EXA_DBA_ROLE_PRIVS";
    /// System privilege grants
    pub const SYSTEM_PRIVS: &str =
        "SELECT GRANTEE, PRIVILEGE, ADMIN_OPTION FROM EXA_DBA_SYS_PRIVS";
    /// Impersonation grants
    pub const IMPERSONATION_PRIVS: &str =
        "SELECT GRANTEE, IMPERSONATION_ON FROM EXA_DBA_IMPERSONATION_PRIVS";
    /// Schema owners
    pub const SCHEMA_OWNERS: &str =
        "SELECT SCHEMA_NAME, SCHEMA_OWNER FROM EXA_SCHEMAS ORDER BY SCHEMA_NAME";

    /// Every grant query, in category order
    pub const PRIVILEGE_QUERIES: [&str; 8] = [
        PRIORITY_GROUP_PRIVS,
        CONNECTION_PRIVS,
        OBJECT_PRIVS,
        RESTRICTED_PRIVS,
        ROLE_PRIVS,
        SYSTEM_PRIVS,
        IMPERSONATION_PRIVS,
        SCHEMA_OWNERS,
    ];
}

/// Where the files of a kind go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One file directly under the root
    Flat {
        /// File name
        file: &'static str,
    },
    /// One `<NAME>.sql` per object in a directory under the root
    PerObject {
        /// Directory name
        dir: &'static str,
    },
    /// One file in each `schemas/<s>/` directory
    SchemaFile {
        /// File name
        file: &'static str,
    },
    /// One `<NAME>.sql` per object in `schemas/<s>/<dir>/`
    SchemaScoped {
        /// Directory name inside the schema directory
        dir: &'static str,
    },
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flat { file } => write!(f, "{}", file),
            Self::PerObject { dir } => write!(f, "{}/<NAME>.sql", dir),
            Self::SchemaFile { file } => write!(f, "{}/<SCHEMA>/{}", SCHEMAS_DIR, file),
            Self::SchemaScoped { dir } => write!(f, "{}/<SCHEMA>/{}/<NAME>.sql", SCHEMAS_DIR, dir),
        }
    }
}

/// Static description of one object kind.
#[derive(Debug)]
pub struct KindSpec {
    /// The kind described
    pub kind: ObjectKind,
    /// Human-readable label for logs
    pub label: &'static str,
    /// Output layout
    pub layout: Layout,
    /// Whether row data can be exported as CSV
    pub exports_data: bool,
    /// Catalog query templates issued for this kind
    pub queries: &'static [&'static str],
}

const USER_QUERIES: [&str; 9] = [
    sql::USERS,
    sql::PRIORITY_GROUP_PRIVS,
    sql::CONNECTION_PRIVS,
    sql::OBJECT_PRIVS,
    sql::RESTRICTED_PRIVS,
    sql::ROLE_PRIVS,
    sql::SYSTEM_PRIVS,
    sql::IMPERSONATION_PRIVS,
    sql::SCHEMA_OWNERS,
];

const ROLE_QUERIES: [&str; 9] = [
    sql::ROLES,
    sql::PRIORITY_GROUP_PRIVS,
    sql::CONNECTION_PRIVS,
    sql::OBJECT_PRIVS,
    sql::RESTRICTED_PRIVS,
    sql::ROLE_PRIVS,
    sql::SYSTEM_PRIVS,
    sql::IMPERSONATION_PRIVS,
    sql::SCHEMA_OWNERS,
];

static REGISTRY: [KindSpec; 11] = [
    KindSpec {
        kind: ObjectKind::Parameters,
        label: "system parameters",
        layout: Layout::Flat {
            file: "parameters.sql",
        },
        exports_data: false,
        queries: &[sql::PARAMETERS],
    },
    KindSpec {
        kind: ObjectKind::Schemas,
        label: "schemas",
        layout: Layout::SchemaFile { file: "schema.sql" },
        exports_data: false,
        queries: &[
            sql::SCHEMAS,
            sql::VIRTUAL_SCHEMAS,
            sql::VIRTUAL_SCHEMA_PROPERTIES,
        ],
    },
    KindSpec {
        kind: ObjectKind::Tables,
        label: "tables",
        layout: Layout::SchemaScoped { dir: "tables" },
        exports_data: true,
        queries: &[
            sql::SCHEMA_LIST,
            sql::TABLES,
            sql::TABLE_COLUMNS,
            sql::TABLE_CONSTRAINTS,
        ],
    },
    KindSpec {
        kind: ObjectKind::Views,
        label: "views",
        layout: Layout::SchemaScoped { dir: "views" },
        exports_data: true,
        queries: &[sql::SCHEMA_LIST, sql::VIEWS],
    },
    KindSpec {
        kind: ObjectKind::Functions,
        label: "functions",
        layout: Layout::SchemaScoped { dir: "functions" },
        exports_data: false,
        queries: &[sql::SCHEMA_LIST, sql::FUNCTIONS],
    },
    KindSpec {
        kind: ObjectKind::Scripts,
        label: "scripts",
        layout: Layout::SchemaScoped { dir: "scripts" },
        exports_data: false,
        queries: &[sql::SCHEMA_LIST, sql::SCRIPTS],
    },
    KindSpec {
        kind: ObjectKind::Users,
        label: "users",
        layout: Layout::PerObject { dir: "users" },
        exports_data: false,
        queries: &USER_QUERIES,
    },
    KindSpec {
        kind: ObjectKind::Roles,
        label: "roles",
        layout: Layout::PerObject { dir: "roles" },
        exports_data: false,
        queries: &ROLE_QUERIES,
    },
    KindSpec {
        kind: ObjectKind::Connections,
        label: "connections",
        layout: Layout::Flat {
            file: "connections.sql",
        },
        exports_data: false,
        queries: &[sql::CONNECTIONS],
    },
    KindSpec {
        kind: ObjectKind::PriorityGroups,
        label: "priority groups",
        layout: Layout::Flat {
            file: "priority_groups.sql",
        },
        exports_data: false,
        queries: &[sql::PRIORITY_GROUPS],
    },
    KindSpec {
        kind: ObjectKind::Privileges,
        label: "privileges",
        layout: Layout::Flat {
            file: "privileges.sql",
        },
        exports_data: false,
        queries: &sql::PRIVILEGE_QUERIES,
    },
];

/// Looks up the registry entry for `kind`.
pub fn spec(kind: ObjectKind) -> &'static KindSpec {
    // Table order follows the enum's declaration order.
    &REGISTRY[kind as usize]
}

/// Renders a query template for `schema`.
///
/// The schema name is substituted as a string literal with quotes doubled,
/// so no name can break out of the literal.
pub fn render(template: &str, schema: &str) -> String {
    template.replace(SCHEMA_PLACEHOLDER, &quote::literal(schema))
}

/// Encodes a catalog name as a single path component.
///
/// `%`, `/`, `\`, NUL and a leading `.` are percent-encoded. The mapping is
/// injective, so distinct names never share a file, and no encoded name can
/// start with `.` (the prefix of the writer's temporary files).
pub fn file_stem(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (idx, ch) in name.chars().enumerate() {
        match ch {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            '\0' => out.push_str("%00"),
            '.' if idx == 0 => out.push_str("%2E"),
            _ => out.push(ch),
        }
    }
    out
}

/// `root/schemas/<schema>`.
pub fn schema_dir(root: &Path, schema: &str) -> PathBuf {
    root.join(SCHEMAS_DIR).join(file_stem(schema))
}

fn owning_schema(record: &ObjectRecord) -> Result<&str> {
    match record.schema.as_deref() {
        Some(schema) if !schema.is_empty() => Ok(schema),
        _ => Err(BackupError::serialization(format!(
            "{} record '{}' has no schema",
            record.kind, record.name
        ))),
    }
}

/// Directory a record's files are written to.
///
/// # Errors
/// Returns a serialization error if a schema-scoped record has no schema.
pub fn output_dir(root: &Path, record: &ObjectRecord) -> Result<PathBuf> {
    Ok(match spec(record.kind).layout {
        Layout::Flat { .. } => root.to_path_buf(),
        Layout::PerObject { dir } => root.join(dir),
        Layout::SchemaFile { .. } => schema_dir(root, owning_schema(record)?),
        Layout::SchemaScoped { dir } => schema_dir(root, owning_schema(record)?).join(dir),
    })
}

/// Path of a record's SQL file.
///
/// # Errors
/// Returns a serialization error if a schema-scoped record has no schema.
pub fn output_path(root: &Path, record: &ObjectRecord) -> Result<PathBuf> {
    let dir = output_dir(root, record)?;
    Ok(match spec(record.kind).layout {
        Layout::Flat { file } | Layout::SchemaFile { file } => dir.join(file),
        Layout::PerObject { .. } | Layout::SchemaScoped { .. } => {
            dir.join(format!("{}.sql", file_stem(&record.name)))
        }
    })
}

/// Path of a record's CSV data file, for kinds that export data.
///
/// # Errors
/// Returns a serialization error if a schema-scoped record has no schema.
pub fn data_path(root: &Path, record: &ObjectRecord) -> Result<Option<PathBuf>> {
    if !spec(record.kind).exports_data {
        return Ok(None);
    }
    let dir = output_dir(root, record)?;
    Ok(Some(dir.join(format!("{}.csv", file_stem(&record.name)))))
}
