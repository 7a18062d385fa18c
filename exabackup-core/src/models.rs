//! Core data models for catalog objects.
//!
//! An [`ObjectRecord`] is built per run from live catalog state, serialized
//! once and dropped. Nothing here is cached across runs.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    /// System parameters (`parameters.sql`)
    Parameters,
    /// Schema definitions, comments and size limits
    Schemas,
    /// Table DDL, optionally with row data
    Tables,
    /// View text, optionally with row data
    Views,
    /// User-defined functions
    Functions,
    /// Lua, Python and other scripts
    Scripts,
    /// Database users with their grants
    Users,
    /// Roles with their grants
    Roles,
    /// Connection objects (`connections.sql`)
    Connections,
    /// Priority groups and weights
    PriorityGroups,
    /// Every grant (`privileges.sql`)
    Privileges,
}

impl ObjectKind {
    /// Every kind, in the order a full backup processes them.
    pub const ALL: [Self; 11] = [
        Self::Parameters,
        Self::Schemas,
        Self::Tables,
        Self::Views,
        Self::Functions,
        Self::Scripts,
        Self::Users,
        Self::Roles,
        Self::Connections,
        Self::PriorityGroups,
        Self::Privileges,
    ];

    /// Name used on the command line and in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parameters => "PARAMETERS",
            Self::Schemas => "SCHEMAS",
            Self::Tables => "TABLES",
            Self::Views => "VIEWS",
            Self::Functions => "FUNCTIONS",
            Self::Scripts => "SCRIPTS",
            Self::Users => "USERS",
            Self::Roles => "ROLES",
            Self::Connections => "CONNECTIONS",
            Self::PriorityGroups => "PRIORITY_GROUPS",
            Self::Privileges => "PRIVILEGES",
        }
    }

    /// Whether objects of this kind live inside a schema.
    pub fn is_schema_scoped(self) -> bool {
        matches!(
            self,
            Self::Tables | Self::Views | Self::Functions | Self::Scripts
        )
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = crate::error::BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                crate::error::BackupError::configuration(format!("unknown object kind '{}'", s))
            })
    }
}

/// Parses a comma-separated kind list, expanding `ALL`.
///
/// Duplicates are dropped while the first occurrence keeps its position.
///
/// # Errors
/// Returns a configuration error for unknown kind names.
pub fn parse_kind_list(input: &str) -> crate::Result<Vec<ObjectKind>> {
    let mut kinds = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let expanded: Vec<ObjectKind> = if part.eq_ignore_ascii_case("all") {
            ObjectKind::ALL.to_vec()
        } else {
            vec![part.parse()?]
        };
        for kind in expanded {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
    }
    Ok(kinds)
}

/// One ordered unit of SQL text belonging to an [`ObjectRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "sql", rename_all = "snake_case")]
pub enum Fragment {
    /// `OPEN SCHEMA [schema];`, sets the active schema for what follows
    OpenSchema(String),
    /// A plain statement terminated by `;`
    Statement(String),
    /// A procedural body wrapped in `--/` … `/` because it may itself
    /// contain `;`
    Block(String),
}

impl Fragment {
    /// Shorthand for [`Fragment::Statement`].
    pub fn statement(sql: impl Into<String>) -> Self {
        Self::Statement(sql.into())
    }

    /// Shorthand for [`Fragment::Block`].
    pub fn block(body: impl Into<String>) -> Self {
        Self::Block(body.into())
    }

    /// Shorthand for [`Fragment::OpenSchema`].
    pub fn open_schema(schema: impl Into<String>) -> Self {
        Self::OpenSchema(schema.into())
    }
}

/// One catalog entity and the fragments that recreate it.
///
/// Fragment order matters: concatenated in order they form a valid script
/// (definition first, then comments, ownership, limits, grants).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Kind the record was extracted for
    pub kind: ObjectKind,
    /// Owning schema of schema-scoped objects
    pub schema: Option<String>,
    /// Catalog name, case preserved
    pub name: String,
    /// Script fragments in output order
    pub fragments: Vec<Fragment>,
}

impl ObjectRecord {
    /// Creates an empty record for a database-global entity.
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            schema: None,
            name: name.into(),
            fragments: Vec::new(),
        }
    }

    /// Creates an empty record for an entity owned by `schema`.
    pub fn in_schema(kind: ObjectKind, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            schema: Some(schema.into()),
            name: name.into(),
            fragments: Vec::new(),
        }
    }

    /// Appends a fragment.
    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, fragment: Fragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    /// `schema.name` for log messages and failure reports.
    pub fn display_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}
