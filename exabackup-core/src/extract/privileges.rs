//! Grants.
//!
//! Grants are collected category by category, each in catalog enumeration
//! order:
//!
//! 1. priority group assignment
//! 2. connection
//! 3. object
//! 4. connection access restricted to a schema or script
//! 5. role
//! 6. system privilege
//! 7. impersonation
//! 8. schema ownership
//!
//! Replaying them in this order works on a fresh database: everything a
//! grant refers to already exists when it runs. Grants to `SYS` and `DBA`
//! and the implicit `PUBLIC` role grant exist on every database and are
//! skipped.

use super::fetch;
use crate::{
    Result,
    models::{Fragment, ObjectKind, ObjectRecord},
    quote,
    registry::sql,
    source::CatalogSource,
};

const BUILTIN_GRANTEES: &[&str] = &["SYS", "DBA"];
const IMPLICIT_ROLE: &str = "PUBLIC";
const DEFAULT_PRIORITY_GROUP: &str = "MEDIUM";

/// One grant statement and who receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Grant {
    pub(super) grantee: String,
    pub(super) sql: String,
}

/// Grants of a whole database, in category order.
#[derive(Debug, Default)]
pub(super) struct Grants(Vec<Grant>);

impl Grants {
    /// Statements granting to `principal`, in category order.
    pub(super) fn of<'a>(&'a self, principal: &'a str) -> impl Iterator<Item = Fragment> + 'a {
        self.0
            .iter()
            .filter(move |grant| grant.grantee == principal)
            .map(|grant| Fragment::statement(grant.sql.clone()))
    }

    fn push(&mut self, grantee: String, sql: String) {
        if !BUILTIN_GRANTEES.contains(&grantee.as_str()) {
            self.0.push(Grant { grantee, sql });
        }
    }
}

fn admin_option(flag: bool) -> &'static str {
    if flag { " WITH ADMIN OPTION" } else { "" }
}

/// Reads every grant category.
pub(super) async fn collect(source: &dyn CatalogSource) -> Result<Grants> {
    let mut grants = Grants::default();

    let rows = fetch(source, sql::PRIORITY_GROUP_PRIVS, None).await?;
    for row in rows.iter("priority group assignments") {
        let grantee = row.text("GRANTEE")?;
        if let Some(group) = row.opt_text("PRIORITY_GROUP")?
            && group != DEFAULT_PRIORITY_GROUP
        {
            let sql = format!(
                "GRANT PRIORITY GROUP {} TO {}",
                quote::bracketed(&group),
                quote::identifier(&grantee)
            );
            grants.push(grantee, sql);
        }
    }

    let rows = fetch(source, sql::CONNECTION_PRIVS, None).await?;
    for row in rows.iter("EXA_DBA_CONNECTION_PRIVS") {
        let grantee = row.text("GRANTEE")?;
        let sql = format!(
            "GRANT CONNECTION {} TO {}{}",
            quote::identifier(&row.text("GRANTED_CONNECTION")?),
            quote::identifier(&grantee),
            admin_option(row.flag("ADMIN_OPTION")?)
        );
        grants.push(grantee, sql);
    }

    let rows = fetch(source, sql::OBJECT_PRIVS, None).await?;
    for row in rows.iter("EXA_DBA_OBJ_PRIVS") {
        let grantee = row.text("GRANTEE")?;
        let object_type = row.text("OBJECT_TYPE")?;
        let name = row.text("OBJECT_NAME")?;
        let object = match row.opt_text("OBJECT_SCHEMA")? {
            Some(schema) if object_type != "SCHEMA" => quote::bracket_qualified(&schema, &name),
            _ => quote::bracketed(&name),
        };
        let sql = format!(
            "GRANT {} ON {} {} TO {}",
            row.text("PRIVILEGE")?,
            object_type,
            object,
            quote::identifier(&grantee)
        );
        grants.push(grantee, sql);
    }

    let rows = fetch(source, sql::RESTRICTED_PRIVS, None).await?;
    for row in rows.iter("EXA_DBA_RESTRICTED_OBJ_PRIVS") {
        let grantee = row.text("GRANTEE")?;
        let for_name = row.text("FOR_OBJECT_NAME")?;
        let for_object = match row.opt_text("FOR_OBJECT_SCHEMA")? {
            Some(schema) => quote::bracket_qualified(&schema, &for_name),
            None => quote::bracketed(&for_name),
        };
        let sql = format!(
            "GRANT {} ON CONNECTION {} FOR {} {} TO {}",
            row.text("PRIVILEGE")?,
            quote::bracketed(&row.text("OBJECT_NAME")?),
            row.text("FOR_OBJECT_TYPE")?,
            for_object,
            quote::identifier(&grantee)
        );
        grants.push(grantee, sql);
    }

    let rows = fetch(source, sql::ROLE_PRIVS, None).await?;
    for row in rows.iter("EXA_DBA_ROLE_PRIVS") {
        let grantee = row.text("GRANTEE")?;
        let role = row.text("GRANTED_ROLE")?;
        if role == IMPLICIT_ROLE {
            continue;
        }
        let sql = format!(
            "GRANT {} TO {}{}",
            quote::identifier(&role),
            quote::identifier(&grantee),
            admin_option(row.flag("ADMIN_OPTION")?)
        );
        grants.push(grantee, sql);
    }

    let rows = fetch(source, sql::SYSTEM_PRIVS, None).await?;
    for row in rows.iter("EXA_DBA_SYS_PRIVS") {
        let grantee = row.text("GRANTEE")?;
        let sql = format!(
            "GRANT {} TO {}{}",
            row.text("PRIVILEGE")?,
            quote::identifier(&grantee),
            admin_option(row.flag("ADMIN_OPTION")?)
        );
        grants.push(grantee, sql);
    }

    let rows = fetch(source, sql::IMPERSONATION_PRIVS, None).await?;
    for row in rows.iter("EXA_DBA_IMPERSONATION_PRIVS") {
        let grantee = row.text("GRANTEE")?;
        let sql = format!(
            "GRANT IMPERSONATION ON {} TO {}",
            quote::identifier(&row.text("IMPERSONATION_ON")?),
            quote::identifier(&grantee)
        );
        grants.push(grantee, sql);
    }

    let rows = fetch(source, sql::SCHEMA_OWNERS, None).await?;
    for row in rows.iter("EXA_SCHEMAS") {
        let owner = row.text("SCHEMA_OWNER")?;
        let sql = format!(
            "ALTER SCHEMA {} CHANGE OWNER {}",
            quote::bracketed(&row.text("SCHEMA_NAME")?),
            quote::identifier(&owner)
        );
        grants.push(owner, sql);
    }

    Ok(grants)
}

/// Every grant of the database as one record.
pub(super) async fn extract(source: &dyn CatalogSource) -> Result<ObjectRecord> {
    let grants = collect(source).await?;
    let mut record = ObjectRecord::new(ObjectKind::Privileges, "privileges");
    for grant in grants.0 {
        record.push(Fragment::statement(grant.sql));
    }
    Ok(record)
}
