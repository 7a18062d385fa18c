//! Users and roles, each followed by the grants they hold.

use super::{comment_on, fetch, privileges};
use crate::{
    Result,
    models::{Fragment, ObjectKind, ObjectRecord},
    quote, registry,
    source::CatalogSource,
};

/// Users that exist on every database and cannot be recreated.
const BUILTIN_USERS: &[&str] = &["SYS"];

/// Roles that exist on every database; only their comment is kept.
const BUILTIN_ROLES: &[&str] = &["DBA", "PUBLIC"];

pub(super) async fn extract_users(source: &dyn CatalogSource) -> Result<Vec<ObjectRecord>> {
    let rows = fetch(source, registry::sql::USERS, None).await?;
    let grants = privileges::collect(source).await?;

    let mut records = Vec::new();
    for row in rows.iter("EXA_DBA_USERS") {
        let name = row.text("USER_NAME")?;
        if BUILTIN_USERS.contains(&name.as_str()) {
            continue;
        }
        let user = quote::identifier(&name);

        let authentication = if let Some(principal) = row.opt_text("KERBEROS_PRINCIPAL")? {
            format!("IDENTIFIED BY KERBEROS PRINCIPAL {}", quote::literal(&principal))
        } else if let Some(dn) = row.opt_text("DISTINGUISHED_NAME")? {
            format!("IDENTIFIED AT LDAP AS {}", quote::literal(&dn))
        } else {
            // the hash is masked on serialization
            let hash = row.opt_text("PASSWORD")?.unwrap_or_default();
            format!("IDENTIFIED BY {}", quote::quoted(&hash))
        };

        let mut record = ObjectRecord::new(ObjectKind::Users, name.clone()).with(
            Fragment::statement(format!("CREATE USER {} {}", user, authentication)),
        );
        if let Some(comment) = row.opt_text("USER_COMMENT")? {
            record.push(comment_on("USER", &user, &comment));
        }
        if let Some(policy) = row.opt_text("PASSWORD_EXPIRY_POLICY")? {
            record.push(Fragment::statement(format!(
                "ALTER USER {} SET PASSWORD_EXPIRY_POLICY={}",
                user,
                quote::literal(&policy)
            )));
        }
        if row
            .opt_text("PASSWORD_STATE")?
            .is_some_and(|state| state.eq_ignore_ascii_case("EXPIRED"))
        {
            record.push(Fragment::statement(format!("ALTER USER {} PASSWORD EXPIRE", user)));
        }
        record.fragments.extend(grants.of(&name));
        records.push(record);
    }
    Ok(records)
}

pub(super) async fn extract_roles(source: &dyn CatalogSource) -> Result<Vec<ObjectRecord>> {
    let rows = fetch(source, registry::sql::ROLES, None).await?;
    let grants = privileges::collect(source).await?;

    let mut records = Vec::new();
    for row in rows.iter("EXA_DBA_ROLES") {
        let name = row.text("ROLE_NAME")?;
        let role = quote::identifier(&name);
        let mut record = ObjectRecord::new(ObjectKind::Roles, name.clone());
        if !BUILTIN_ROLES.contains(&name.as_str()) {
            record.push(Fragment::statement(format!("CREATE ROLE {}", role)));
        }
        if let Some(comment) = row.opt_text("ROLE_COMMENT")? {
            record.push(comment_on("ROLE", &role, &comment));
        }
        record.fragments.extend(grants.of(&name));
        records.push(record);
    }
    Ok(records)
}
