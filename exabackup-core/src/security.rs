//! Secret redaction for serialized output.
//!
//! Password hashes and connection passwords appear in reconstructed DDL as
//! the quoted literal after `IDENTIFIED BY`. Every such literal, quotes
//! included, is replaced with [`REDACTED`] before text reaches disk. The
//! `KERBEROS PRINCIPAL` and `AT LDAP AS` forms carry no secret and are left
//! alone.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Token written in place of a secret literal.
pub const REDACTED: &str = "********";

fn identified_by() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)(\bIDENTIFIED\s+BY\s+)("(?:[^"]|"")*"|'(?:[^']|'')*')"#)
            .expect("Invalid IDENTIFIED BY pattern")
    })
}

/// Masks every `IDENTIFIED BY '<literal>'` / `IDENTIFIED BY "<literal>"`
/// payload in `text`.
pub fn redact_secrets(text: &str) -> Cow<'_, str> {
    identified_by().replace_all(text, |caps: &regex::Captures<'_>| {
        format!("{}{}", &caps[1], REDACTED)
    })
}
