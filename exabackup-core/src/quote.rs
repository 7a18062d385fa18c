//! SQL identifier and literal quoting.
//!
//! The engine accepts three identifier spellings: bare (folded to upper
//! case), `"double quoted"` (case preserved) and `[bracketed]` (case
//! preserved, used by the engine's own DDL output for schema and group
//! names). Reconstructed DDL must keep catalog names exactly, so bare
//! identifiers are only emitted for names that survive case folding.

use regex::Regex;
use std::sync::OnceLock;

fn plain_identifier() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("Invalid identifier pattern"))
}

/// `"name"` with embedded quotes doubled.
pub fn quoted(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `[name]` with embedded `]` doubled.
pub fn bracketed(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Bare name when it is a plain upper-case identifier, otherwise quoted.
pub fn identifier(name: &str) -> String {
    if plain_identifier().is_match(name) {
        name.to_string()
    } else {
        quoted(name)
    }
}

/// `'value'` with embedded quotes doubled.
pub fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `"schema"."name"`.
pub fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(name))
}

/// `[schema].[name]`.
pub fn bracket_qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", bracketed(schema), bracketed(name))
}
