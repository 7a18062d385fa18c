//! Result sets returned by a catalog source.

use crate::{Result, error::BackupError};
use serde::{Deserialize, Serialize};

/// One engine-native value.
///
/// Mirrors what the engine's JSON protocol delivers: decimals without scale
/// arrive as integers, other numerics as doubles, timestamps and large
/// decimals as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean column
    Bool(bool),
    /// Integral number
    Integer(i64),
    /// Floating-point number
    Double(f64),
    /// Character data and anything without a native JSON type
    Text(String),
}

impl Value {
    /// Renders the value as text; `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Double(d) => Some(d.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }

    /// Interprets the value as a boolean flag.
    ///
    /// The catalog reports flags either as booleans or as the strings
    /// `TRUE`/`FALSE`.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Self::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            Self::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Whether this is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Rows and named columns returned by one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Column names in select order
    pub columns: Vec<String>,
    /// Row values, each in column order
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Creates an empty result set with the given column names.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builder method appending one row.
    pub fn with_row<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates rows with by-name column access.
    ///
    /// `context` names the query in malformed-row errors.
    pub fn iter<'a>(&'a self, context: &'a str) -> impl Iterator<Item = Row<'a>> + 'a {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
            context,
        })
    }
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
    context: &'a str,
}

impl<'a> Row<'a> {
    /// Raw value of `column`.
    ///
    /// # Errors
    /// Returns [`BackupError::MalformedRow`] if the column is absent or the
    /// row is shorter than the column list.
    pub fn value(&self, column: &str) -> Result<&'a Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|idx| self.values.get(idx))
            .ok_or_else(|| BackupError::malformed_row(column, Some(self.context)))
    }

    /// Non-NULL text value of `column`.
    ///
    /// # Errors
    /// Returns [`BackupError::MalformedRow`] if the column is absent or NULL.
    pub fn text(&self, column: &str) -> Result<String> {
        self.value(column)?
            .to_text()
            .ok_or_else(|| BackupError::malformed_row(column, Some(self.context)))
    }

    /// Optional text value of `column`; NULL and empty strings become `None`.
    ///
    /// # Errors
    /// Returns [`BackupError::MalformedRow`] if the column is absent.
    pub fn opt_text(&self, column: &str) -> Result<Option<String>> {
        Ok(self.value(column)?.to_text().filter(|s| !s.is_empty()))
    }

    /// Boolean flag value of `column`; NULL reads as `false`.
    ///
    /// # Errors
    /// Returns [`BackupError::MalformedRow`] if the column is absent or not
    /// a flag.
    pub fn flag(&self, column: &str) -> Result<bool> {
        let value = self.value(column)?;
        if value.is_null() {
            return Ok(false);
        }
        value
            .as_flag()
            .ok_or_else(|| BackupError::malformed_row(column, Some(self.context)))
    }

    /// Values in column order.
    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}
