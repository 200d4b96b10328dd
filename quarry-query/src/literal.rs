//! Literal and clause rendering

use once_cell::sync::Lazy;
use quarry_core::{filter::json_kind, ValidationError};
use regex::Regex;
use serde_json::Value;
use std::fmt;

static FIELD_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("field name pattern is valid")
});

/// Escape a string for use inside a single-quoted literal.
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Reject field names that could break out of a clause.
pub fn check_field_name(name: &str) -> Result<(), ValidationError> {
    if FIELD_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::invalid(
            format!("custom_filters.{}", name),
            "field names may contain only letters, digits, '_' and '.'",
        ))
    }
}

/// A rendered scalar in a query expression.
///
/// The derived ordering sorts integers numerically, which keeps id lists in
/// ascending order after [`Clause::membership`] sorts them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Literal {
    Int(i128),
    /// Non-integral numbers keep the JSON rendering.
    Float(String),
    Bool(bool),
    /// Strings, rendered single-quoted and escaped.
    Quoted(String),
}

impl Literal {
    pub fn quoted(s: impl Into<String>) -> Self {
        Self::Quoted(s.into())
    }

    pub fn number(n: u64) -> Self {
        Self::Int(i128::from(n))
    }

    /// Convert a JSON scalar, naming `field` in the error for anything else.
    pub fn from_json(field: &str, value: &Value) -> Result<Self, ValidationError> {
        match value {
            Value::String(s) => Ok(Self::quoted(s.as_str())),
            Value::Number(n) => Ok(if let Some(i) = n.as_i64() {
                Self::Int(i128::from(i))
            } else if let Some(u) = n.as_u64() {
                Self::Int(i128::from(u))
            } else {
                Self::Float(n.to_string())
            }),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            other => Err(ValidationError::invalid(
                field,
                format!("expected a string, number or boolean, got {}", json_kind(other)),
            )),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(raw) => f.write_str(raw),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Quoted(s) => write!(f, "'{}'", escape_string(s)),
        }
    }
}

/// One condition of a query expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Eq { field: String, value: Literal },
    In { field: String, values: Vec<Literal> },
}

impl Clause {
    /// Membership clause; values are sorted and deduplicated.
    pub fn membership(field: impl Into<String>, values: impl IntoIterator<Item = Literal>) -> Self {
        let mut values: Vec<Literal> = values.into_iter().collect();
        values.sort();
        values.dedup();
        Self::In {
            field: field.into(),
            values,
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq { field, value } => write!(f, "{} = {}", field, value),
            Self::In { field, values } => {
                write!(f, "{} IN (", field)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str(")")
            }
        }
    }
}
