use crate::error::{ExecutionError, ExecutionResult};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// How a null cell is rendered wherever records become text or JSON.
pub const NULL_SENTINEL: &str = "NULL";

/// A normalized cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl Cell {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Text rendering for plain output: null becomes the empty string
    /// instead of the sentinel.
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl Cell {
    /// Typed JSON form where null stays JSON `null` instead of the sentinel.
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Text(v) => serde_json::Value::from(v.as_str()),
            Self::Integer(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Value::from(*v),
            Self::Boolean(v) => serde_json::Value::from(*v),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str(NULL_SENTINEL),
            Self::Text(v) => f.write_str(v),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
        }
    }
}

// Null is serialized as the sentinel string so that consumers can tell a
// null column from a missing one.
impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_str(NULL_SENTINEL),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Boolean(v) => serializer.serialize_bool(*v),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// One result row keyed by column name, in select order.
pub type Record = IndexMap<String, Cell>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ColumnCase {
    #[default]
    Preserve,
    Lower,
}

impl ColumnCase {
    pub(crate) fn apply(self, columns: &mut [String]) {
        if self == Self::Lower {
            for column in columns.iter_mut() {
                *column = column.to_lowercase();
            }
        }
    }
}

/// Records bound before a row failed, plus that failure if there was one.
#[derive(Debug)]
pub struct BoundRows<T> {
    pub rows: Vec<T>,
    pub failure: Option<ExecutionError>,
}

impl<T> BoundRows<T> {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Strict view: the rows only if every row bound.
    pub fn into_result(self) -> ExecutionResult<Vec<T>> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self.rows),
        }
    }
}
