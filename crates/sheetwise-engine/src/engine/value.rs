//! Raw evaluation results.

use serde::{Serialize, Serializer};
use std::fmt;

/// Error markers a cell can resolve to. Dependents of an errored cell
/// resolve to the same marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellError {
    /// The cell is part of a dependency cycle.
    Cycle,
    /// Arithmetic produced an infinite value.
    DivZero,
    /// Arithmetic produced NaN or a function rejected its numeric input.
    Num,
}

impl CellError {
    pub fn marker(&self) -> &'static str {
        match self {
            CellError::Cycle => "#CYCLE!",
            CellError::DivZero => "#DIV/0!",
            CellError::Num => "#NUM!",
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// The unformatted result of evaluating a cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Error(CellError),
}

impl Value {
    /// Wrap an arithmetic result, mapping non-finite numbers to error markers.
    pub fn from_number(n: f64) -> Value {
        if n.is_nan() {
            Value::Error(CellError::Num)
        } else if n.is_infinite() {
            Value::Error(CellError::DivZero)
        } else {
            Value::Number(n)
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<CellError> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::from_number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}

impl From<CellError> for Value {
    fn from(e: CellError) -> Value {
        Value::Error(e)
    }
}

/// Numbers serialize as JSON numbers, text and error markers as strings, empty as null.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Empty => serializer.serialize_none(),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Error(e) => serializer.serialize_str(e.marker()),
        }
    }
}
