//! Formula evaluation errors.

use thiserror::Error;

use super::CellError;

/// Why a formula could not be reduced to a value.
///
/// `Cell` carries a dependency's error marker and becomes the cell's own
/// result. Every other variant leaves the formula unresolved: the cell shows
/// its original text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("{function} expects {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("{function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("Error in {function}: {message}")]
    Handler { function: String, message: String },

    #[error("Unbalanced parentheses in {0}")]
    Unbalanced(String),

    #[error("Formula reduction did not settle after {0} passes")]
    TooManyPasses(usize),

    #[error("Expression contains characters outside + - * / ^ ( ) and numbers: {0}")]
    Disallowed(String),

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    #[error("Range {0} used outside a function argument")]
    BareRange(String),

    #[error("{0}")]
    Cell(CellError),
}

impl FormulaError {
    pub fn arity(function: &str, expected: &str, got: usize) -> FormulaError {
        FormulaError::Arity {
            function: function.to_string(),
            expected: expected.to_string(),
            got,
        }
    }

    pub fn invalid_argument(function: &str, message: impl Into<String>) -> FormulaError {
        FormulaError::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }

    pub fn handler(function: &str, message: impl Into<String>) -> FormulaError {
        FormulaError::Handler {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

impl From<CellError> for FormulaError {
    fn from(e: CellError) -> FormulaError {
        FormulaError::Cell(e)
    }
}
