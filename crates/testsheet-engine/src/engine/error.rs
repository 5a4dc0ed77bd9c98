//! Formula evaluation errors.
//!
//! All of these are contained to the single cell that produced them: the
//! sheet stores the error on the cell and keeps evaluating everything else.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Formula text could not be tokenized or parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A reference or range falls outside the sheet bounds.
    #[error("Reference error: {0}")]
    Reference(String),

    /// An arithmetic operand was not numeric.
    #[error("Type error: {0}")]
    Type(String),

    #[error("Division by zero")]
    DivisionByZero,

    /// The cell takes part in a dependency cycle.
    #[error("Circular reference: {}", format_path(.0))]
    CircularReference(Vec<String>),
}

impl EvalError {
    /// Short in-cell indicator for the error.
    pub fn code(&self) -> &'static str {
        match self {
            EvalError::Parse(_) => "#PARSE!",
            EvalError::Reference(_) => "#REF!",
            EvalError::Type(_) => "#VALUE!",
            EvalError::DivisionByZero => "#DIV/0!",
            EvalError::CircularReference(_) => "#CYCLE!",
        }
    }
}

fn format_path(path: &[String]) -> String {
    if path.is_empty() {
        "cycle detected".to_string()
    } else {
        path.join(" -> ")
    }
}

pub type EvalResult<T> = std::result::Result<T, EvalError>;
