//! Defines the error types for the formula module.
use crate::compute::error::EvalError;
use thiserror::Error;

/// A formula failure, before it is attributed to a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },
    #[error("Unknown reference '{0}'")]
    UnknownReference(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),
}

impl FormulaError {
    /// Attaches the name of the value whose rule produced this error.
    pub fn at_value(self, value: &str) -> EvalError {
        let value = value.to_string();
        match self {
            FormulaError::Parse { offset, message } => EvalError::ParseError { value, offset, message },
            FormulaError::UnknownReference(reference) => EvalError::UnknownReference { value, reference },
            FormulaError::TypeMismatch(detail) => EvalError::TypeMismatch { value, detail },
            FormulaError::Arithmetic(detail) => EvalError::Arithmetic { value, detail },
        }
    }
}
